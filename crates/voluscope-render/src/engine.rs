//! The main rendering engine.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::camera::Camera;
use crate::colormap::ColormapCache;
use crate::error::{RenderError, RenderResult};
use crate::hud_render::HudRenderData;
use crate::track_line_render::TrackLineRenderData;
use crate::volume_resources::{ModeData, VolumeResources};

/// Camera uniforms for GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub inv_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub _padding: f32,
}

impl Default for CameraUniforms {
    fn default() -> Self {
        Self {
            view: glam::Mat4::IDENTITY.to_cols_array_2d(),
            proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            inv_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            camera_pos: [0.0, 0.0, 3.0],
            _padding: 0.0,
        }
    }
}

/// Everything the engine draws in one frame, in compositing order.
pub struct FrameContent<'a> {
    pub background: wgpu::Color,
    pub additive: bool,
    pub volumes: Vec<&'a VolumeResources>,
    pub tracks: Vec<&'a TrackLineRenderData>,
    pub hud: Option<&'a HudRenderData>,
}

/// The main rendering engine backed by wgpu.
pub struct RenderEngine {
    /// The wgpu instance.
    pub instance: wgpu::Instance,
    /// The wgpu adapter.
    pub adapter: wgpu::Adapter,
    /// The wgpu device.
    pub device: wgpu::Device,
    /// The wgpu queue.
    pub queue: wgpu::Queue,
    /// The render surface (None for headless).
    pub surface: Option<wgpu::Surface<'static>>,
    /// Surface configuration.
    pub surface_config: wgpu::SurfaceConfiguration,
    /// Offscreen target used when headless.
    headless_target: Option<(wgpu::Texture, wgpu::TextureView)>,
    /// Current viewport width.
    pub width: u32,
    /// Current viewport height.
    pub height: u32,

    /// Main camera.
    pub camera: Camera,
    /// Camera uniform buffer shared by every pipeline.
    pub camera_buffer: wgpu::Buffer,

    /// Trilinear sampler for linear-mode volume sampling.
    pub linear_sampler: wgpu::Sampler,
    /// Nearest sampler for per-voxel stepping and segmentation layers.
    pub nearest_sampler: wgpu::Sampler,
    /// Clamped linear sampler for colormaps, slices, and the HUD label.
    pub colormap_sampler: wgpu::Sampler,
    /// 1x1x1 R32Float fallback for layers without segmentation labels.
    pub dummy_label_view: wgpu::TextureView,
    /// Keeps the fallback texture alive for its view.
    pub dummy_label_texture: wgpu::Texture,

    /// Colormap texture cache keyed by layer color.
    pub colormaps: ColormapCache,

    /// Ray-marched volume bind group layout.
    pub volume_bind_group_layout: wgpu::BindGroupLayout,
    /// Slice-plane bind group layout.
    pub slice_bind_group_layout: wgpu::BindGroupLayout,
    /// Track line bind group layout (line and outline share it).
    pub track_line_bind_group_layout: wgpu::BindGroupLayout,
    /// HUD quad bind group layout.
    pub hud_bind_group_layout: wgpu::BindGroupLayout,
    /// HUD label bind group layout.
    pub hud_label_bind_group_layout: wgpu::BindGroupLayout,

    volume_pipeline_alpha: wgpu::RenderPipeline,
    volume_pipeline_additive: wgpu::RenderPipeline,
    slice_pipeline_alpha: wgpu::RenderPipeline,
    slice_pipeline_additive: wgpu::RenderPipeline,
    track_line_pipeline: wgpu::RenderPipeline,
    hud_pipeline: wgpu::RenderPipeline,
    hud_label_pipeline: wgpu::RenderPipeline,
}

impl RenderEngine {
    /// Creates an engine presenting to a window surface.
    pub async fn new_windowed(window: Arc<winit::window::Window>) -> RenderResult<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window)?;
        Self::new_inner(instance, Some(surface), size.width.max(1), size.height.max(1)).await
    }

    /// Creates a headless engine rendering to an offscreen texture.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::default();
        Self::new_inner(instance, None, width.max(1), height.max(1)).await
    }

    async fn new_inner(
        instance: wgpu::Instance,
        surface: Option<wgpu::Surface<'static>>,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("voluscope device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        let format = surface
            .as_ref()
            .map(|s| {
                let caps = s.get_capabilities(&adapter);
                caps.formats
                    .iter()
                    .copied()
                    .find(wgpu::TextureFormat::is_srgb)
                    .unwrap_or(caps.formats[0])
            })
            .unwrap_or(wgpu::TextureFormat::Rgba8UnormSrgb);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        if let Some(s) = &surface {
            s.configure(&device, &surface_config);
        }

        let headless_target = if surface.is_none() {
            Some(create_offscreen_target(&device, format, width, height))
        } else {
            None
        };

        let camera = Camera::new(width as f32 / height as f32);
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera uniforms"),
            contents: bytemuck::cast_slice(&[CameraUniforms::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("volume linear sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("volume nearest sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let colormap_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("colormap sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let dummy_label_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("dummy label"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &dummy_label_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&[-1.0f32]),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let dummy_label_view =
            dummy_label_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let volume_bind_group_layout = create_volume_layout(&device);
        let slice_bind_group_layout = create_textured_quad_layout(&device, "slice layout");
        let track_line_bind_group_layout = create_line_layout(&device, "track line layout");
        let hud_bind_group_layout = create_line_layout(&device, "hud layout");
        let hud_label_bind_group_layout = create_textured_quad_layout(&device, "hud label layout");

        let raymarch_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("raymarch shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/raymarch.wgsl").into()),
        });
        let slice_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("slice shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/slice.wgsl").into()),
        });
        let track_line_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("track line shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/track_line.wgsl").into()),
        });
        let hud_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("hud shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/hud.wgsl").into()),
        });
        let hud_label_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("hud label shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/hud_label.wgsl").into()),
        });

        let volume_pipeline_alpha = create_pipeline(
            &device,
            "volume alpha",
            &volume_bind_group_layout,
            &raymarch_module,
            format,
            wgpu::BlendState::ALPHA_BLENDING,
            Some(wgpu::Face::Front),
        );
        let volume_pipeline_additive = create_pipeline(
            &device,
            "volume additive",
            &volume_bind_group_layout,
            &raymarch_module,
            format,
            additive_blend(),
            Some(wgpu::Face::Front),
        );
        let slice_pipeline_alpha = create_pipeline(
            &device,
            "slice alpha",
            &slice_bind_group_layout,
            &slice_module,
            format,
            wgpu::BlendState::ALPHA_BLENDING,
            None,
        );
        let slice_pipeline_additive = create_pipeline(
            &device,
            "slice additive",
            &slice_bind_group_layout,
            &slice_module,
            format,
            additive_blend(),
            None,
        );
        let track_line_pipeline = create_pipeline(
            &device,
            "track line",
            &track_line_bind_group_layout,
            &track_line_module,
            format,
            wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
            None,
        );
        let hud_pipeline = create_pipeline(
            &device,
            "hud",
            &hud_bind_group_layout,
            &hud_module,
            format,
            wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
            None,
        );
        let hud_label_pipeline = create_pipeline(
            &device,
            "hud label",
            &hud_label_bind_group_layout,
            &hud_label_module,
            format,
            wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
            None,
        );

        log::info!("render engine ready ({width}x{height}, {format:?})");

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface,
            surface_config,
            headless_target,
            width,
            height,
            camera,
            camera_buffer,
            linear_sampler,
            nearest_sampler,
            colormap_sampler,
            dummy_label_view,
            dummy_label_texture,
            colormaps: ColormapCache::new(),
            volume_bind_group_layout,
            slice_bind_group_layout,
            track_line_bind_group_layout,
            hud_bind_group_layout,
            hud_label_bind_group_layout,
            volume_pipeline_alpha,
            volume_pipeline_additive,
            slice_pipeline_alpha,
            slice_pipeline_additive,
            track_line_pipeline,
            hud_pipeline,
            hud_label_pipeline,
        })
    }

    /// Resizes the surface and camera aspect. Track-line resolution
    /// uniforms are the caller's responsibility (they live per track).
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        self.surface_config.width = width;
        self.surface_config.height = height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.surface_config);
        } else {
            self.headless_target = Some(create_offscreen_target(
                &self.device,
                self.surface_config.format,
                width,
                height,
            ));
        }
        self.camera.set_aspect_ratio(width as f32 / height as f32);
    }

    /// Writes the camera matrices for this frame.
    pub fn update_camera_uniforms(&self) {
        let uniforms = CameraUniforms {
            view: self.camera.view_matrix().to_cols_array_2d(),
            proj: self.camera.projection_matrix().to_cols_array_2d(),
            view_proj: self.camera.view_projection_matrix().to_cols_array_2d(),
            inv_proj: self.camera.projection_matrix().inverse().to_cols_array_2d(),
            camera_pos: self.camera.position.to_array(),
            _padding: 0.0,
        };
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniforms]));
    }

    /// Renders one frame: volumes and slices in list order, then track
    /// outlines and lines, then the HUD.
    pub fn render(&mut self, content: &FrameContent<'_>) -> RenderResult<()> {
        self.update_camera_uniforms();

        let surface_texture = match &self.surface {
            Some(surface) => Some(surface.get_current_texture().map_err(|e| match e {
                wgpu::SurfaceError::Lost => RenderError::SurfaceLost,
                wgpu::SurfaceError::Outdated => RenderError::SurfaceOutdated,
                wgpu::SurfaceError::OutOfMemory => RenderError::OutOfMemory,
                _ => RenderError::SurfaceConfigurationFailed,
            })?),
            None => None,
        };
        let owned_view = surface_texture
            .as_ref()
            .map(|t| t.texture.create_view(&wgpu::TextureViewDescriptor::default()));
        let view = match (&owned_view, &self.headless_target) {
            (Some(v), _) => v,
            (None, Some((_, v))) => v,
            (None, None) => return Err(RenderError::SurfaceConfigurationFailed),
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(content.background),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for resources in &content.volumes {
                match &resources.mode_data {
                    ModeData::ThreeD { .. } => {
                        pass.set_pipeline(if content.additive {
                            &self.volume_pipeline_additive
                        } else {
                            &self.volume_pipeline_alpha
                        });
                        pass.set_bind_group(0, &resources.bind_group, &[]);
                        pass.draw(0..resources.vertex_count, 0..1);
                    }
                    ModeData::Slice { .. } => {
                        pass.set_pipeline(if content.additive {
                            &self.slice_pipeline_additive
                        } else {
                            &self.slice_pipeline_alpha
                        });
                        pass.set_bind_group(0, &resources.bind_group, &[]);
                        pass.draw(0..6, 0..1);
                    }
                }
            }

            pass.set_pipeline(&self.track_line_pipeline);
            // Outlines first so highlighted lines sit on their halo
            for track in &content.tracks {
                if track.visible && track.outline_visible && track.vertex_count() > 0 {
                    pass.set_bind_group(0, &track.outline_bind_group, &[]);
                    pass.draw(0..track.vertex_count(), 0..1);
                }
            }
            for track in &content.tracks {
                if track.visible && track.vertex_count() > 0 {
                    pass.set_bind_group(0, &track.line_bind_group, &[]);
                    pass.draw(0..track.vertex_count(), 0..1);
                }
            }

            if let Some(hud) = content.hud {
                if hud.visible {
                    pass.set_pipeline(&self.hud_pipeline);
                    pass.set_bind_group(0, &hud.bind_group, &[]);
                    pass.draw(0..hud.quad_count * 6, 0..1);

                    pass.set_pipeline(&self.hud_label_pipeline);
                    pass.set_bind_group(0, &hud.label_bind_group, &[]);
                    pass.draw(0..6, 0..1);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(t) = surface_texture {
            t.present();
        }
        Ok(())
    }
}

fn additive_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn create_offscreen_target(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("headless target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_3d_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D3,
            multisampled: false,
        },
        count: None,
    }
}

fn texture_2d_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn create_volume_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        uniform_entry(0),
        uniform_entry(1),
        storage_entry(2),
        texture_3d_entry(3, true),
        sampler_entry(4),
        texture_2d_entry(5),
        sampler_entry(6),
        // Label texture is read via textureLoad (exact integer semantics)
        texture_3d_entry(7, false),
    ];
    for i in 0..voluscope_core::clipmap::MAX_CLIP_LEVELS as u32 {
        entries.push(texture_3d_entry(8 + i, true));
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("volume layout"),
        entries: &entries,
    })
}

fn create_textured_quad_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            uniform_entry(0),
            uniform_entry(1),
            texture_2d_entry(2),
            sampler_entry(3),
        ],
    })
}

fn create_line_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[uniform_entry(0), uniform_entry(1), storage_entry(2)],
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
    cull_mode: Option<wgpu::Face>,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
