//! Per-layer GPU volume resources and the rebuild-vs-update decision.
//!
//! Exactly one `VolumeResources` exists per active layer key; the viewer
//! runtime reconciles the map against the layer list every pass. Rebuilds
//! (full dispose + recreate) happen only on structural changes; everything
//! else goes through the cheap update path, since a spurious rebuild shows
//! up as visible flicker and a GPU stall.

use glam::UVec3;
use wgpu::util::DeviceExt;

use voluscope_core::clipmap::ClipmapState;
use voluscope_core::error::ViewerError;
use voluscope_core::layer::{LayerMode, SamplingMode, ViewerLayer};
use voluscope_core::options::ViewerOptions;
use voluscope_core::volume::{CancelToken, NormalizedVolume};

use crate::clipmap_render::{pad_rgb_to_rgba, ClipmapTextures};
use crate::error::{RenderError, RenderResult};
use crate::raymarch::{generate_volume_box, RayMarchUniforms};
use crate::slice_compose::{
    compose_slice, slice_buffer_len, slice_model_matrix, SliceUniforms,
};

/// Texture format for a given interleaved channel count. wgpu has no
/// 3-channel format, so 3-channel volumes upload RGBA-padded.
#[must_use]
pub fn texture_format_for_channels(channels: u32) -> wgpu::TextureFormat {
    match channels {
        1 => wgpu::TextureFormat::R8Unorm,
        2 => wgpu::TextureFormat::Rg8Unorm,
        _ => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn upload_channels(channels: u32) -> u32 {
    if channels == 3 {
        4
    } else {
        channels
    }
}

/// Segmentation label texture: a parallel R32Float volume, nearest-filtered
/// via `textureLoad`, used only for hover highlighting.
pub struct LabelTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    voxel_count: usize,
}

impl LabelTexture {
    fn new(device: &wgpu::Device, dims: UVec3) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("segmentation labels"),
            size: wgpu::Extent3d {
                width: dims.x,
                height: dims.y,
                depth_or_array_layers: dims.z,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            voxel_count: dims.x as usize * dims.y as usize * dims.z as usize,
        }
    }

    fn upload(&self, queue: &wgpu::Queue, dims: UVec3, labels: &[f32]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(labels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(dims.x * 4),
                rows_per_image: Some(dims.y),
            },
            wgpu::Extent3d {
                width: dims.x,
                height: dims.y,
                depth_or_array_layers: dims.z,
            },
        );
    }
}

/// Mode-specific half of a layer's resources.
pub enum ModeData {
    ThreeD {
        uniforms: RayMarchUniforms,
        /// Byte length the texture was created for; a mismatch forces a
        /// rebuild.
        data_len: usize,
        /// Streaming state: CPU clip levels, their GPU textures, and an RGB
        /// padding scratch buffer.
        clipmap: Option<(ClipmapState, ClipmapTextures, Vec<u8>)>,
        label_texture: Option<LabelTexture>,
    },
    Slice {
        uniforms: SliceUniforms,
        /// Reusable CPU staging buffer for the composed RGBA slice.
        slice_buffer: Vec<u8>,
        current_index: u32,
    },
}

/// Shared GPU bindings needed to (re)create a volume bind group.
pub struct VolumeBindings<'a> {
    /// Layout for ray-marched 3D layers.
    pub layout: &'a wgpu::BindGroupLayout,
    /// Layout for slice-plane layers (2D texture).
    pub slice_layout: &'a wgpu::BindGroupLayout,
    pub camera_buffer: &'a wgpu::Buffer,
    pub linear_sampler: &'a wgpu::Sampler,
    pub nearest_sampler: &'a wgpu::Sampler,
    pub colormap_view: &'a wgpu::TextureView,
    pub colormap_sampler: &'a wgpu::Sampler,
    /// 1x1x1 R32Float fallback bound when a layer carries no labels.
    pub dummy_label_view: &'a wgpu::TextureView,
}

/// GPU resources owned by one layer key.
pub struct VolumeResources {
    pub mode: LayerMode,
    pub dims: UVec3,
    pub channels: u32,
    pub sampling_mode: SamplingMode,
    pub format: wgpu::TextureFormat,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub vertex_buffer: wgpu::Buffer,
    pub vertex_count: u32,
    pub uniform_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub mode_data: ModeData,
    /// RGB -> RGBA padding scratch for 3-channel uploads.
    rgb_staging: Vec<u8>,
    /// Identity of the volume whose bytes are on the GPU. A timepoint
    /// change swaps in a same-shape volume, which must refresh the texture
    /// without a rebuild.
    data_ptr: usize,
}

impl VolumeResources {
    /// Builds resources for a layer whose volume is present.
    ///
    /// 3D layers with a streaming source start from a 1x1x1 placeholder
    /// texture; the clipmap path populates the real data. Resident 3D
    /// layers upload the whole volume once here.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layer: &ViewerLayer,
        options: &ViewerOptions,
        bindings: &VolumeBindings<'_>,
    ) -> RenderResult<Self> {
        let volume = layer
            .volume
            .as_ref()
            .ok_or_else(|| ViewerError::LayerNotFound(layer.key.clone()))?;
        validate_volume(volume)?;

        let dims = volume.dims();
        let streaming = volume.streaming.is_some() && layer.mode == LayerMode::ThreeD;
        let mut rgb_staging = Vec::new();

        let (texture, mode_data) = match layer.mode {
            LayerMode::ThreeD => {
                let format = texture_format_for_channels(volume.channels);
                let tex_dims = if streaming { UVec3::ONE } else { dims };
                let texture = create_volume_texture(device, tex_dims, format);
                if !streaming {
                    upload_volume_bytes(queue, &texture, volume, &mut rgb_staging);
                }

                let mut uniforms = RayMarchUniforms::default();
                uniforms.apply_layer(layer, options, dims);

                let clipmap = if streaming {
                    let state = ClipmapState::new(volume);
                    let textures = ClipmapTextures::new(device, &state);
                    Some((state, textures, Vec::new()))
                } else {
                    None
                };

                let label_texture = volume.segmentation_labels.as_ref().map(|labels| {
                    let lt = LabelTexture::new(device, dims);
                    lt.upload(queue, dims, labels);
                    lt
                });

                let expected =
                    dims.x as usize * dims.y as usize * dims.z as usize * volume.channels as usize;
                (
                    texture,
                    ModeData::ThreeD {
                        uniforms,
                        data_len: expected,
                        clipmap,
                        label_texture,
                    },
                )
            }
            LayerMode::Slice => {
                let format = wgpu::TextureFormat::Rgba8Unorm;
                let texture =
                    create_slice_texture(device, UVec3::new(dims.x, dims.y, 1), format);
                let mut slice_buffer = Vec::new();
                let index = layer.slice_index.min(dims.z.saturating_sub(1));
                compose_slice(volume, layer, index, &mut slice_buffer)?;
                upload_slice_bytes(queue, &texture, dims, &slice_buffer);

                let mut uniforms = SliceUniforms::default();
                uniforms.model = slice_model_matrix(layer, index).to_cols_array_2d();
                uniforms.params = [dims.x as f32, dims.y as f32, 0.0, 1.0];

                (
                    texture,
                    ModeData::Slice {
                        uniforms,
                        slice_buffer,
                        current_index: index,
                    },
                )
            }
        };

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let format = texture.format();

        let vertices = generate_volume_box();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("volume box vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_buffer = match &mode_data {
            ModeData::ThreeD { uniforms, .. } => {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("raymarch uniforms"),
                    contents: bytemuck::cast_slice(&[*uniforms]),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                })
            }
            ModeData::Slice { uniforms, .. } => {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("slice uniforms"),
                    contents: bytemuck::cast_slice(&[*uniforms]),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                })
            }
        };

        let bind_group = create_volume_bind_group(
            device,
            bindings,
            layer.sampling_mode,
            &view,
            &uniform_buffer,
            &vertex_buffer,
            &mode_data,
        );
        let resources = Self {
            mode: layer.mode,
            dims,
            channels: volume.channels,
            sampling_mode: layer.sampling_mode,
            format,
            texture,
            view,
            vertex_buffer,
            vertex_count: 36,
            uniform_buffer,
            bind_group,
            mode_data,
            rgb_staging,
            data_ptr: volume.normalized.as_ptr() as usize,
        };
        log::info!(
            "built volume resources for layer '{}' ({}x{}x{}, {} ch, {:?})",
            layer.key,
            dims.x,
            dims.y,
            dims.z,
            volume.channels,
            layer.mode
        );
        Ok(resources)
    }

    /// Whether a structural property changed so the resources must be
    /// disposed and recreated. Parameter-only changes return false and go
    /// through [`Self::update`].
    #[must_use]
    pub fn needs_rebuild(&self, layer: &ViewerLayer) -> bool {
        let Some(volume) = layer.volume.as_ref() else {
            return true;
        };
        if layer.mode != self.mode
            || volume.dims() != self.dims
            || volume.channels != self.channels
        {
            return true;
        }
        match &self.mode_data {
            ModeData::ThreeD { data_len, .. } => {
                let expected = volume.voxel_count() * volume.channels as usize;
                expected != *data_len
                    || texture_format_for_channels(volume.channels) != self.format
            }
            ModeData::Slice { slice_buffer, .. } => {
                slice_buffer.len() != slice_buffer_len(volume)
            }
        }
    }

    /// Cheap per-frame update: refresh uniforms, recompose/re-upload the
    /// slice when its index changed, and keep the label texture current.
    /// Never allocates a new texture.
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layer: &ViewerLayer,
        options: &ViewerOptions,
        bindings: &VolumeBindings<'_>,
    ) -> RenderResult<()> {
        let volume = layer
            .volume
            .as_ref()
            .ok_or_else(|| ViewerError::LayerNotFound(layer.key.clone()))?;

        if layer.sampling_mode != self.sampling_mode {
            self.sampling_mode = layer.sampling_mode;
            self.rebuild_bind_group(device, bindings);
        }

        // Same-shape data swap (timepoint change): refresh texture bytes
        // in place instead of rebuilding.
        if volume.normalized.as_ptr() as usize != self.data_ptr {
            self.data_ptr = volume.normalized.as_ptr() as usize;
            if matches!(&self.mode_data, ModeData::ThreeD { clipmap: None, .. }) {
                upload_volume_bytes(queue, &self.texture, volume, &mut self.rgb_staging);
            }
        }

        let mut rebind = false;
        match &mut self.mode_data {
            ModeData::ThreeD {
                uniforms,
                label_texture,
                ..
            } => {
                uniforms.apply_layer(layer, options, self.dims);
                queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));

                if let Some(labels) = volume.segmentation_labels.as_ref() {
                    // Rebuilt only when the voxel count changed; otherwise
                    // values are copied in place
                    let rebuild = label_texture
                        .as_ref()
                        .is_none_or(|lt| lt.voxel_count != labels.len());
                    if rebuild {
                        let lt = LabelTexture::new(device, self.dims);
                        lt.upload(queue, self.dims, labels);
                        *label_texture = Some(lt);
                        rebind = true;
                    } else if let Some(lt) = label_texture.as_ref() {
                        lt.upload(queue, self.dims, labels);
                    }
                }
            }
            ModeData::Slice {
                uniforms,
                slice_buffer,
                current_index,
            } => {
                let index = layer.slice_index.min(self.dims.z.saturating_sub(1));
                compose_slice(volume, layer, index, slice_buffer)?;
                upload_slice_bytes(queue, &self.texture, self.dims, slice_buffer);
                *current_index = index;
                uniforms.model = slice_model_matrix(layer, index).to_cols_array_2d();
                uniforms.params[2] = f32::from(u8::from(options.additive_blending));
                queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
            }
        }
        if rebind {
            self.rebuild_bind_group(device, bindings);
        }
        Ok(())
    }

    /// Re-uploads the resident 3D volume bytes (data swapped upstream).
    pub fn upload_volume(&mut self, queue: &wgpu::Queue, volume: &NormalizedVolume) {
        if matches!(
            &self.mode_data,
            ModeData::ThreeD { clipmap: None, .. }
        ) {
            upload_volume_bytes(queue, &self.texture, volume, &mut self.rgb_staging);
        }
    }

    /// Advances the clipmap around a focus point and coalesces uploads.
    /// Returns true when any level repopulated.
    pub fn update_clipmap(
        &mut self,
        queue: &wgpu::Queue,
        volume: &NormalizedVolume,
        focus: glam::Vec3,
        cancel: &CancelToken,
    ) -> bool {
        let ModeData::ThreeD {
            uniforms,
            clipmap: Some((state, textures, staging)),
            ..
        } = &mut self.mode_data
        else {
            return false;
        };

        let repopulated = state.update(volume, focus, cancel);
        textures.upload_pending(queue, state, staging);
        ClipmapTextures::apply_to_uniforms(state, uniforms);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
        repopulated > 0
    }

    /// Raises or restores the minimum clip level during fast interaction.
    pub fn set_interaction_lod(&mut self, queue: &wgpu::Queue, drop_fine: bool) {
        if let ModeData::ThreeD {
            uniforms,
            clipmap: Some((state, _, _)),
            ..
        } = &mut self.mode_data
        {
            state.set_interaction_lod(drop_fine);
            ClipmapTextures::apply_to_uniforms(state, uniforms);
            queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
        }
    }

    /// Writes the hover highlight uniform (or clears it).
    pub fn write_hover(
        &mut self,
        queue: &wgpu::Queue,
        hover: Option<(glam::Vec3, f32, Option<f32>)>,
    ) {
        if let ModeData::ThreeD { uniforms, .. } = &mut self.mode_data {
            match hover {
                Some((position, pulse, label)) => uniforms.set_hover(position, pulse, label),
                None => uniforms.clear_hover(),
            }
            queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
        }
    }

    /// Recreates the bind group against the current textures and samplers
    /// (sampling-mode swap, label texture rebuild, colormap change).
    pub fn rebuild_bind_group(&mut self, device: &wgpu::Device, bindings: &VolumeBindings<'_>) {
        self.bind_group = create_volume_bind_group(
            device,
            bindings,
            self.sampling_mode,
            &self.view,
            &self.uniform_buffer,
            &self.vertex_buffer,
            &self.mode_data,
        );
    }
}

fn create_volume_bind_group(
    device: &wgpu::Device,
    bindings: &VolumeBindings<'_>,
    sampling_mode: SamplingMode,
    view: &wgpu::TextureView,
    uniform_buffer: &wgpu::Buffer,
    vertex_buffer: &wgpu::Buffer,
    mode_data: &ModeData,
) -> wgpu::BindGroup {
    let sampler = match sampling_mode {
        SamplingMode::Linear => bindings.linear_sampler,
        SamplingMode::Nearest => bindings.nearest_sampler,
    };

    // Slice layers bind a plain textured quad.
    if let ModeData::Slice { .. } = mode_data {
        return device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("slice bind group"),
            layout: bindings.slice_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: bindings.camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(bindings.linear_sampler),
                },
            ],
        });
    }

    let label_view = match mode_data {
        ModeData::ThreeD {
            label_texture: Some(lt),
            ..
        } => &lt.view,
        _ => bindings.dummy_label_view,
    };

    // Clip slots fall back to the main volume view when no clipmap is
    // active; the shader only reads them when clip_info.x is set.
    let clip_views: [&wgpu::TextureView; voluscope_core::clipmap::MAX_CLIP_LEVELS] =
        match mode_data {
            ModeData::ThreeD {
                clipmap: Some((_, textures, _)),
                ..
            } => textures.binding_views(),
            _ => std::array::from_fn(|_| view),
        };

    let mut entries = vec![
        wgpu::BindGroupEntry {
            binding: 0,
            resource: bindings.camera_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
            binding: 1,
            resource: uniform_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
            binding: 2,
            resource: vertex_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
            binding: 3,
            resource: wgpu::BindingResource::TextureView(view),
        },
        wgpu::BindGroupEntry {
            binding: 4,
            resource: wgpu::BindingResource::Sampler(sampler),
        },
        wgpu::BindGroupEntry {
            binding: 5,
            resource: wgpu::BindingResource::TextureView(bindings.colormap_view),
        },
        wgpu::BindGroupEntry {
            binding: 6,
            resource: wgpu::BindingResource::Sampler(bindings.colormap_sampler),
        },
        wgpu::BindGroupEntry {
            binding: 7,
            resource: wgpu::BindingResource::TextureView(label_view),
        },
    ];
    for (i, clip_view) in clip_views.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: 8 + i as u32,
            resource: wgpu::BindingResource::TextureView(clip_view),
        });
    }

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("volume bind group"),
        layout: bindings.layout,
        entries: &entries,
    })
}

fn validate_volume(volume: &NormalizedVolume) -> RenderResult<()> {
    let expected = volume.voxel_count() * volume.channels as usize;
    if volume.normalized.len() < expected {
        return Err(RenderError::Data(ViewerError::DataIntegrity {
            expected,
            actual: volume.normalized.len(),
            width: volume.width,
            height: volume.height,
            depth: volume.depth,
            channels: volume.channels,
        }));
    }
    Ok(())
}

fn create_volume_texture(
    device: &wgpu::Device,
    dims: UVec3,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("volume data"),
        size: wgpu::Extent3d {
            width: dims.x,
            height: dims.y,
            depth_or_array_layers: dims.z,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D3,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn create_slice_texture(
    device: &wgpu::Device,
    dims: UVec3,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("slice data"),
        size: wgpu::Extent3d {
            width: dims.x,
            height: dims.y,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn upload_volume_bytes(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    volume: &NormalizedVolume,
    rgb_staging: &mut Vec<u8>,
) {
    let dims = volume.dims();
    let data: &[u8] = if volume.channels == 3 {
        pad_rgb_to_rgba(&volume.normalized, rgb_staging);
        rgb_staging
    } else {
        &volume.normalized
    };
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(dims.x * upload_channels(volume.channels)),
            rows_per_image: Some(dims.y),
        },
        wgpu::Extent3d {
            width: dims.x,
            height: dims.y,
            depth_or_array_layers: dims.z,
        },
    );
}

fn upload_slice_bytes(queue: &wgpu::Queue, texture: &wgpu::Texture, dims: UVec3, data: &[u8]) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(dims.x * 4),
            rows_per_image: Some(dims.y),
        },
        wgpu::Extent3d {
            width: dims.x,
            height: dims.y,
            depth_or_array_layers: 1,
        },
    );
}
