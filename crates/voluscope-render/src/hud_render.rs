//! World-anchored VR playback HUD rendering.
//!
//! The HUD is a camera-attached panel (fixed local offset, so it stays put
//! in the wearer's view) holding a circular play/pause toggle, a scrub
//! slider with an invisible widened hit area, and a text label rasterized
//! into a texture only when the string actually changes. Geometry is a
//! small instanced-quad list rebuilt on state changes; hit testing against
//! the same layout constants lives in the viewer crate.

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

/// Local offset of the panel from the camera (meters).
pub const HUD_LOCAL_OFFSET: Vec3 = Vec3::new(0.0, -0.18, -0.55);

/// Panel half extents.
pub const PANEL_HALF_WIDTH: f32 = 0.21;
pub const PANEL_HALF_HEIGHT: f32 = 0.07;

/// Play/pause toggle.
pub const PLAY_BUTTON_CENTER: [f32; 2] = [-0.15, 0.0];
pub const PLAY_BUTTON_RADIUS: f32 = 0.035;

/// Scrub slider track.
pub const SLIDER_CENTER: [f32; 2] = [0.05, -0.02];
pub const SLIDER_HALF_WIDTH: f32 = 0.13;
pub const SLIDER_TRACK_HALF_HEIGHT: f32 = 0.004;
pub const SLIDER_KNOB_RADIUS: f32 = 0.014;
/// Invisible, taller hit area for easier grabbing.
pub const SLIDER_HIT_HALF_HEIGHT: f32 = 0.03;

/// Label quad (above the slider).
pub const LABEL_CENTER: [f32; 2] = [0.05, 0.042];
pub const LABEL_HALF_SIZE: [f32; 2] = [0.09, 0.012];

/// Quad shape selector understood by the HUD fragment shader.
pub const SHAPE_RECT: f32 = 0.0;
pub const SHAPE_CIRCLE: f32 = 1.0;
pub const SHAPE_TRIANGLE: f32 = 2.0;

/// Interactable HUD elements, in hit-test priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HudElement {
    PlayButton,
    SliderKnob,
    SliderTrack,
}

/// Input state the HUD renders from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HudVisualState {
    pub playing: bool,
    /// Slider position in [0, 1].
    pub fraction: f32,
    pub hovered: Option<HudElement>,
    pub pressed: Option<HudElement>,
}

impl Default for HudVisualState {
    fn default() -> Self {
        Self {
            playing: false,
            fraction: 0.0,
            hovered: None,
            pressed: None,
        }
    }
}

/// One HUD quad instance.
/// Layout must match WGSL `HudQuad` exactly (48 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HudQuadInstance {
    /// xy = center in panel-local units, zw = half size.
    pub center_size: [f32; 4],
    /// RGBA.
    pub color: [f32; 4],
    /// x = shape selector, yzw unused.
    pub kind: [f32; 4],
}

/// HUD pass uniforms.
/// Layout must match WGSL `HudUniforms` exactly (80 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HudUniforms {
    /// Panel local -> world transform (camera pose * fixed local offset).
    pub model: [[f32; 4]; 4],
    /// x = quad count, yzw unused.
    pub params: [f32; 4],
}

/// Knob center X in panel-local units for a slider fraction.
#[must_use]
pub fn knob_center_x(fraction: f32) -> f32 {
    SLIDER_CENTER[0] + (fraction.clamp(0.0, 1.0) * 2.0 - 1.0) * SLIDER_HALF_WIDTH
}

/// Inverse of [`knob_center_x`]: slider fraction for a local-space X hit,
/// clamped to [0, 1]. Composing the two is idempotent for in-range input.
#[must_use]
pub fn fraction_from_local_x(x: f32) -> f32 {
    (((x - SLIDER_CENTER[0]) / SLIDER_HALF_WIDTH) * 0.5 + 0.5).clamp(0.0, 1.0)
}

fn element_color(base: [f32; 4], hovered: bool, pressed: bool) -> [f32; 4] {
    if pressed {
        [base[0] * 1.4, base[1] * 1.4, base[2] * 1.4, base[3]]
    } else if hovered {
        [base[0] * 1.2, base[1] * 1.2, base[2] * 1.2, base[3]]
    } else {
        base
    }
}

/// Builds the HUD quad list for a visual state. Pure; the GPU side uploads
/// the result verbatim.
#[must_use]
pub fn build_hud_quads(state: &HudVisualState) -> Vec<HudQuadInstance> {
    let mut quads = Vec::with_capacity(8);

    // Panel background
    quads.push(HudQuadInstance {
        center_size: [0.0, 0.0, PANEL_HALF_WIDTH, PANEL_HALF_HEIGHT],
        color: [0.08, 0.09, 0.12, 0.82],
        kind: [SHAPE_RECT, 0.0, 0.0, 0.0],
    });

    // Play/pause toggle disc
    let button_hovered = state.hovered == Some(HudElement::PlayButton);
    let button_pressed = state.pressed == Some(HudElement::PlayButton);
    quads.push(HudQuadInstance {
        center_size: [
            PLAY_BUTTON_CENTER[0],
            PLAY_BUTTON_CENTER[1],
            PLAY_BUTTON_RADIUS,
            PLAY_BUTTON_RADIUS,
        ],
        color: element_color([0.22, 0.45, 0.62, 1.0], button_hovered, button_pressed),
        kind: [SHAPE_CIRCLE, 0.0, 0.0, 0.0],
    });

    // Glyph swaps between a triangle (paused) and two bars (playing)
    if state.playing {
        for dx in [-0.011, 0.011] {
            quads.push(HudQuadInstance {
                center_size: [
                    PLAY_BUTTON_CENTER[0] + dx,
                    PLAY_BUTTON_CENTER[1],
                    0.005,
                    0.016,
                ],
                color: [0.95, 0.96, 0.98, 1.0],
                kind: [SHAPE_RECT, 0.0, 0.0, 0.0],
            });
        }
    } else {
        quads.push(HudQuadInstance {
            center_size: [
                PLAY_BUTTON_CENTER[0] + 0.004,
                PLAY_BUTTON_CENTER[1],
                0.016,
                0.016,
            ],
            color: [0.95, 0.96, 0.98, 1.0],
            kind: [SHAPE_TRIANGLE, 0.0, 0.0, 0.0],
        });
    }

    // Slider track + fill
    quads.push(HudQuadInstance {
        center_size: [
            SLIDER_CENTER[0],
            SLIDER_CENTER[1],
            SLIDER_HALF_WIDTH,
            SLIDER_TRACK_HALF_HEIGHT,
        ],
        color: [0.25, 0.27, 0.32, 1.0],
        kind: [SHAPE_RECT, 0.0, 0.0, 0.0],
    });
    let fraction = state.fraction.clamp(0.0, 1.0);
    if fraction > 0.0 {
        let fill_half = fraction * SLIDER_HALF_WIDTH;
        quads.push(HudQuadInstance {
            center_size: [
                SLIDER_CENTER[0] - SLIDER_HALF_WIDTH + fill_half,
                SLIDER_CENTER[1],
                fill_half,
                SLIDER_TRACK_HALF_HEIGHT,
            ],
            color: [0.30, 0.68, 0.85, 1.0],
            kind: [SHAPE_RECT, 0.0, 0.0, 0.0],
        });
    }

    // Knob (the widened hit area is invisible and never drawn)
    let knob_hovered = matches!(
        state.hovered,
        Some(HudElement::SliderKnob | HudElement::SliderTrack)
    );
    let knob_pressed = matches!(
        state.pressed,
        Some(HudElement::SliderKnob | HudElement::SliderTrack)
    );
    let knob_radius = if knob_hovered || knob_pressed {
        SLIDER_KNOB_RADIUS * 1.2
    } else {
        SLIDER_KNOB_RADIUS
    };
    quads.push(HudQuadInstance {
        center_size: [
            knob_center_x(fraction),
            SLIDER_CENTER[1],
            knob_radius,
            knob_radius,
        ],
        color: element_color([0.88, 0.90, 0.94, 1.0], knob_hovered, knob_pressed),
        kind: [SHAPE_CIRCLE, 0.0, 0.0, 0.0],
    });

    quads
}

/// Upper bound on HUD quads, used to size the storage buffer once.
pub const MAX_HUD_QUADS: usize = 8;

/// Label texture dimensions.
pub const LABEL_TEXTURE_WIDTH: u32 = 128;
pub const LABEL_TEXTURE_HEIGHT: u32 = 16;

/// GPU resources for the HUD.
pub struct HudRenderData {
    pub quad_buffer: wgpu::Buffer,
    pub quad_count: u32,
    pub uniform_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,

    pub label_texture: wgpu::Texture,
    pub label_view: wgpu::TextureView,
    pub label_uniform_buffer: wgpu::Buffer,
    pub label_bind_group: wgpu::BindGroup,
    current_label: String,

    last_state: Option<HudVisualState>,
    pub visible: bool,
}

impl HudRenderData {
    /// Creates the HUD resources (hidden until a session presents).
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        quad_layout: &wgpu::BindGroupLayout,
        label_layout: &wgpu::BindGroupLayout,
        camera_buffer: &wgpu::Buffer,
        label_sampler: &wgpu::Sampler,
    ) -> Self {
        let quads = build_hud_quads(&HudVisualState::default());
        let mut padded = quads.clone();
        padded.resize(
            MAX_HUD_QUADS,
            HudQuadInstance {
                center_size: [0.0; 4],
                color: [0.0; 4],
                kind: [SHAPE_RECT, 0.0, 0.0, 0.0],
            },
        );
        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("hud quads"),
            contents: bytemuck::cast_slice(&padded),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let uniforms = HudUniforms {
            model: Mat4::IDENTITY.to_cols_array_2d(),
            params: [quads.len() as f32, 0.0, 0.0, 0.0],
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("hud uniforms"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("hud bind group"),
            layout: quad_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: quad_buffer.as_entire_binding(),
                },
            ],
        });

        let label_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("hud label"),
            size: wgpu::Extent3d {
                width: LABEL_TEXTURE_WIDTH,
                height: LABEL_TEXTURE_HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let label_view = label_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let label_uniforms = HudUniforms {
            model: Mat4::IDENTITY.to_cols_array_2d(),
            params: [
                LABEL_CENTER[0],
                LABEL_CENTER[1],
                LABEL_HALF_SIZE[0],
                LABEL_HALF_SIZE[1],
            ],
        };
        let label_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("hud label uniforms"),
            contents: bytemuck::cast_slice(&[label_uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let label_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("hud label bind group"),
            layout: label_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: label_uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&label_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(label_sampler),
                },
            ],
        });

        Self {
            quad_buffer,
            quad_count: quads.len() as u32,
            uniform_buffer,
            bind_group,
            label_texture,
            label_view,
            label_uniform_buffer,
            label_bind_group,
            current_label: String::new(),
            last_state: None,
            visible: false,
        }
    }

    /// Uploads the quad list when the visual state changed since last time.
    pub fn update_quads(&mut self, queue: &wgpu::Queue, state: &HudVisualState) {
        if self.last_state.as_ref() == Some(state) {
            return;
        }
        let quads = build_hud_quads(state);
        self.quad_count = quads.len() as u32;
        queue.write_buffer(&self.quad_buffer, 0, bytemuck::cast_slice(&quads));
        self.last_state = Some(*state);
    }

    /// Re-anchors the panel to the camera pose (model matrix carries the
    /// fixed local offset).
    pub fn update_anchor(&self, queue: &wgpu::Queue, camera_world: &Mat4) {
        let model = *camera_world * Mat4::from_translation(HUD_LOCAL_OFFSET);
        let uniforms = HudUniforms {
            model: model.to_cols_array_2d(),
            params: [self.quad_count as f32, 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let label_uniforms = HudUniforms {
            model: model.to_cols_array_2d(),
            params: [
                LABEL_CENTER[0],
                LABEL_CENTER[1],
                LABEL_HALF_SIZE[0],
                LABEL_HALF_SIZE[1],
            ],
        };
        queue.write_buffer(
            &self.label_uniform_buffer,
            0,
            bytemuck::cast_slice(&[label_uniforms]),
        );
    }

    /// Rasterizes and uploads the label, skipping the work entirely when
    /// the string is unchanged.
    pub fn set_label(&mut self, queue: &wgpu::Queue, text: &str) {
        if self.current_label == text {
            return;
        }
        let pixels = rasterize_label(text);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.label_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(LABEL_TEXTURE_WIDTH * 4),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: LABEL_TEXTURE_WIDTH,
                height: LABEL_TEXTURE_HEIGHT,
                depth_or_array_layers: 1,
            },
        );
        self.current_label = text.to_string();
    }

    /// The label currently on the texture.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.current_label
    }
}

/// 5x7 bitmap glyphs for the characters the playback label uses.
fn glyph_rows(c: char) -> [u8; 7] {
    match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '/' => [0x01, 0x01, 0x02, 0x04, 0x08, 0x10, 0x10],
        't' => [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
        '=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        _ => [0x00; 7],
    }
}

/// Rasterizes `text` into an RGBA8 buffer sized to the label texture,
/// left-aligned, 2x scaled 5x7 glyphs on a transparent background.
#[must_use]
pub fn rasterize_label(text: &str) -> Vec<u8> {
    let w = LABEL_TEXTURE_WIDTH as usize;
    let h = LABEL_TEXTURE_HEIGHT as usize;
    let mut pixels = vec![0u8; w * h * 4];

    let scale = 2usize;
    let glyph_w = 5 * scale + 2;
    let top = (h - 7 * scale) / 2;

    for (ci, c) in text.chars().enumerate() {
        let x0 = 2 + ci * glyph_w;
        if x0 + 5 * scale > w {
            break;
        }
        let rows = glyph_rows(c);
        for (ry, row) in rows.iter().enumerate() {
            for rx in 0..5 {
                if row & (0x10 >> rx) == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        let px = x0 + rx * scale + sx;
                        let py = top + ry * scale + sy;
                        let idx = (py * w + px) * 4;
                        pixels[idx..idx + 4].copy_from_slice(&[235, 238, 245, 255]);
                    }
                }
            }
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hud_quad_instance_size() {
        let size = std::mem::size_of::<HudQuadInstance>();
        assert_eq!(size, 48, "HudQuadInstance should be 48 bytes, got {size}");
    }

    #[test]
    fn test_hud_uniforms_size() {
        let size = std::mem::size_of::<HudUniforms>();
        assert_eq!(size, 80, "HudUniforms should be 80 bytes, got {size}");
    }

    #[test]
    fn test_slider_fraction_round_trip() {
        for fraction in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let x = knob_center_x(fraction);
            let back = fraction_from_local_x(x);
            assert!((back - fraction).abs() < 1e-6, "round trip failed at {fraction}");
        }
        // Out-of-range hits clamp
        assert_eq!(fraction_from_local_x(-10.0), 0.0);
        assert_eq!(fraction_from_local_x(10.0), 1.0);
    }

    proptest::proptest! {
        #[test]
        fn prop_slider_round_trip_idempotent(fraction in 0.0f32..=1.0) {
            let once = fraction_from_local_x(knob_center_x(fraction));
            let twice = fraction_from_local_x(knob_center_x(once));
            proptest::prop_assert!((once - fraction).abs() < 1e-5);
            proptest::prop_assert!((twice - once).abs() < 1e-6);
        }
    }

    #[test]
    fn test_glyph_swaps_with_playing_state() {
        let paused = build_hud_quads(&HudVisualState::default());
        let playing = build_hud_quads(&HudVisualState {
            playing: true,
            ..HudVisualState::default()
        });
        let triangles = |quads: &[HudQuadInstance]| {
            quads.iter().filter(|q| q.kind[0] == SHAPE_TRIANGLE).count()
        };
        assert_eq!(triangles(&paused), 1);
        assert_eq!(triangles(&playing), 0);
        // Pause glyph is two bars, so playing has one more quad
        assert_eq!(playing.len(), paused.len() + 1);
    }

    #[test]
    fn test_quad_count_bounded() {
        for playing in [false, true] {
            for fraction in [0.0, 0.6] {
                let quads = build_hud_quads(&HudVisualState {
                    playing,
                    fraction,
                    hovered: Some(HudElement::SliderKnob),
                    pressed: Some(HudElement::PlayButton),
                });
                assert!(quads.len() <= MAX_HUD_QUADS);
            }
        }
    }

    #[test]
    fn test_hover_brightens_button() {
        let plain = build_hud_quads(&HudVisualState::default());
        let hovered = build_hud_quads(&HudVisualState {
            hovered: Some(HudElement::PlayButton),
            ..HudVisualState::default()
        });
        assert!(hovered[1].color[0] > plain[1].color[0]);
    }

    #[test]
    fn test_label_rasterizes_known_glyphs() {
        let pixels = rasterize_label("1/2");
        assert_eq!(
            pixels.len(),
            (LABEL_TEXTURE_WIDTH * LABEL_TEXTURE_HEIGHT * 4) as usize
        );
        assert!(pixels.chunks_exact(4).any(|p| p[3] == 255));
        // Unknown characters leave the texture blank
        let blank = rasterize_label("@@@");
        assert!(blank.chunks_exact(4).all(|p| p[3] == 0));
    }
}
