//! CPU composition of 2D slice buffers.
//!
//! Slice-mode layers are textured quads: windowing, inversion, and the
//! layer colormap are baked into an RGBA8 buffer here, re-uploaded whenever
//! the slice index or display parameters change. The previous buffer's
//! backing store is reused when the size is unchanged to avoid per-frame
//! allocation churn.

use glam::Vec3;

use voluscope_core::error::{Result, ViewerError};
use voluscope_core::layer::ViewerLayer;
use voluscope_core::transfer::{parse_hex_color, windowed_intensity};
use voluscope_core::volume::NormalizedVolume;

/// Byte length of the composed RGBA8 buffer for one slice.
#[must_use]
pub fn slice_buffer_len(volume: &NormalizedVolume) -> usize {
    volume.width as usize * volume.height as usize * 4
}

/// Composes one z-slice of `volume` into `out` (RGBA8, row-major).
///
/// Channel mapping: 1-channel volumes run through the layer colormap;
/// 2-channel volumes map to red/green with blue forced to zero; 3- and
/// 4-channel volumes map channels directly. Alpha is always 255 (slices are
/// opaque cuts, not compositing volumes). `out` is resized only when the
/// required length changed.
///
/// # Errors
///
/// Returns [`ViewerError::DataIntegrity`] when `slice_index` is outside the
/// volume depth.
pub fn compose_slice(
    volume: &NormalizedVolume,
    layer: &ViewerLayer,
    slice_index: u32,
    out: &mut Vec<u8>,
) -> Result<()> {
    if slice_index >= volume.depth {
        return Err(ViewerError::DataIntegrity {
            expected: volume.depth as usize,
            actual: slice_index as usize,
            width: volume.width,
            height: volume.height,
            depth: volume.depth,
            channels: volume.channels,
        });
    }

    let len = slice_buffer_len(volume);
    if out.len() != len {
        out.clear();
        out.resize(len, 0);
    }

    let tint = parse_hex_color(&layer.color).unwrap_or(Vec3::ONE);
    let window = |byte: u8| {
        windowed_intensity(
            f32::from(byte) / 255.0,
            layer.window_min,
            layer.window_max,
            layer.invert,
        )
    };
    let to_byte = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;

    let ch = volume.channels as usize;
    for y in 0..volume.height {
        for x in 0..volume.width {
            // Bounds guaranteed by the slice_index check above.
            let src = volume
                .voxel_index(x, y, slice_index)
                .expect("slice voxel in bounds");
            let dst = (y as usize * volume.width as usize + x as usize) * 4;
            let texel = &mut out[dst..dst + 4];

            match ch {
                1 => {
                    let w = window(volume.normalized[src]);
                    texel[0] = to_byte(w * tint.x);
                    texel[1] = to_byte(w * tint.y);
                    texel[2] = to_byte(w * tint.z);
                }
                2 => {
                    texel[0] = to_byte(window(volume.normalized[src]));
                    texel[1] = to_byte(window(volume.normalized[src + 1]));
                    texel[2] = 0;
                }
                _ => {
                    texel[0] = to_byte(window(volume.normalized[src]));
                    texel[1] = to_byte(window(volume.normalized[src + 1]));
                    texel[2] = to_byte(window(volume.normalized[src + 2]));
                }
            }
            texel[3] = 255;
        }
    }
    Ok(())
}

/// Per-layer slice quad uniforms.
/// Layout must match WGSL `SliceUniforms` exactly (96 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SliceUniforms {
    /// Quad local -> world transform, including the slice-index offset
    /// along the plane normal.
    pub model: [[f32; 4]; 4],
    /// xy = plane size (width, height), z = additive flag, w = opacity.
    pub params: [f32; 4],
    /// Padding to keep parity with the ray-march binding stride.
    pub _pad: [f32; 4],
}

impl Default for SliceUniforms {
    fn default() -> Self {
        Self {
            model: glam::Mat4::IDENTITY.to_cols_array_2d(),
            params: [1.0, 1.0, 0.0, 1.0],
            _pad: [0.0; 4],
        }
    }
}

/// Positions a slice quad at its index along the normal axis.
#[must_use]
pub fn slice_model_matrix(layer: &ViewerLayer, slice_index: u32) -> glam::Mat4 {
    glam::Mat4::from_translation(glam::Vec3::new(
        layer.offset_x,
        layer.offset_y,
        slice_index as f32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use voluscope_core::volume::VolumeDataType;

    fn two_channel_slice_volume() -> NormalizedVolume {
        // 4x4x1, 2 channels, gradient data
        let mut data = Vec::with_capacity(4 * 4 * 2);
        for i in 0..16u8 {
            data.push(i * 16);
            data.push(255 - i * 16);
        }
        NormalizedVolume::new(4, 4, 1, 2, data, 0.0, 1.0, VolumeDataType::Uint8).unwrap()
    }

    #[test]
    fn test_two_channel_slice_scenario() {
        // 2-channel 4x4x1, window [0,1], slice 0: 64-byte RGBA buffer with
        // blue forced to zero and alpha 255 everywhere.
        let volume = two_channel_slice_volume();
        let layer = ViewerLayer::new("ch", Arc::new(two_channel_slice_volume()));
        let mut out = Vec::new();
        compose_slice(&volume, &layer, 0, &mut out).unwrap();

        assert_eq!(out.len(), 4 * 4 * 4);
        for texel in out.chunks_exact(4) {
            assert_eq!(texel[2], 0, "blue must be forced to zero");
            assert_eq!(texel[3], 255, "alpha must be opaque");
        }
        // First voxel: ch0 = 0, ch1 = 255
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 255);
    }

    #[test]
    fn test_slice_buffer_reused_when_size_unchanged() {
        let volume = two_channel_slice_volume();
        let layer = ViewerLayer::new("ch", Arc::new(two_channel_slice_volume()));
        let mut out = Vec::new();
        compose_slice(&volume, &layer, 0, &mut out).unwrap();
        let ptr = out.as_ptr();
        compose_slice(&volume, &layer, 0, &mut out).unwrap();
        assert_eq!(ptr, out.as_ptr(), "backing store must be reused");
    }

    #[test]
    fn test_slice_index_out_of_range_fails_loudly() {
        let volume = two_channel_slice_volume();
        let layer = ViewerLayer::new("ch", Arc::new(two_channel_slice_volume()));
        let mut out = Vec::new();
        assert!(compose_slice(&volume, &layer, 1, &mut out).is_err());
    }

    #[test]
    fn test_single_channel_uses_colormap_tint() {
        let volume =
            NormalizedVolume::new(2, 1, 1, 1, vec![255, 0], 0.0, 1.0, VolumeDataType::Uint8)
                .unwrap();
        let mut layer = ViewerLayer::new(
            "ch",
            Arc::new(
                NormalizedVolume::new(2, 1, 1, 1, vec![255, 0], 0.0, 1.0, VolumeDataType::Uint8)
                    .unwrap(),
            ),
        );
        layer.color = "#00ff00".to_string();
        let mut out = Vec::new();
        compose_slice(&volume, &layer, 0, &mut out).unwrap();
        assert_eq!(&out[0..4], &[0, 255, 0, 255]);
        assert_eq!(&out[4..8], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_invert_applies() {
        let volume =
            NormalizedVolume::new(1, 1, 1, 1, vec![0], 0.0, 1.0, VolumeDataType::Uint8).unwrap();
        let mut layer = ViewerLayer::new(
            "ch",
            Arc::new(
                NormalizedVolume::new(1, 1, 1, 1, vec![0], 0.0, 1.0, VolumeDataType::Uint8)
                    .unwrap(),
            ),
        );
        layer.invert = true;
        let mut out = Vec::new();
        compose_slice(&volume, &layer, 0, &mut out).unwrap();
        assert_eq!(out[0], 255);
    }

    #[test]
    fn test_slice_uniforms_size() {
        let size = std::mem::size_of::<SliceUniforms>();
        assert_eq!(size % 16, 0);
        assert_eq!(size, 96, "SliceUniforms should be 96 bytes, got {size}");
    }
}
