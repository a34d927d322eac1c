//! Clipmap GPU textures and shader-uniform packing.
//!
//! The CPU half (level math, staging buffers, population) lives in
//! `voluscope_core::clipmap`; this module owns one fixed-size cubic 3D
//! texture per level and moves freshly populated buffers onto the GPU once
//! per frame.

use voluscope_core::clipmap::{ClipmapState, MAX_CLIP_LEVELS};

use crate::raymarch::RayMarchUniforms;
use crate::volume_resources::texture_format_for_channels;

/// GPU textures backing a streamed volume's clip levels.
pub struct ClipmapTextures {
    pub textures: Vec<wgpu::Texture>,
    pub views: Vec<wgpu::TextureView>,
    clip_size: u32,
    bytes_per_texel: u32,
}

impl ClipmapTextures {
    /// Creates one cubic texture per clip level.
    #[must_use]
    pub fn new(device: &wgpu::Device, state: &ClipmapState) -> Self {
        let format = texture_format_for_channels(state.channels);
        let bytes_per_texel = bytes_per_texel(format);

        let mut textures = Vec::with_capacity(state.levels.len());
        let mut views = Vec::with_capacity(state.levels.len());
        for level in &state.levels {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("clip level"),
                size: wgpu::Extent3d {
                    width: state.clip_size,
                    height: state.clip_size,
                    depth_or_array_layers: state.clip_size,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D3,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            log::debug!("created clip level texture (scale {})", level.scale);
            views.push(texture.create_view(&wgpu::TextureViewDescriptor::default()));
            textures.push(texture);
        }

        Self {
            textures,
            views,
            clip_size: state.clip_size,
            bytes_per_texel,
        }
    }

    /// Uploads every level flagged `needs_upload`, clearing the flag.
    /// Called once per frame so repeated repopulations within a frame
    /// coalesce into a single upload.
    pub fn upload_pending(&self, queue: &wgpu::Queue, state: &mut ClipmapState, staging: &mut Vec<u8>) {
        for (level, texture) in state.levels.iter_mut().zip(&self.textures) {
            if !level.needs_upload {
                continue;
            }
            let data: &[u8] = if state.channels == 3 {
                pad_rgb_to_rgba(&level.buffer, staging);
                staging
            } else {
                &level.buffer
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
                    bytes_per_row: Some(self.clip_size * self.bytes_per_texel),
                    rows_per_image: Some(self.clip_size),
                },
                wgpu::Extent3d {
                    width: self.clip_size,
                    height: self.clip_size,
                    depth_or_array_layers: self.clip_size,
                },
            );
            level.needs_upload = false;
        }
    }

    /// Pushes the level origins/scales/count into the shader's fixed-size
    /// uniform arrays. Unused slots repeat the last valid level.
    pub fn apply_to_uniforms(state: &ClipmapState, uniforms: &mut RayMarchUniforms) {
        uniforms.clip_info = [
            1,
            state.levels.len() as u32,
            state.min_level(),
            state.clip_size,
        ];
        for (slot, (origin, scale)) in uniforms
            .clip_origin_scale
            .iter_mut()
            .zip(state.uniform_slots())
        {
            *slot = [origin.x as f32, origin.y as f32, origin.z as f32, scale as f32];
        }
    }

    /// Texture views for the shader's fixed clip-level bindings, padded by
    /// repeating the last view.
    #[must_use]
    pub fn binding_views(&self) -> [&wgpu::TextureView; MAX_CLIP_LEVELS] {
        let last = self.views.len() - 1;
        std::array::from_fn(|i| &self.views[i.min(last)])
    }
}

fn bytes_per_texel(format: wgpu::TextureFormat) -> u32 {
    match format {
        wgpu::TextureFormat::R8Unorm => 1,
        wgpu::TextureFormat::Rg8Unorm => 2,
        _ => 4,
    }
}

/// Expands interleaved RGB bytes into RGBA (alpha 255) for upload; wgpu has
/// no 3-channel texture format.
pub fn pad_rgb_to_rgba(rgb: &[u8], out: &mut Vec<u8>) {
    let texels = rgb.len() / 3;
    if out.len() != texels * 4 {
        out.clear();
        out.resize(texels * 4, 255);
    }
    for (i, chunk) in rgb.chunks_exact(3).enumerate() {
        out[i * 4] = chunk[0];
        out[i * 4 + 1] = chunk[1];
        out[i * 4 + 2] = chunk[2];
        out[i * 4 + 3] = 255;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_rgb_to_rgba() {
        let rgb = [1u8, 2, 3, 4, 5, 6];
        let mut out = Vec::new();
        pad_rgb_to_rgba(&rgb, &mut out);
        assert_eq!(out, vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn test_bytes_per_texel() {
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::R8Unorm), 1);
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::Rg8Unorm), 2);
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::Rgba8Unorm), 4);
    }
}
