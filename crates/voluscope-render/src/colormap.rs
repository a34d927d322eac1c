//! Colormap texture cache keyed by normalized hex color.

use std::collections::HashMap;

use voluscope_core::transfer::{colormap_gradient, normalize_hex, parse_hex_color, COLORMAP_RESOLUTION};

/// A cached 256x1 RGBA gradient texture for one layer color.
pub struct ColormapTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Lazily creates one gradient texture per distinct layer color and reuses
/// it across layers and frames.
#[derive(Default)]
pub struct ColormapCache {
    entries: HashMap<String, ColormapTexture>,
}

impl ColormapCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the gradient texture for `color`, creating it on first use.
    /// Unparseable colors fall back to white.
    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color: &str,
    ) -> &ColormapTexture {
        let key = normalize_hex(color);
        self.entries.entry(key.clone()).or_insert_with(|| {
            let rgb = parse_hex_color(&key).unwrap_or_else(|_| {
                log::warn!("unparseable layer color '{key}', using white");
                glam::Vec3::ONE
            });
            let pixels = colormap_gradient(rgb);
            create_gradient_texture(device, queue, &pixels)
        })
    }

    /// Number of cached gradients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn create_gradient_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pixels: &[u8],
) -> ColormapTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("layer colormap"),
        size: wgpu::Extent3d {
            width: COLORMAP_RESOLUTION,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(COLORMAP_RESOLUTION * 4),
            rows_per_image: None,
        },
        wgpu::Extent3d {
            width: COLORMAP_RESOLUTION,
            height: 1,
            depth_or_array_layers: 1,
        },
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    ColormapTexture { texture, view }
}
