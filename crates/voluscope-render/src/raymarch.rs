//! Ray-march pipeline uniforms and volume box geometry.
//!
//! The fragment stage implements the compositing algorithm mirrored by
//! `voluscope_core::raycast`; these structs are the data-oriented interface
//! the viewer pushes into it every frame. Layouts must match the WGSL
//! `RayMarchUniforms` struct exactly.

use glam::{Mat4, UVec3, Vec3};

use voluscope_core::clipmap::MAX_CLIP_LEVELS;
use voluscope_core::layer::{LayerMode, SamplingMode, ViewerLayer};
use voluscope_core::options::ViewerOptions;

/// Per-layer ray-march uniforms.
/// Layout must match WGSL `RayMarchUniforms` exactly (336 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RayMarchUniforms {
    /// Voxel-space -> world transform.
    pub model: [[f32; 4]; 4],
    /// World -> voxel-space transform.
    pub inv_model: [[f32; 4]; 4],
    /// xyz = volume dimensions in voxels, w = channel count.
    pub dims: [f32; 4],
    /// x = window min, y = window max, z = invert flag, w = step scale.
    pub window: [f32; 4],
    /// x = render style (0 MIP, 1 ISO), y = nearest stepping, z = additive
    /// blending, w = segmentation layer.
    pub style: [u32; 4],
    /// xyz = hover position in voxel space, w = hover active flag.
    pub hover: [f32; 4],
    /// x = hover radius (voxels), y = pulse phase [0,1], z = hovered label,
    /// w = iso threshold.
    pub hover_params: [f32; 4],
    /// Per-axis scale applied to hover distances for anisotropic volumes.
    pub anisotropy: [f32; 4],
    /// x = clipmap enabled, y = level count, z = minimum level, w = clip
    /// texture edge length.
    pub clip_info: [u32; 4],
    /// Per level: xyz = aligned origin (voxels), w = scale. Unused slots
    /// repeat the last valid level so the shader never reads an unset slot.
    pub clip_origin_scale: [[f32; 4]; MAX_CLIP_LEVELS],
}

impl Default for RayMarchUniforms {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY.to_cols_array_2d(),
            inv_model: Mat4::IDENTITY.to_cols_array_2d(),
            dims: [1.0, 1.0, 1.0, 1.0],
            window: [0.0, 1.0, 0.0, 1.0],
            style: [0, 0, 1, 0],
            hover: [0.0; 4],
            hover_params: [4.0, 0.0, 0.0, 0.5],
            anisotropy: [1.0, 1.0, 1.0, 0.0],
            clip_info: [0, 1, 0, voluscope_core::clipmap::CLIP_SIZE],
            clip_origin_scale: [[0.0, 0.0, 0.0, 1.0]; MAX_CLIP_LEVELS],
        }
    }
}

impl RayMarchUniforms {
    /// Fills the per-layer fields from layer state and global options.
    pub fn apply_layer(&mut self, layer: &ViewerLayer, options: &ViewerOptions, dims: UVec3) {
        debug_assert_eq!(layer.mode, LayerMode::ThreeD);
        self.dims = [
            dims.x as f32,
            dims.y as f32,
            dims.z as f32,
            layer
                .volume
                .as_ref()
                .map_or(1.0, |v| v.channels as f32),
        ];
        self.window = [
            layer.window_min,
            layer.window_max,
            f32::from(u8::from(layer.invert)),
            options.step_scale,
        ];
        self.style = [
            layer.render_style as u32,
            u32::from(layer.sampling_mode == SamplingMode::Nearest),
            u32::from(options.additive_blending),
            u32::from(layer.is_segmentation),
        ];
        self.hover_params[0] = options.hover_radius;
        self.hover_params[3] = options.iso_threshold;

        let model = volume_model_matrix(layer.offset_x, layer.offset_y);
        self.model = model.to_cols_array_2d();
        self.inv_model = model.inverse().to_cols_array_2d();
    }

    /// Activates the spatial hover highlight at a voxel-space position.
    pub fn set_hover(&mut self, position: Vec3, pulse: f32, label: Option<f32>) {
        self.hover = [position.x, position.y, position.z, 1.0];
        self.hover_params[1] = pulse;
        self.hover_params[2] = label.unwrap_or(-1.0);
    }

    /// Clears the hover highlight.
    pub fn clear_hover(&mut self) {
        self.hover[3] = 0.0;
        self.hover_params[2] = -1.0;
    }
}

/// Model matrix positioning a volume mesh so voxel (0,0,0) sits at the
/// mesh's local origin corner, shifted by the layer's 2D offset. The unit
/// box is scaled to voxel dimensions in the vertex shader, so the model
/// transform carries translation only.
#[must_use]
pub fn volume_model_matrix(offset_x: f32, offset_y: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(offset_x, offset_y, 0.0))
}

/// Generates the 36 vertices of the volume bounding box in normalized
/// [0, 1]^3 coordinates; the vertex shader scales by the volume dimensions.
/// Wound so that front faces point inward (the pipeline culls front faces
/// and marches from the back faces, which keeps the volume visible with the
/// camera inside the box).
#[must_use]
pub fn generate_volume_box() -> Vec<[f32; 4]> {
    // 6 faces, 2 triangles each. Face order: +X, -X, +Y, -Y, +Z, -Z
    let faces: [[[f32; 3]; 4]; 6] = [
        [[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [1.0, 0.0, 1.0]],
        [[0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]],
        [[0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0]],
        [[0.0, 0.0, 1.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0]],
        [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
        [[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
    ];

    let mut positions = Vec::with_capacity(36);
    for verts in &faces {
        for tri in &[[0usize, 1, 2], [0, 2, 3]] {
            for &vi in tri {
                let v = verts[vi];
                positions.push([v[0], v[1], v[2], 1.0]);
            }
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use voluscope_core::layer::{RenderStyle, ViewerLayer};
    use voluscope_core::volume::{NormalizedVolume, VolumeDataType};

    #[test]
    fn test_raymarch_uniforms_size() {
        let size = std::mem::size_of::<RayMarchUniforms>();
        assert_eq!(size % 16, 0, "RayMarchUniforms size ({size} bytes) must be 16-byte aligned");
        // model(64) + inv_model(64) + 7 vec4s(112) + 6 levels(96) = 336
        assert_eq!(size, 336, "RayMarchUniforms should be 336 bytes, got {size}");
    }

    #[test]
    fn test_volume_box_in_unit_cube() {
        let positions = generate_volume_box();
        assert_eq!(positions.len(), 36);
        for p in &positions {
            for c in &p[0..3] {
                assert!((0.0..=1.0).contains(c));
            }
            assert!((p[3] - 1.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_apply_layer_sets_window_and_style() {
        let volume = std::sync::Arc::new(
            NormalizedVolume::new(4, 4, 2, 2, vec![0; 64], 0.0, 1.0, VolumeDataType::Uint8)
                .unwrap(),
        );
        let mut layer = ViewerLayer::new("a", volume);
        layer.window_min = 0.25;
        layer.window_max = 0.75;
        layer.invert = true;
        layer.render_style = RenderStyle::Iso;
        layer.sampling_mode = SamplingMode::Nearest;

        let mut uniforms = RayMarchUniforms::default();
        uniforms.apply_layer(&layer, &ViewerOptions::default(), UVec3::new(4, 4, 2));

        assert_eq!(uniforms.dims, [4.0, 4.0, 2.0, 2.0]);
        assert_eq!(uniforms.window[0], 0.25);
        assert_eq!(uniforms.window[2], 1.0);
        assert_eq!(uniforms.style[0], 1);
        assert_eq!(uniforms.style[1], 1);
    }

    #[test]
    fn test_hover_toggle() {
        let mut uniforms = RayMarchUniforms::default();
        uniforms.set_hover(Vec3::new(1.0, 2.0, 3.0), 0.5, Some(7.0));
        assert_eq!(uniforms.hover, [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniforms.hover_params[2], 7.0);
        uniforms.clear_hover();
        assert_eq!(uniforms.hover[3], 0.0);
        assert_eq!(uniforms.hover_params[2], -1.0);
    }
}
