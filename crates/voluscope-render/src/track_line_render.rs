//! Track overlay GPU line resources.
//!
//! Each track owns one polyline storage buffer shared by a line mesh and an
//! outline mesh (drawn wider, behind, only while highlighted). Segments are
//! expanded to screen-space quads in the vertex shader, which needs the
//! device pixel resolution; a parallel CPU `times` array drives the
//! time-windowed draw range without ever rebuilding geometry.

use glam::Vec3;
use wgpu::util::DeviceExt;

use voluscope_core::track::TrackVisualState;

/// Uniforms for one line mesh.
/// Layout must match WGSL `TrackLineUniforms` exactly (48 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TrackLineUniforms {
    /// Line color (RGB) + opacity in w.
    pub color: [f32; 4],
    /// x = line width in pixels, y = depth offset toward the camera applied
    /// to outlines, z/w unused.
    pub params: [f32; 4],
    /// xy = viewport size in device pixels (line-width expansion needs it).
    pub resolution: [f32; 4],
}

impl Default for TrackLineUniforms {
    fn default() -> Self {
        Self {
            color: [0.3, 0.8, 0.9, 0.85],
            params: [1.0, 0.0, 0.0, 0.0],
            resolution: [1.0, 1.0, 0.0, 0.0],
        }
    }
}

/// GPU resources owned by one track id.
pub struct TrackLineRenderData {
    /// Shared polyline points (vec4 per point).
    pub position_buffer: wgpu::Buffer,
    /// CPU mirror of the polyline, used for ray hit-testing.
    pub points: Vec<glam::Vec3>,
    /// Per-point timestamps, parallel to the position buffer. Invariant:
    /// `times.len()` equals the point count and is non-decreasing.
    pub times: Vec<f32>,
    pub num_points: u32,
    /// Segments currently revealed by the time window.
    pub visible_segments: u32,

    pub line_uniform_buffer: wgpu::Buffer,
    pub line_bind_group: wgpu::BindGroup,
    pub outline_uniform_buffer: wgpu::Buffer,
    pub outline_bind_group: wgpu::BindGroup,

    pub base_color: Vec3,
    pub visible: bool,
    pub outline_visible: bool,
}

impl TrackLineRenderData {
    /// Builds line resources from dataset-space points (channel offset
    /// already applied) and their timestamps.
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        camera_buffer: &wgpu::Buffer,
        points: &[Vec3],
        times: Vec<f32>,
        base_color: Vec3,
    ) -> Self {
        debug_assert_eq!(points.len(), times.len());

        let position_data: Vec<[f32; 4]> =
            points.iter().map(|p| [p.x, p.y, p.z, 1.0]).collect();
        let position_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("track line points"),
            contents: bytemuck::cast_slice(&position_data),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let make = |label: &str| {
            let uniforms = TrackLineUniforms::default();
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&[uniforms]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: camera_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: position_buffer.as_entire_binding(),
                    },
                ],
            });
            (buffer, bind_group)
        };

        let (line_uniform_buffer, line_bind_group) = make("track line uniforms");
        let (outline_uniform_buffer, outline_bind_group) = make("track outline uniforms");

        Self {
            position_buffer,
            points: points.to_vec(),
            times,
            num_points: points.len() as u32,
            visible_segments: 0,
            line_uniform_buffer,
            line_bind_group,
            outline_uniform_buffer,
            outline_bind_group,
            base_color,
            visible: true,
            outline_visible: false,
        }
    }

    /// Updates the time-windowed draw range: only segments whose both
    /// endpoints are at or before `t` are drawn. O(points) per call.
    pub fn update_draw_range(&mut self, t: f32) {
        let visible_points = self
            .times
            .iter()
            .take_while(|&&time| time <= t + voluscope_core::track::TIME_EPSILON)
            .count() as u32;
        self.visible_segments = visible_points.saturating_sub(1);
    }

    /// Vertex count for the current draw range (6 per segment).
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.visible_segments * 6
    }

    /// Writes the derived visual state into both uniform buffers.
    pub fn apply_style(
        &mut self,
        queue: &wgpu::Queue,
        style: &TrackVisualState,
        color: Vec3,
        outline_color: Vec3,
        resolution: (u32, u32),
    ) {
        self.visible = style.should_show;
        self.outline_visible = style.highlighted && style.outline_opacity > 0.0;

        let res = [resolution.0 as f32, resolution.1 as f32, 0.0, 0.0];
        let line = TrackLineUniforms {
            color: [color.x, color.y, color.z, style.opacity],
            params: [style.width, 0.0, 0.0, 0.0],
            resolution: res,
        };
        queue.write_buffer(&self.line_uniform_buffer, 0, bytemuck::cast_slice(&[line]));

        let outline = TrackLineUniforms {
            color: [
                outline_color.x,
                outline_color.y,
                outline_color.z,
                style.outline_opacity,
            ],
            params: [style.outline_width, 1e-4, 0.0, 0.0],
            resolution: res,
        };
        queue.write_buffer(
            &self.outline_uniform_buffer,
            0,
            bytemuck::cast_slice(&[outline]),
        );
    }

    /// Propagates a viewport resize to both uniform buffers (line-width
    /// shaders need device pixel dimensions).
    pub fn write_resolution(&self, queue: &wgpu::Queue, width: u32, height: u32) {
        let res = [width as f32, height as f32, 0.0, 0.0];
        let offset = std::mem::offset_of!(TrackLineUniforms, resolution) as u64;
        queue.write_buffer(&self.line_uniform_buffer, offset, bytemuck::cast_slice(&res));
        queue.write_buffer(
            &self.outline_uniform_buffer,
            offset,
            bytemuck::cast_slice(&res),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_line_uniforms_size() {
        let size = std::mem::size_of::<TrackLineUniforms>();
        assert_eq!(size % 16, 0, "TrackLineUniforms size ({size} bytes) must be 16-byte aligned");
        // color(16) + params(16) + resolution(16) = 48
        assert_eq!(size, 48, "TrackLineUniforms should be 48 bytes, got {size}");
    }

    #[test]
    fn test_resolution_offset_matches_layout() {
        assert_eq!(std::mem::offset_of!(TrackLineUniforms, resolution), 32);
    }
}
