//! Ray construction and hit-testing against track lines and volumes.
//!
//! Raycasting against an empty or zero-size surface is treated as "no hit",
//! never an error. Hidden tracks are filtered out of the candidate set on
//! every call rather than cached.

use glam::{Mat4, Vec2, Vec3};

use voluscope_core::interaction::HoveredVoxel;
use voluscope_core::layer::{LayerMode, ViewerLayer};
use voluscope_core::raycast::{march_mip, MarchSettings, Ray};
use voluscope_render::{Camera, TrackLineRenderData};

/// World-space distance threshold for track-line picking, scaled by the
/// camera distance so picking tolerance is screen-stable.
pub const TRACK_PICK_THRESHOLD: f32 = 0.01;

/// Unprojects a pointer position to a world-space ray. Returns `None` for a
/// zero-size surface (transient state during resize).
#[must_use]
pub fn screen_ray(
    pointer: Vec2,
    width: u32,
    height: u32,
    camera: &Camera,
) -> Option<(Vec3, Vec3)> {
    if width == 0 || height == 0 {
        return None;
    }

    let ndc_x = (pointer.x / (width as f32 / 2.0)) - 1.0;
    let ndc_y = 1.0 - (pointer.y / (height as f32 / 2.0));

    let inv_view_proj = camera.view_projection_matrix().inverse();

    // wgpu-style NDC depth [0, 1]
    let near = inv_view_proj * glam::Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
    let far = inv_view_proj * glam::Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
    if near.w.abs() < 1e-6 || far.w.abs() < 1e-6 {
        return None;
    }

    let origin = near.truncate() / near.w;
    let far_point = far.truncate() / far.w;
    let dir = (far_point - origin).normalize_or_zero();
    if dir.length_squared() < 1e-12 {
        return None;
    }
    Some((origin, dir))
}

/// Closest approach between a ray and a segment: returns
/// `(distance, t_along_ray, closest_point_on_segment)`.
#[must_use]
pub fn ray_segment_distance(
    ray_origin: Vec3,
    ray_dir: Vec3,
    a: Vec3,
    b: Vec3,
) -> Option<(f32, f32, Vec3)> {
    let v = b - a;
    let c = v.dot(v);

    let (s, t);
    if c < 1e-12 {
        // Degenerate segment: closest point on the ray to `a`
        s = 0.0;
        t = ray_dir.dot(a - ray_origin);
    } else {
        let w0 = ray_origin - a;
        let a_dot = ray_dir.dot(ray_dir);
        let b_dot = ray_dir.dot(v);
        let d = ray_dir.dot(w0);
        let e = v.dot(w0);
        let denom = a_dot * c - b_dot * b_dot;

        let s_raw = if denom.abs() < 1e-8 {
            0.0
        } else {
            (b_dot * d - a_dot * e) / denom
        };
        s = s_raw.clamp(0.0, 1.0);
        t = ray_dir.dot(a + v * s - ray_origin);
    }

    if t < 0.0 {
        return None;
    }
    let on_segment = a + v * s;
    let on_ray = ray_origin + ray_dir * t;
    Some(((on_segment - on_ray).length(), t, on_segment))
}

/// A track-line hit.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackHit {
    pub track_id: String,
    /// Distance along the ray, for nearest-hit ordering.
    pub t: f32,
    /// Closest point on the line, used as the tooltip anchor.
    pub point: Vec3,
}

/// Raycasts visible track lines (respecting each track's current draw
/// range) and returns the nearest hit within the threshold. The candidate
/// set is filtered per call; hidden lines never participate.
#[must_use]
pub fn pick_track_at_ray<'a, I>(
    tracks: I,
    track_world: &Mat4,
    ray_origin: Vec3,
    ray_dir: Vec3,
    threshold: f32,
) -> Option<TrackHit>
where
    I: Iterator<Item = (&'a str, &'a TrackLineRenderData)>,
{
    let mut best: Option<TrackHit> = None;

    for (id, line) in tracks {
        if !line.visible {
            continue;
        }
        let segments = line.visible_segments as usize;
        for i in 0..segments.min(line.points.len().saturating_sub(1)) {
            let a = track_world.transform_point3(line.points[i]);
            let b = track_world.transform_point3(line.points[i + 1]);
            let Some((dist, t, point)) = ray_segment_distance(ray_origin, ray_dir, a, b) else {
                continue;
            };
            if dist > threshold {
                continue;
            }
            let closer = best.as_ref().is_none_or(|h| t < h.t);
            if closer {
                best = Some(TrackHit {
                    track_id: id.to_string(),
                    t,
                    point,
                });
            }
        }
    }
    best
}

/// Projects a world-space ray into a 3D layer's voxel space and samples the
/// brightest voxel along it for the hover readout. Slice layers and layers
/// without volumes report no hover.
#[must_use]
pub fn hover_voxel_for_layer(
    layer: &ViewerLayer,
    ray_origin: Vec3,
    ray_dir: Vec3,
    model: &Mat4,
    step_scale: f32,
) -> Option<HoveredVoxel> {
    if layer.mode != LayerMode::ThreeD {
        return None;
    }
    let volume = layer.volume.as_ref()?;

    let inv = model.inverse();
    let local_origin = inv.transform_point3(ray_origin);
    let local_dir = inv.transform_vector3(ray_dir).normalize_or_zero();
    if local_dir.length_squared() < 1e-12 {
        return None;
    }

    let settings = MarchSettings {
        window_min: layer.window_min,
        window_max: layer.window_max,
        invert: layer.invert,
        sampling: layer.sampling_mode,
        step_scale,
        iso_threshold: 0.5,
    };
    let ray = Ray::new(local_origin, local_dir);
    let sample = march_mip(volume, &ray, &settings)?;
    if sample.intensity <= 0.0 {
        return None;
    }

    let voxel = sample.position.round().max(Vec3::ZERO).as_uvec3();
    let voxel = voxel.min(volume.dims().saturating_sub(glam::UVec3::ONE));
    let dims = volume.dims().as_vec3();
    Some(HoveredVoxel {
        layer_key: layer.key.clone(),
        voxel,
        normalized_pos: sample.position / dims.max(Vec3::ONE),
        intensity: sample.intensity,
        channel_values: volume
            .voxel(voxel.x, voxel.y, voxel.z)
            .map(<[u8]>::to_vec)
            .unwrap_or_default(),
        label: volume.label_at(voxel.x, voxel.y, voxel.z),
    })
}

/// Projects a world point back to screen coordinates (tooltip anchor).
#[must_use]
pub fn world_to_screen(point: Vec3, width: u32, height: u32, camera: &Camera) -> Option<Vec2> {
    let clip = camera.view_projection_matrix() * point.extend(1.0);
    if clip.w <= 1e-6 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(Vec2::new(
        (ndc.x + 1.0) * 0.5 * width as f32,
        (1.0 - ndc.y) * 0.5 * height as f32,
    ))
}
