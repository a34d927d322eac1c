//! CPU reference ray marcher.
//!
//! Mirrors the WGSL ray-march pipeline step for step: the same bounding-box
//! intersection, stepping rules, MIP/ISO compositing, and tuned constants.
//! The viewer uses it for voxel hover readout; the test suite uses it to pin
//! down the GPU algorithm's semantics on tiny synthetic volumes.

use glam::Vec3;

use crate::layer::SamplingMode;
use crate::transfer::windowed_intensity;
use crate::volume::NormalizedVolume;

/// Hard cap on samples along one ray.
pub const MAX_RAY_STEPS: u32 = 887;

/// MIP early-exit watermark for un-inverted rays.
pub const EARLY_EXIT_HIGH: f32 = 0.999;

/// MIP early-exit watermark for inverted rays.
pub const EARLY_EXIT_LOW: f32 = 0.001;

/// The iso walk triggers this fraction of the window range below the
/// threshold, then refines to the exact crossing.
pub const ISO_THRESHOLD_MARGIN: f32 = 0.02;

/// Sub-steps used to refine the best MIP step / the iso crossing.
pub const REFINEMENT_STEPS: u32 = 4;

/// A ray in a volume's local voxel space.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Builds a ray, normalizing the direction.
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Point along the ray at distance `t`.
    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Slab intersection of a ray with the volume's bounding box.
///
/// Voxel coordinates are shifted by -0.5 so voxel centers align with texel
/// centers: the box spans `[-0.5, dims - 0.5]`. Returns `(t_near, t_far)`
/// with `t_near` clamped to zero; `None` when the ray misses or the box is
/// entirely behind the origin.
#[must_use]
pub fn intersect_volume(ray: &Ray, dims: Vec3) -> Option<(f32, f32)> {
    let box_min = Vec3::splat(-0.5);
    let box_max = dims - 0.5;

    let mut t_near = f32::NEG_INFINITY;
    let mut t_far = f32::INFINITY;

    for axis in 0..3 {
        let o = ray.origin[axis];
        let d = ray.direction[axis];
        if d.abs() < 1e-9 {
            if o < box_min[axis] || o > box_max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t0 = (box_min[axis] - o) * inv;
        let mut t1 = (box_max[axis] - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_near = t_near.max(t0);
        t_far = t_far.min(t1);
    }

    if t_near > t_far || t_far < 0.0 {
        return None;
    }
    Some((t_near.max(0.0), t_far))
}

/// Per-ray compositing parameters.
#[derive(Debug, Clone, Copy)]
pub struct MarchSettings {
    pub window_min: f32,
    pub window_max: f32,
    pub invert: bool,
    pub sampling: SamplingMode,
    /// Samples per unit travel distance in linear mode; larger values mean
    /// more samples and smoother surfaces.
    pub step_scale: f32,
    /// Iso threshold in windowed [0, 1] space.
    pub iso_threshold: f32,
}

impl Default for MarchSettings {
    fn default() -> Self {
        Self {
            window_min: 0.0,
            window_max: 1.0,
            invert: false,
            sampling: SamplingMode::Linear,
            step_scale: 1.0,
            iso_threshold: 0.5,
        }
    }
}

/// Result of a MIP walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MipSample {
    /// Best windowed (and possibly inverted) intensity along the ray.
    pub intensity: f32,
    /// Voxel-space position of the best sample.
    pub position: Vec3,
}

/// Result of an iso walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsoSample {
    pub position: Vec3,
    pub normal: Vec3,
    /// Windowed intensity at the refined crossing.
    pub intensity: f32,
}

/// Windowed (but not yet inverted) intensity at a voxel-space point.
fn sample_windowed(volume: &NormalizedVolume, p: Vec3, s: &MarchSettings) -> f32 {
    let x = p.x.round();
    let y = p.y.round();
    let z = p.z.round();
    if x < 0.0 || y < 0.0 || z < 0.0 {
        return windowed_intensity(0.0, s.window_min, s.window_max, false);
    }
    let raw = volume.luminance(x as u32, y as u32, z as u32);
    windowed_intensity(raw, s.window_min, s.window_max, false)
}

fn step_count(t0: f32, t1: f32, s: &MarchSettings) -> u32 {
    let travel = (t1 - t0).max(0.0);
    let steps = match s.sampling {
        // Whole-voxel increments over the entry/exit span: deterministic,
        // no interpolation blur.
        SamplingMode::Nearest => travel.ceil() as u32,
        SamplingMode::Linear => (travel * s.step_scale).ceil() as u32,
    };
    steps.clamp(1, MAX_RAY_STEPS)
}

/// Maximum-intensity projection along a ray.
///
/// Walks the entry/exit span tracking the best windowed intensity, exits
/// early once intensity saturates, then refines with sub-steps centered on
/// the best step to reduce banding. Returns `None` when the ray misses the
/// volume entirely.
#[must_use]
pub fn march_mip(volume: &NormalizedVolume, ray: &Ray, s: &MarchSettings) -> Option<MipSample> {
    let dims = volume.dims().as_vec3();
    let (t0, t1) = intersect_volume(ray, dims)?;
    let steps = step_count(t0, t1, s);
    let dt = (t1 - t0) / steps as f32;

    // Inversion is applied at composition: the walk tracks the raw windowed
    // maximum (minimum when inverted) and exits once it saturates.
    let mut best_v = if s.invert { f32::INFINITY } else { f32::NEG_INFINITY };
    let mut best_t = t0;
    for i in 0..steps {
        let t = t0 + (i as f32 + 0.5) * dt;
        let v = sample_windowed(volume, ray.at(t), s);
        let better = if s.invert { v < best_v } else { v > best_v };
        if better {
            best_v = v;
            best_t = t;
        }
        let saturated = if s.invert {
            v <= EARLY_EXIT_LOW
        } else {
            v >= EARLY_EXIT_HIGH
        };
        if saturated {
            break;
        }
    }

    // Refine around the best coarse step.
    let mut refined_t = best_t;
    let sub = dt / REFINEMENT_STEPS as f32;
    for i in 0..=REFINEMENT_STEPS {
        let t = best_t - dt * 0.5 + i as f32 * sub;
        if t < t0 || t > t1 {
            continue;
        }
        let v = sample_windowed(volume, ray.at(t), s);
        let better = if s.invert { v < best_v } else { v > best_v };
        if better {
            best_v = v;
            refined_t = t;
        }
    }

    Some(MipSample {
        intensity: if s.invert { 1.0 - best_v } else { best_v },
        position: ray.at(refined_t),
    })
}

/// Windowed intensity as displayed (inversion applied).
fn sample_display(volume: &NormalizedVolume, p: Vec3, s: &MarchSettings) -> f32 {
    let w = sample_windowed(volume, p, s);
    if s.invert {
        1.0 - w
    } else {
        w
    }
}

/// Central-difference gradient of the displayed field at `p` (6 taps).
#[must_use]
pub fn gradient_at(volume: &NormalizedVolume, p: Vec3, s: &MarchSettings) -> Vec3 {
    let d = |offset: Vec3| sample_display(volume, p + offset, s);
    Vec3::new(
        d(Vec3::X) - d(Vec3::NEG_X),
        d(Vec3::Y) - d(Vec3::NEG_Y),
        d(Vec3::Z) - d(Vec3::NEG_Z),
    ) * 0.5
}

/// Iso-surface walk: advances until the windowed intensity crosses the
/// low-margin threshold, refines backward over four sub-steps, and reports
/// the crossing with its gradient normal. `None` means the ray contributes
/// nothing (transparent fragment).
#[must_use]
pub fn march_iso(volume: &NormalizedVolume, ray: &Ray, s: &MarchSettings) -> Option<IsoSample> {
    let dims = volume.dims().as_vec3();
    let (t0, t1) = intersect_volume(ray, dims)?;
    let steps = step_count(t0, t1, s);
    let dt = (t1 - t0) / steps as f32;

    let low_threshold = s.iso_threshold - ISO_THRESHOLD_MARGIN * (s.window_max - s.window_min);

    let mut hit_t = None;
    for i in 0..steps {
        let t = t0 + (i as f32 + 0.5) * dt;
        if sample_display(volume, ray.at(t), s) > low_threshold {
            hit_t = Some(t);
            break;
        }
    }
    let coarse_t = hit_t?;

    // Walk back over sub-steps to tighten the crossing.
    let mut refined_t = coarse_t;
    let sub = dt / REFINEMENT_STEPS as f32;
    for i in 1..=REFINEMENT_STEPS {
        let t = coarse_t - i as f32 * sub;
        if t < t0 {
            break;
        }
        if sample_display(volume, ray.at(t), s) > low_threshold {
            refined_t = t;
        } else {
            break;
        }
    }

    let position = ray.at(refined_t);
    let gradient = gradient_at(volume, position, s);
    let normal = if gradient.length_squared() > 1e-12 {
        -gradient.normalize()
    } else {
        -ray.direction
    };

    Some(IsoSample {
        position,
        normal,
        intensity: sample_display(volume, position, s),
    })
}

/// Single-light Lambertian + specular shading used by the iso mode
/// (ambient 0.2, diffuse 0.8, shininess 40).
#[must_use]
pub fn shade_iso(base: Vec3, normal: Vec3, view_dir: Vec3, light_dir: Vec3) -> Vec3 {
    let n = normal.normalize_or_zero();
    let l = light_dir.normalize_or_zero();
    let diffuse = n.dot(l).max(0.0);
    let half = (l + view_dir.normalize_or_zero()).normalize_or_zero();
    let specular = n.dot(half).max(0.0).powf(40.0);
    (base * (0.2 + 0.8 * diffuse) + Vec3::splat(specular * 0.3)).min(Vec3::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::colormap_gradient;
    use crate::volume::VolumeDataType;

    fn volume_with_bright_voxel(dim: u32, bright: (u32, u32, u32)) -> NormalizedVolume {
        let mut data = vec![0u8; (dim * dim * dim) as usize];
        let idx = ((bright.2 * dim + bright.1) * dim + bright.0) as usize;
        data[idx] = 200;
        NormalizedVolume::new(dim, dim, dim, 1, data, 0.0, 1.0, VolumeDataType::Uint8).unwrap()
    }

    #[test]
    fn test_intersect_misses_sideways_ray() {
        let ray = Ray::new(Vec3::new(-10.0, 100.0, 0.0), Vec3::X);
        assert!(intersect_volume(&ray, Vec3::splat(8.0)).is_none());
    }

    #[test]
    fn test_intersect_behind_origin() {
        let ray = Ray::new(Vec3::new(20.0, 4.0, 4.0), Vec3::X);
        assert!(intersect_volume(&ray, Vec3::splat(8.0)).is_none());
    }

    #[test]
    fn test_intersect_inside_starts_at_zero() {
        let ray = Ray::new(Vec3::splat(4.0), Vec3::X);
        let (t0, t1) = intersect_volume(&ray, Vec3::splat(8.0)).unwrap();
        assert_eq!(t0, 0.0);
        assert!(t1 > 0.0);
    }

    #[test]
    fn test_mip_finds_single_bright_voxel() {
        let v = volume_with_bright_voxel(8, (5, 4, 4));
        let ray = Ray::new(Vec3::new(-5.0, 4.0, 4.0), Vec3::X);
        let s = MarchSettings {
            sampling: SamplingMode::Nearest,
            ..MarchSettings::default()
        };
        let hit = march_mip(&v, &ray, &s).unwrap();
        let expected = 200.0 / 255.0;
        assert!((hit.intensity - expected).abs() < 1e-6);
        assert!((hit.position.x - 5.0).abs() <= 0.5);
    }

    #[test]
    fn test_mip_composed_color_matches_colormap() {
        // The composed MIP color must equal the colormap applied to the
        // bright voxel's windowed intensity.
        let v = volume_with_bright_voxel(8, (3, 4, 4));
        let ray = Ray::new(Vec3::new(-5.0, 4.0, 4.0), Vec3::X);
        let s = MarchSettings {
            sampling: SamplingMode::Nearest,
            ..MarchSettings::default()
        };
        let hit = march_mip(&v, &ray, &s).unwrap();

        let gradient = colormap_gradient(Vec3::new(0.0, 1.0, 0.0));
        let slot = ((hit.intensity * 255.0).round() as usize).min(255) * 4;
        let composed = &gradient[slot..slot + 4];
        let expected = (200.0 / 255.0 * 255.0).round() as i32;
        assert!((i32::from(composed[1]) - expected).abs() <= 1);
        assert_eq!(composed[0], 0);
    }

    #[test]
    fn test_mip_windowing_applied() {
        let v = volume_with_bright_voxel(8, (5, 4, 4));
        let ray = Ray::new(Vec3::new(-5.0, 4.0, 4.0), Vec3::X);
        let s = MarchSettings {
            window_min: 0.0,
            window_max: 200.0 / 255.0,
            sampling: SamplingMode::Nearest,
            ..MarchSettings::default()
        };
        let hit = march_mip(&v, &ray, &s).unwrap();
        assert!((hit.intensity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mip_inverted_prefers_dark() {
        let v = volume_with_bright_voxel(8, (5, 4, 4));
        let ray = Ray::new(Vec3::new(-5.0, 4.0, 4.0), Vec3::X);
        let s = MarchSettings {
            invert: true,
            sampling: SamplingMode::Nearest,
            ..MarchSettings::default()
        };
        // Inverted MIP keeps the darkest raw value along the ray; the empty
        // voxels on the path invert to full brightness.
        let hit = march_mip(&v, &ray, &s).unwrap();
        assert!((hit.intensity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iso_miss_is_transparent() {
        let v = volume_with_bright_voxel(8, (5, 4, 4));
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let s = MarchSettings {
            iso_threshold: 0.9,
            sampling: SamplingMode::Nearest,
            ..MarchSettings::default()
        };
        assert!(march_iso(&v, &ray, &s).is_none());
    }

    #[test]
    fn test_iso_hits_bright_voxel() {
        let v = volume_with_bright_voxel(8, (5, 4, 4));
        let ray = Ray::new(Vec3::new(-5.0, 4.0, 4.0), Vec3::X);
        let s = MarchSettings {
            iso_threshold: 0.5,
            sampling: SamplingMode::Nearest,
            ..MarchSettings::default()
        };
        let hit = march_iso(&v, &ray, &s).unwrap();
        assert!((hit.position.x - 5.0).abs() <= 1.0);
        assert!(hit.intensity > 0.5);
    }

    #[test]
    fn test_shading_bounds() {
        let c = shade_iso(Vec3::ONE, Vec3::Z, Vec3::Z, Vec3::Z);
        for v in [c.x, c.y, c.z] {
            assert!((0.0..=1.0).contains(&v));
        }
        // Back-facing light leaves ambient only
        let dark = shade_iso(Vec3::ONE, Vec3::Z, Vec3::Z, Vec3::NEG_Z);
        assert!((dark.x - 0.2).abs() < 1e-4);
    }
}
