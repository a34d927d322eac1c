//! Clipmap level math and CPU-side population.
//!
//! A clipmap is a small fixed set of cubic levels at doubling voxel stride,
//! each re-centered around a focus point, bounding GPU memory and streaming
//! bandwidth for volumes far larger than any single 3D texture. This module
//! owns the pure parts: origin alignment, level counts, and staging-buffer
//! population. GPU textures and uniform packing live in the render crate.

use glam::{UVec3, Vec3};

use crate::volume::{CancelToken, NormalizedVolume};

/// Edge length in texels of every clip level's cubic texture.
pub const CLIP_SIZE: u32 = 128;

/// Upper bound on clip levels; shader uniform arrays are sized to this.
pub const MAX_CLIP_LEVELS: usize = 6;

/// Default chunk granularity when a streamed volume does not declare one.
pub const DEFAULT_CHUNK_SHAPE: UVec3 = UVec3::new(32, 32, 32);

/// Number of levels needed so the coarsest footprint covers `max_dim`
/// voxels, capped at [`MAX_CLIP_LEVELS`].
#[must_use]
pub fn level_count_for(max_dim: u32, clip_size: u32) -> usize {
    let mut count = 1usize;
    let mut footprint = u64::from(clip_size);
    while footprint < u64::from(max_dim) && count < MAX_CLIP_LEVELS {
        footprint *= 2;
        count += 1;
    }
    count
}

/// Computes a level's aligned origin for a focus point.
///
/// The desired corner `focus - half_extent` is clamped to
/// `[0, dim - extent]` per axis, then floored to `chunk_shape * scale` so
/// the origin only moves at chunk granularity and a streaming backend is
/// never asked to re-fetch partial chunks.
#[must_use]
pub fn aligned_origin(
    focus: Vec3,
    scale: u32,
    clip_size: u32,
    dims: UVec3,
    chunk_shape: UVec3,
) -> UVec3 {
    let extent = u64::from(clip_size) * u64::from(scale);

    let axis = |focus_c: f32, dim: u32, chunk: u32| -> u32 {
        let dim = u64::from(dim);
        if extent >= dim {
            return 0;
        }
        let half = (extent / 2) as f32;
        let desired = (focus_c - half).max(0.0) as u64;
        let clamped = desired.min(dim - extent);
        let align = u64::from(chunk.max(1)) * u64::from(scale);
        ((clamped / align) * align) as u32
    };

    UVec3::new(
        axis(focus.x, dims.x, chunk_shape.x),
        axis(focus.y, dims.y, chunk_shape.y),
        axis(focus.z, dims.z, chunk_shape.z),
    )
}

/// One level of the clipmap: a cubic region of `clip_size * scale` voxels
/// mirrored in a CPU staging buffer.
pub struct ClipLevel {
    /// Voxel stride; doubles per level starting at 1.
    pub scale: u32,
    /// Chunk-aligned voxel-space corner of the covered region.
    pub origin: UVec3,
    /// CPU staging mirror of the level texture, interleaved channels.
    pub buffer: Vec<u8>,
    /// Set when `buffer` holds fresh data the GPU has not seen.
    pub needs_upload: bool,
    populated: bool,
}

impl ClipLevel {
    fn new(scale: u32, clip_size: u32, channels: u32) -> Self {
        let texels = clip_size as usize * clip_size as usize * clip_size as usize;
        Self {
            scale,
            origin: UVec3::ZERO,
            buffer: vec![0; texels * channels as usize],
            needs_upload: false,
            populated: false,
        }
    }

    /// Voxels covered along one edge.
    #[must_use]
    pub fn extent_voxels(&self, clip_size: u32) -> u32 {
        clip_size.saturating_mul(self.scale)
    }
}

/// CPU state of a streamed volume's clipmap.
pub struct ClipmapState {
    pub levels: Vec<ClipLevel>,
    pub clip_size: u32,
    pub channels: u32,
    chunk_shape: UVec3,
    min_level: u32,
}

impl ClipmapState {
    /// Builds levels for a volume: finest at scale 1, doubling until the
    /// coarsest covers the largest dimension (or the level cap is hit).
    #[must_use]
    pub fn new(volume: &NormalizedVolume) -> Self {
        let count = level_count_for(volume.max_dimension(), CLIP_SIZE);
        let levels = (0..count)
            .map(|i| ClipLevel::new(1 << i, CLIP_SIZE, volume.channels))
            .collect();
        Self {
            levels,
            clip_size: CLIP_SIZE,
            channels: volume.channels,
            chunk_shape: volume.chunk_shape.unwrap_or(DEFAULT_CHUNK_SHAPE),
            min_level: 0,
        }
    }

    /// Finest level the shader may sample; raised during fast interaction.
    #[must_use]
    pub fn min_level(&self) -> u32 {
        self.min_level
    }

    /// During fast camera interaction the finest level is skipped, cutting
    /// streaming churn while the focus moves every frame.
    pub fn set_interaction_lod(&mut self, drop_fine: bool) {
        self.min_level = if drop_fine && self.levels.len() > 1 {
            1
        } else {
            0
        };
    }

    /// Re-centers every level around `focus` (voxel space), repopulating a
    /// level only when its aligned origin actually changed. A population
    /// abandoned via `cancel` leaves the level's previous contents marked
    /// stale-but-valid and does not flag an upload.
    ///
    /// Returns the number of levels repopulated.
    pub fn update(
        &mut self,
        volume: &NormalizedVolume,
        focus: Vec3,
        cancel: &CancelToken,
    ) -> usize {
        let dims = volume.dims();
        let extent = UVec3::splat(self.clip_size);
        let mut repopulated = 0;

        for level in &mut self.levels {
            let origin =
                aligned_origin(focus, level.scale, self.clip_size, dims, self.chunk_shape);
            if level.populated && origin == level.origin {
                continue;
            }

            let filled = match &volume.streaming {
                Some(stream) => {
                    stream.fill_region(origin, level.scale, extent, &mut level.buffer, cancel)
                }
                None => volume.fill_region(origin, level.scale, extent, &mut level.buffer, cancel),
            };

            if !filled {
                log::trace!(
                    "clip level (scale {}) population cancelled at origin {origin}",
                    level.scale
                );
                level.populated = false;
                continue;
            }

            level.origin = origin;
            level.populated = true;
            level.needs_upload = true;
            repopulated += 1;
        }

        if repopulated > 0 {
            log::debug!("clipmap repopulated {repopulated} level(s) around focus {focus}");
        }
        repopulated
    }

    /// Fixed-size shader slot data: `(origin, scale)` per slot, unused
    /// slots padded by repeating the last valid level so the shader never
    /// reads an unset entry.
    #[must_use]
    pub fn uniform_slots(&self) -> [(UVec3, u32); MAX_CLIP_LEVELS] {
        let mut slots = [(UVec3::ZERO, 1u32); MAX_CLIP_LEVELS];
        let last = self.levels.len().saturating_sub(1);
        for (i, slot) in slots.iter_mut().enumerate() {
            let level = &self.levels[i.min(last)];
            *slot = (level.origin, level.scale);
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::VolumeDataType;
    use proptest::prelude::*;

    fn volume(w: u32, h: u32, d: u32) -> NormalizedVolume {
        let len = w as usize * h as usize * d as usize;
        NormalizedVolume::new(
            w,
            h,
            d,
            1,
            vec![7u8; len],
            0.0,
            1.0,
            VolumeDataType::Uint8,
        )
        .unwrap()
    }

    #[test]
    fn test_level_count() {
        assert_eq!(level_count_for(64, 128), 1);
        assert_eq!(level_count_for(128, 128), 1);
        assert_eq!(level_count_for(129, 128), 2);
        assert_eq!(level_count_for(512, 128), 3);
        // Capped even for absurd volumes
        assert_eq!(level_count_for(1 << 30, 128), MAX_CLIP_LEVELS);
    }

    #[test]
    fn test_aligned_origin_small_volume_pins_to_zero() {
        let o = aligned_origin(
            Vec3::splat(100.0),
            1,
            128,
            UVec3::splat(100),
            UVec3::splat(32),
        );
        assert_eq!(o, UVec3::ZERO);
    }

    #[test]
    fn test_update_repopulates_only_on_origin_change() {
        let v = volume(512, 512, 64);
        let mut clip = ClipmapState::new(&v);
        let cancel = CancelToken::new();

        assert!(clip.update(&v, Vec3::splat(64.0), &cancel) > 0);
        // Same focus: nothing to do
        assert_eq!(clip.update(&v, Vec3::splat(64.0), &cancel), 0);
        // A nudge below chunk granularity keeps every origin in place
        assert_eq!(clip.update(&v, Vec3::new(65.0, 64.0, 64.0), &cancel), 0);
        // A large move repopulates the fine level
        assert!(clip.update(&v, Vec3::new(400.0, 64.0, 32.0), &cancel) > 0);
    }

    #[test]
    fn test_cancelled_population_is_not_uploaded() {
        let v = volume(512, 512, 64);
        let mut clip = ClipmapState::new(&v);
        let cancel = CancelToken::new();
        cancel.cancel();

        assert_eq!(clip.update(&v, Vec3::splat(64.0), &cancel), 0);
        assert!(clip.levels.iter().all(|l| !l.needs_upload));
    }

    #[test]
    fn test_uniform_slots_pad_with_last_level() {
        let v = volume(512, 512, 64);
        let clip = ClipmapState::new(&v);
        let count = clip.levels.len();
        assert!(count < MAX_CLIP_LEVELS);

        let slots = clip.uniform_slots();
        let last = slots[count - 1];
        for slot in &slots[count..] {
            assert_eq!(*slot, last);
        }
    }

    #[test]
    fn test_interaction_lod() {
        let v = volume(512, 512, 64);
        let mut clip = ClipmapState::new(&v);
        assert_eq!(clip.min_level(), 0);
        clip.set_interaction_lod(true);
        assert_eq!(clip.min_level(), 1);
        clip.set_interaction_lod(false);
        assert_eq!(clip.min_level(), 0);
    }

    proptest! {
        #[test]
        fn prop_origin_chunk_aligned_and_bounded(
            fx in 0.0f32..4096.0,
            fy in 0.0f32..4096.0,
            fz in 0.0f32..4096.0,
            scale_pow in 0u32..6,
            dim_x in 1u32..4096,
            dim_y in 1u32..4096,
            dim_z in 1u32..4096,
            chunk in prop::sample::select(vec![1u32, 8, 16, 32, 64]),
        ) {
            let scale = 1u32 << scale_pow;
            let dims = UVec3::new(dim_x, dim_y, dim_z);
            let chunk_shape = UVec3::splat(chunk);
            let origin = aligned_origin(Vec3::new(fx, fy, fz), scale, CLIP_SIZE, dims, chunk_shape);

            let extent = u64::from(CLIP_SIZE) * u64::from(scale);
            let align = u64::from(chunk) * u64::from(scale);
            for (o, d) in [(origin.x, dims.x), (origin.y, dims.y), (origin.z, dims.z)] {
                prop_assert_eq!(u64::from(o) % align, 0);
                if extent < u64::from(d) {
                    prop_assert!(u64::from(o) + extent <= u64::from(d));
                } else {
                    prop_assert_eq!(o, 0);
                }
            }
        }
    }
}
