//! Normalized volume data and streaming sources.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::UVec3;

use crate::error::{Result, ViewerError};

/// Native sample type of the source data before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum VolumeDataType {
    #[default]
    Uint8,
    Uint16,
    Float32,
}

/// Cooperative cancellation flag threaded through clipmap population.
///
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of any population work holding this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Synchronous buffer-fill contract for out-of-core volumes.
///
/// A backend may be asynchronous internally; the viewer consumes only this
/// blocking call. Implementations write interleaved-channel bytes for every
/// voxel of the requested region, sampling the source at
/// `origin + local_index * scale` and writing zero out of bounds. Returns
/// `false` when the fill was abandoned because `cancel` fired; the caller
/// must then discard the buffer contents.
pub trait VolumeStream: Send + Sync {
    fn fill_region(
        &self,
        origin: UVec3,
        scale: u32,
        extent: UVec3,
        out: &mut [u8],
        cancel: &CancelToken,
    ) -> bool;
}

/// A normalized multi-channel 3D volume.
///
/// Produced by the dataset layer, immutable once built, and shared with the
/// viewer by reference. Voxels are stored x-fastest with interleaved
/// channels: `normalized[((z * height + y) * width + x) * channels + c]`.
pub struct NormalizedVolume {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Interleaved channel count, 1-4.
    pub channels: u32,
    /// Per-voxel bytes, already remapped to the 0-255 display range.
    pub normalized: Vec<u8>,
    /// Source-range minimum before normalization.
    pub min: f32,
    /// Source-range maximum before normalization.
    pub max: f32,
    pub data_type: VolumeDataType,
    /// Streaming backend for volumes too large to hold resident.
    pub streaming: Option<Arc<dyn VolumeStream>>,
    /// Per-voxel integer labels for segmentation layers.
    pub segmentation_labels: Option<Vec<f32>>,
    /// Native storage granularity of a streamed volume, used to align
    /// clipmap origins.
    pub chunk_shape: Option<UVec3>,
}

impl NormalizedVolume {
    /// Builds a volume, validating the claimed shape against the buffers.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::DataIntegrity`] when `normalized` is shorter
    /// than `width * height * depth * channels`, and
    /// [`ViewerError::LabelLengthMismatch`] when a label array does not
    /// cover every voxel. Truncated data is never rendered.
    pub fn new(
        width: u32,
        height: u32,
        depth: u32,
        channels: u32,
        normalized: Vec<u8>,
        min: f32,
        max: f32,
        data_type: VolumeDataType,
    ) -> Result<Self> {
        if !(1..=4).contains(&channels) {
            return Err(ViewerError::UnsupportedChannelCount(channels));
        }

        let expected = width as usize * height as usize * depth as usize * channels as usize;
        if normalized.len() < expected {
            return Err(ViewerError::DataIntegrity {
                expected,
                actual: normalized.len(),
                width,
                height,
                depth,
                channels,
            });
        }

        Ok(Self {
            width,
            height,
            depth,
            channels,
            normalized,
            min,
            max,
            data_type,
            streaming: None,
            segmentation_labels: None,
            chunk_shape: None,
        })
    }

    /// Attaches per-voxel segmentation labels.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::LabelLengthMismatch`] unless the array holds
    /// exactly one label per voxel.
    pub fn with_segmentation_labels(mut self, labels: Vec<f32>) -> Result<Self> {
        let expected = self.voxel_count();
        if labels.len() != expected {
            return Err(ViewerError::LabelLengthMismatch {
                expected,
                actual: labels.len(),
            });
        }
        self.segmentation_labels = Some(labels);
        Ok(self)
    }

    /// Attaches a streaming backend and its chunk granularity.
    #[must_use]
    pub fn with_streaming(mut self, stream: Arc<dyn VolumeStream>, chunk_shape: UVec3) -> Self {
        self.streaming = Some(stream);
        self.chunk_shape = Some(chunk_shape);
        self
    }

    /// Returns the volume dimensions as a vector.
    #[must_use]
    pub fn dims(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.depth)
    }

    /// Returns the largest of the three dimensions.
    #[must_use]
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height).max(self.depth)
    }

    /// Total voxel count (without the channel factor).
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Flat byte index of the first channel of a voxel, or `None` out of
    /// bounds.
    #[must_use]
    pub fn voxel_index(&self, x: u32, y: u32, z: u32) -> Option<usize> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        let idx = ((z as usize * self.height as usize + y as usize) * self.width as usize
            + x as usize)
            * self.channels as usize;
        Some(idx)
    }

    /// Returns the interleaved channel bytes of a voxel, or `None` out of
    /// bounds.
    #[must_use]
    pub fn voxel(&self, x: u32, y: u32, z: u32) -> Option<&[u8]> {
        let idx = self.voxel_index(x, y, z)?;
        Some(&self.normalized[idx..idx + self.channels as usize])
    }

    /// Scalar intensity of a voxel in [0, 1], per the channel-count rule:
    /// 1 channel reads R, 2 averages R and G, 3 uses perceptual luma, and
    /// 4 takes the max of all channels.
    #[must_use]
    pub fn luminance(&self, x: u32, y: u32, z: u32) -> f32 {
        let Some(v) = self.voxel(x, y, z) else {
            return 0.0;
        };
        channel_luminance(v)
    }

    /// Segmentation label of a voxel, when labels are attached.
    #[must_use]
    pub fn label_at(&self, x: u32, y: u32, z: u32) -> Option<f32> {
        let labels = self.segmentation_labels.as_ref()?;
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        let idx =
            (z as usize * self.height as usize + y as usize) * self.width as usize + x as usize;
        labels.get(idx).copied()
    }

    /// Fills `out` by blockwise-nearest sampling at `origin + local * scale`,
    /// writing zero for out-of-bounds voxels. Checks `cancel` between z
    /// slabs; returns `false` (buffer contents unspecified) when cancelled.
    pub fn fill_region(
        &self,
        origin: UVec3,
        scale: u32,
        extent: UVec3,
        out: &mut [u8],
        cancel: &CancelToken,
    ) -> bool {
        let ch = self.channels as usize;
        debug_assert!(out.len() >= extent.x as usize * extent.y as usize * extent.z as usize * ch);

        for lz in 0..extent.z {
            if cancel.is_cancelled() {
                return false;
            }
            let sz = origin.z + lz * scale;
            for ly in 0..extent.y {
                let sy = origin.y + ly * scale;
                for lx in 0..extent.x {
                    let sx = origin.x + lx * scale;
                    let dst = ((lz as usize * extent.y as usize + ly as usize)
                        * extent.x as usize
                        + lx as usize)
                        * ch;
                    match self.voxel_index(sx, sy, sz) {
                        Some(src) => {
                            out[dst..dst + ch].copy_from_slice(&self.normalized[src..src + ch]);
                        }
                        None => out[dst..dst + ch].fill(0),
                    }
                }
            }
        }
        true
    }
}

/// Applies the per-channel-count luminance rule to one voxel's bytes.
#[must_use]
pub fn channel_luminance(v: &[u8]) -> f32 {
    let f = |b: u8| f32::from(b) / 255.0;
    match v.len() {
        1 => f(v[0]),
        2 => (f(v[0]) + f(v[1])) * 0.5,
        3 => 0.2126 * f(v[0]) + 0.7152 * f(v[1]) + 0.0722 * f(v[2]),
        4 => f(v[0]).max(f(v[1])).max(f(v[2])).max(f(v[3])),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_volume(channels: u32) -> NormalizedVolume {
        let len = 2 * 2 * 2 * channels as usize;
        NormalizedVolume::new(
            2,
            2,
            2,
            channels,
            (0..len).map(|i| i as u8).collect(),
            0.0,
            1.0,
            VolumeDataType::Uint8,
        )
        .unwrap()
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let err = NormalizedVolume::new(
            4,
            4,
            4,
            2,
            vec![0u8; 10],
            0.0,
            1.0,
            VolumeDataType::Uint8,
        )
        .unwrap_err();
        match err {
            ViewerError::DataIntegrity {
                expected, actual, ..
            } => {
                assert_eq!(expected, 4 * 4 * 4 * 2);
                assert_eq!(actual, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_channel_count_bounds() {
        assert!(matches!(
            NormalizedVolume::new(1, 1, 1, 5, vec![0; 5], 0.0, 1.0, VolumeDataType::Uint8),
            Err(ViewerError::UnsupportedChannelCount(5))
        ));
        assert!(matches!(
            NormalizedVolume::new(1, 1, 1, 0, vec![], 0.0, 1.0, VolumeDataType::Uint8),
            Err(ViewerError::UnsupportedChannelCount(0))
        ));
    }

    #[test]
    fn test_label_length_validated() {
        let v = tiny_volume(1);
        assert!(v.with_segmentation_labels(vec![0.0; 7]).is_err());
        let v = tiny_volume(1);
        assert!(v.with_segmentation_labels(vec![0.0; 8]).is_ok());
    }

    #[test]
    fn test_voxel_indexing() {
        let v = tiny_volume(2);
        // voxel (1, 1, 1) starts at ((1*2+1)*2+1)*2 = 14
        assert_eq!(v.voxel(1, 1, 1).unwrap(), &[14, 15]);
        assert!(v.voxel(2, 0, 0).is_none());
    }

    #[test]
    fn test_luminance_rules() {
        assert!((channel_luminance(&[255]) - 1.0).abs() < 1e-6);
        assert!((channel_luminance(&[0, 255]) - 0.5).abs() < 1e-6);
        // 4-channel takes the max
        assert!((channel_luminance(&[10, 20, 255, 30]) - 1.0).abs() < 1e-6);
        // perceptual luma weights green heaviest
        let luma = channel_luminance(&[0, 255, 0]);
        assert!((luma - 0.7152).abs() < 1e-4);
    }

    #[test]
    fn test_fill_region_out_of_bounds_zeroed() {
        let v = tiny_volume(1);
        let mut out = vec![0xAAu8; 27];
        let done = v.fill_region(
            UVec3::ZERO,
            1,
            UVec3::splat(3),
            &mut out,
            &CancelToken::new(),
        );
        assert!(done);
        // In-bounds corner comes from the volume
        assert_eq!(out[0], 0);
        // x == 2 is out of bounds -> zero
        assert_eq!(out[2], 0);
        assert_eq!(out[26], 0);
    }

    #[test]
    fn test_fill_region_respects_cancellation() {
        let v = tiny_volume(1);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut out = vec![0u8; 8];
        assert!(!v.fill_region(UVec3::ZERO, 1, UVec3::splat(2), &mut out, &cancel));
    }
}
