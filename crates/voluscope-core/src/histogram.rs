//! Per-channel intensity histograms with a content-fingerprint cache.

use crate::volume::NormalizedVolume;

/// Number of histogram bins (one per normalized byte value).
pub const HISTOGRAM_BINS: usize = 256;

/// Value-based identity of a volume's contents, used as the cache key.
/// Two volumes with the same shape and byte length share a fingerprint;
/// callers invalidate explicitly when contents change in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeFingerprint {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub channels: u32,
    pub byte_len: usize,
}

impl VolumeFingerprint {
    #[must_use]
    pub fn of(volume: &NormalizedVolume) -> Self {
        Self {
            width: volume.width,
            height: volume.height,
            depth: volume.depth,
            channels: volume.channels,
            byte_len: volume.normalized.len(),
        }
    }
}

/// Computes one 256-bin histogram per channel.
#[must_use]
pub fn channel_histograms(volume: &NormalizedVolume) -> Vec<[u32; HISTOGRAM_BINS]> {
    let ch = volume.channels as usize;
    let mut histograms = vec![[0u32; HISTOGRAM_BINS]; ch];
    for chunk in volume.normalized.chunks_exact(ch) {
        for (c, &byte) in chunk.iter().enumerate() {
            histograms[c][byte as usize] += 1;
        }
    }
    histograms
}

/// Single-entry histogram cache keyed by content fingerprint.
#[derive(Default)]
pub struct HistogramCache {
    entry: Option<(VolumeFingerprint, Vec<[u32; HISTOGRAM_BINS]>)>,
}

impl HistogramCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns cached histograms when the fingerprint matches, recomputing
    /// otherwise.
    pub fn get_or_compute(&mut self, volume: &NormalizedVolume) -> &[[u32; HISTOGRAM_BINS]] {
        let fp = VolumeFingerprint::of(volume);
        let hit = self.entry.as_ref().is_some_and(|(key, _)| *key == fp);
        if !hit {
            log::trace!("histogram cache miss for {}x{}x{}", fp.width, fp.height, fp.depth);
            self.entry = Some((fp, channel_histograms(volume)));
        }
        &self.entry.as_ref().expect("entry populated above").1
    }

    /// Drops the cached entry; the next lookup recomputes.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::VolumeDataType;

    fn volume(data: Vec<u8>, channels: u32) -> NormalizedVolume {
        let voxels = data.len() / channels as usize;
        NormalizedVolume::new(
            voxels as u32,
            1,
            1,
            channels,
            data,
            0.0,
            1.0,
            VolumeDataType::Uint8,
        )
        .unwrap()
    }

    #[test]
    fn test_histogram_counts() {
        let v = volume(vec![0, 10, 0, 20, 0, 10], 2);
        let h = channel_histograms(&v);
        assert_eq!(h.len(), 2);
        assert_eq!(h[0][0], 3);
        assert_eq!(h[1][10], 2);
        assert_eq!(h[1][20], 1);
    }

    #[test]
    fn test_cache_hit_and_invalidate() {
        let v = volume(vec![5; 8], 1);
        let mut cache = HistogramCache::new();
        assert_eq!(cache.get_or_compute(&v)[0][5], 8);
        // Same fingerprint: served from cache
        assert_eq!(cache.get_or_compute(&v)[0][5], 8);
        cache.invalidate();
        assert_eq!(cache.get_or_compute(&v)[0][5], 8);
    }

    #[test]
    fn test_cache_distinguishes_shapes() {
        let a = volume(vec![1; 8], 1);
        let b = volume(vec![2; 4], 1);
        let mut cache = HistogramCache::new();
        assert_eq!(cache.get_or_compute(&a)[0][1], 8);
        assert_eq!(cache.get_or_compute(&b)[0][2], 4);
    }
}
