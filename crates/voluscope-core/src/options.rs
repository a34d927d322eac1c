//! Viewer-wide options, serializable so the embedding application can
//! persist them.

use serde::{Deserialize, Serialize};

/// Global display and quality options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerOptions {
    /// Background clear color (linear RGBA).
    pub background_color: [f32; 4],
    /// Quality control for linear-mode ray stepping: samples per unit
    /// travel distance. Larger values give smoother iso surfaces at the
    /// cost of fill rate.
    pub step_scale: f32,
    /// Hover highlight radius in voxels (scaled per axis for anisotropic
    /// volumes).
    pub hover_radius: f32,
    /// Iso-surface threshold in windowed [0, 1] space.
    pub iso_threshold: f32,
    /// Additive blending across layers instead of straight alpha.
    pub additive_blending: bool,
    /// Show track overlays.
    pub show_tracks: bool,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            background_color: [0.02, 0.02, 0.03, 1.0],
            step_scale: 1.0,
            hover_radius: 4.0,
            iso_threshold: 0.5,
            additive_blending: true,
            show_tracks: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_round_trip_json() {
        let mut options = ViewerOptions::default();
        options.step_scale = 2.5;
        let json = serde_json::to_string(&options).unwrap();
        let back: ViewerOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.step_scale, 2.5);
        assert_eq!(back.background_color, options.background_color);
    }
}
