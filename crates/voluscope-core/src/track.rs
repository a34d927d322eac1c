//! Track definitions and the visual-state rules for their overlays.

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Tolerance used when matching a point's timestamp against the current
/// timepoint.
pub const TIME_EPSILON: f32 = 1e-3;

/// One time-stamped sample of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub time: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub amplitude: f32,
}

impl TrackPoint {
    /// Spatial position of the sample.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// An immutable particle/object trajectory supplied by the dataset layer.
///
/// Points are ordered by non-decreasing time; the viewer only derives
/// geometry from them and never mutates point data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDefinition {
    /// Unique track identity.
    pub id: String,
    /// Channel the track belongs to.
    pub channel_id: String,
    pub track_number: u32,
    pub points: Vec<TrackPoint>,
}

impl TrackDefinition {
    /// Number of line segments visible at timepoint `t`: the count of
    /// leading points with `time <= t`, minus one, clamped to zero.
    ///
    /// O(points) per call; monotonically non-decreasing in `t`.
    #[must_use]
    pub fn visible_segments(&self, t: f32) -> u32 {
        let visible_points = self
            .points
            .iter()
            .take_while(|p| p.time <= t + TIME_EPSILON)
            .count();
        visible_points.saturating_sub(1) as u32
    }

    /// Camera-follow target for timepoint `t`: the latest point with
    /// `time <= t + 1`, averaged over all points sharing that exact time
    /// (tracks may carry several detections per timestamp), transformed by
    /// `world` (the track group's world matrix).
    #[must_use]
    pub fn centroid_at(&self, t: f32, world: &Mat4) -> Option<Vec3> {
        let cutoff = t + 1.0 + TIME_EPSILON;
        let latest = self
            .points
            .iter()
            .filter(|p| p.time <= cutoff)
            .map(|p| p.time)
            .fold(None::<f32>, |acc, time| {
                Some(acc.map_or(time, |best| best.max(time)))
            })?;

        let mut sum = Vec3::ZERO;
        let mut count = 0u32;
        for p in &self.points {
            if (p.time - latest).abs() <= TIME_EPSILON {
                sum += p.position();
                count += 1;
            }
        }
        if count == 0 {
            return None;
        }
        Some(world.transform_point3(sum / count as f32))
    }
}

/// How a channel colors its tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackColorMode {
    /// Every track uses the channel's uniform color.
    #[default]
    Uniform,
    /// Each track gets a deterministic color hashed from its id.
    Palette,
}

/// Per-channel display settings for track overlays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackChannelSettings {
    pub color_mode: TrackColorMode,
    /// Uniform color as `#rrggbb`.
    pub color: String,
    pub opacity: f32,
    pub line_width: f32,
    /// 2D offset applied to every point of the channel's tracks.
    pub offset: Vec2,
    /// Explicit per-track visibility; tracks absent from the map default to
    /// visible.
    #[serde(default)]
    pub hidden_tracks: std::collections::HashSet<String>,
}

impl Default for TrackChannelSettings {
    fn default() -> Self {
        Self {
            color_mode: TrackColorMode::Uniform,
            color: "#4dd0e1".to_string(),
            opacity: 0.85,
            line_width: 1.0,
            offset: Vec2::ZERO,
            hidden_tracks: std::collections::HashSet::new(),
        }
    }
}

/// Inputs to the per-track visual-state derivation.
#[derive(Debug, Clone, Copy)]
pub struct TrackStateInput {
    /// Explicit visibility (true when unset upstream).
    pub visible: bool,
    pub hovered: bool,
    pub followed: bool,
    pub selected: bool,
    pub channel_opacity: f32,
    pub channel_line_width: f32,
}

/// Derived per-track drawing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackVisualState {
    pub should_show: bool,
    pub highlighted: bool,
    pub opacity: f32,
    pub width: f32,
    pub outline_opacity: f32,
    pub outline_width: f32,
}

/// Applies the multi-factor visual-state rules.
///
/// Following forces a track visible; following or hovering highlights it
/// and boosts opacity and width.
#[must_use]
pub fn derive_visual_state(input: &TrackStateInput) -> TrackVisualState {
    let should_show = input.followed || input.visible;
    let highlighted = input.followed || input.hovered;

    let opacity_boost = if input.followed {
        0.15
    } else if input.hovered {
        0.12
    } else {
        0.0
    };
    let width_factor = if input.followed {
        1.35
    } else if input.hovered {
        1.2
    } else {
        1.0
    };

    let base_width = input.channel_line_width.clamp(0.1, 10.0);
    let width = base_width * width_factor;

    let outline_opacity = if input.followed {
        0.75
    } else if input.hovered {
        0.9
    } else {
        0.0
    };

    TrackVisualState {
        should_show,
        highlighted,
        opacity: (input.channel_opacity + opacity_boost).clamp(0.0, 1.0),
        width,
        outline_opacity,
        outline_width: width + (input.channel_line_width * 0.75).max(0.4),
    }
}

/// Lerps a base color 40% toward white for highlighted tracks.
#[must_use]
pub fn highlight_color(base: Vec3) -> Vec3 {
    base.lerp(Vec3::ONE, 0.4)
}

/// Deterministic palette color hashed from a track id.
///
/// Stable across runs and processes (FNV-1a, then a hue spread with fixed
/// saturation/lightness), so recoloring never flickers between sessions.
#[must_use]
pub fn palette_color(id: &str) -> Vec3 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in id.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    let hue = (hash % 360) as f32;
    hsl_to_rgb(hue, 0.72, 0.55)
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Vec3 {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c * 0.5;
    Vec3::new(r + m, g + m, b + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(times: &[f32]) -> TrackDefinition {
        TrackDefinition {
            id: "t1".to_string(),
            channel_id: "ch0".to_string(),
            track_number: 1,
            points: times
                .iter()
                .enumerate()
                .map(|(i, &time)| TrackPoint {
                    time,
                    x: i as f32,
                    y: 0.0,
                    z: 0.0,
                    amplitude: 1.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_visible_segments_reveal() {
        let tr = track(&[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(tr.visible_segments(-1.0), 0);
        assert_eq!(tr.visible_segments(0.0), 0);
        assert_eq!(tr.visible_segments(1.0), 1);
        assert_eq!(tr.visible_segments(2.5), 2);
        assert_eq!(tr.visible_segments(10.0), 3);
    }

    #[test]
    fn test_visible_segments_monotonic() {
        let tr = track(&[0.0, 2.0, 2.0, 5.0, 9.0]);
        let mut last = 0;
        for step in 0..40 {
            let t = step as f32 * 0.25;
            let seg = tr.visible_segments(t);
            assert!(seg >= last, "reveal must be monotonic at t={t}");
            last = seg;
        }
    }

    #[test]
    fn test_centroid_averages_shared_timestamp() {
        let tr = TrackDefinition {
            id: "t".into(),
            channel_id: "c".into(),
            track_number: 0,
            points: vec![
                TrackPoint { time: 0.0, x: 0.0, y: 0.0, z: 0.0, amplitude: 1.0 },
                TrackPoint { time: 2.0, x: 2.0, y: 0.0, z: 0.0, amplitude: 1.0 },
                TrackPoint { time: 2.0, x: 4.0, y: 2.0, z: 0.0, amplitude: 1.0 },
            ],
        };
        // Latest point with time <= 1 + 1 is the pair at t=2
        let c = tr.centroid_at(1.0, &Mat4::IDENTITY).unwrap();
        assert!((c - Vec3::new(3.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_centroid_respects_world_matrix() {
        let tr = track(&[0.0]);
        let world = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let c = tr.centroid_at(0.0, &world).unwrap();
        assert!((c.x - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_centroid_none_before_first_point() {
        let tr = track(&[5.0, 6.0]);
        assert!(tr.centroid_at(1.0, &Mat4::IDENTITY).is_none());
    }

    #[test]
    fn test_visual_state_followed_overrides_hidden() {
        let state = derive_visual_state(&TrackStateInput {
            visible: false,
            hovered: false,
            followed: true,
            selected: false,
            channel_opacity: 0.5,
            channel_line_width: 1.0,
        });
        assert!(state.should_show);
        assert!(state.highlighted);
        assert!((state.opacity - 0.65).abs() < 1e-6);
        assert!((state.width - 1.35).abs() < 1e-6);
        assert!((state.outline_opacity - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_visual_state_hover_boost() {
        let state = derive_visual_state(&TrackStateInput {
            visible: true,
            hovered: true,
            followed: false,
            selected: false,
            channel_opacity: 0.95,
            channel_line_width: 2.0,
        });
        // Opacity clamps at 1
        assert!((state.opacity - 1.0).abs() < 1e-6);
        assert!((state.width - 2.4).abs() < 1e-6);
        assert!((state.outline_opacity - 0.9).abs() < 1e-6);
        assert!((state.outline_width - (2.4 + 1.5)).abs() < 1e-6);
    }

    #[test]
    fn test_visual_state_plain() {
        let state = derive_visual_state(&TrackStateInput {
            visible: true,
            hovered: false,
            followed: false,
            selected: false,
            channel_opacity: 0.8,
            channel_line_width: 0.01,
        });
        assert!(state.should_show);
        assert!(!state.highlighted);
        assert_eq!(state.outline_opacity, 0.0);
        // Width clamps to the 0.1 floor
        assert!((state.width - 0.1).abs() < 1e-6);
        // Outline pad floor is 0.4
        assert!((state.outline_width - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_palette_deterministic_and_distinct() {
        let a = palette_color("track-1");
        let b = palette_color("track-1");
        let c = palette_color("track-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        for v in [a.x, a.y, a.z] {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_highlight_lerp() {
        let h = highlight_color(Vec3::ZERO);
        assert!((h.x - 0.4).abs() < 1e-6);
    }
}
