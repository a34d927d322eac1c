//! Transient hover / selection / follow state.
//!
//! Owned by the viewer runtime for the life of one session, mutated by the
//! interaction layer and read by the track overlay engine and the shader
//! uniforms every frame.

use std::collections::HashSet;

use glam::{UVec3, Vec3};

/// Where a track hover came from. Pointer hover takes priority over
/// controller hover when both are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverSource {
    Pointer,
    /// Index of the VR controller that produced the hover.
    Controller(usize),
}

/// A hovered track with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackHover {
    pub track_id: String,
    pub source: HoverSource,
}

/// Voxel-level hover readout for intensity display.
#[derive(Debug, Clone, PartialEq)]
pub struct HoveredVoxel {
    pub layer_key: String,
    /// Integer voxel coordinate.
    pub voxel: UVec3,
    /// Position in normalized [0, 1]^3 volume space, for the shader's
    /// highlight uniform.
    pub normalized_pos: Vec3,
    /// Raw windowed intensity at the voxel.
    pub intensity: f32,
    /// Per-channel byte values at the voxel.
    pub channel_values: Vec<u8>,
    /// Segmentation label, when the layer carries one.
    pub label: Option<f32>,
}

/// Process-wide interaction state.
#[derive(Debug, Default)]
pub struct InteractionState {
    hovered_track: Option<TrackHover>,
    pub selected_tracks: HashSet<String>,
    followed_track: Option<String>,
    pub hovered_voxel: Option<HoveredVoxel>,
}

impl InteractionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently hovered track id, if any.
    #[must_use]
    pub fn hovered_track_id(&self) -> Option<&str> {
        self.hovered_track.as_ref().map(|h| h.track_id.as_str())
    }

    #[must_use]
    pub fn hovered_track(&self) -> Option<&TrackHover> {
        self.hovered_track.as_ref()
    }

    /// Records a hover. A controller hover never displaces an active
    /// pointer hover; every other combination replaces the previous state.
    /// Returns whether the hovered id changed.
    pub fn set_hover(&mut self, track_id: &str, source: HoverSource) -> bool {
        if let Some(current) = &self.hovered_track {
            if current.source == HoverSource::Pointer && source != HoverSource::Pointer {
                return false;
            }
            if current.track_id == track_id && current.source == source {
                return false;
            }
        }
        let changed = self.hovered_track_id() != Some(track_id);
        self.hovered_track = Some(TrackHover {
            track_id: track_id.to_string(),
            source,
        });
        changed
    }

    /// Clears hover when it was produced by `source`. Returns whether hover
    /// was cleared.
    pub fn clear_hover_from(&mut self, source: HoverSource) -> bool {
        if self
            .hovered_track
            .as_ref()
            .is_some_and(|h| h.source == source)
        {
            self.hovered_track = None;
            return true;
        }
        false
    }

    /// Unconditionally clears track hover (e.g. when the hovered track was
    /// hidden so no dangling tooltip references an invisible line).
    pub fn clear_hover(&mut self) {
        self.hovered_track = None;
    }

    #[must_use]
    pub fn followed_track_id(&self) -> Option<&str> {
        self.followed_track.as_deref()
    }

    /// Follows a track; at most one track is followed at a time.
    pub fn follow(&mut self, track_id: &str) {
        self.followed_track = Some(track_id.to_string());
    }

    pub fn unfollow(&mut self) {
        self.followed_track = None;
    }

    pub fn toggle_selected(&mut self, track_id: &str) {
        if !self.selected_tracks.remove(track_id) {
            self.selected_tracks.insert(track_id.to_string());
        }
    }

    #[must_use]
    pub fn is_selected(&self, track_id: &str) -> bool {
        self.selected_tracks.contains(track_id)
    }

    /// Drops every reference to tracks not in the live set (tracks removed
    /// upstream must not linger in hover/selection/follow).
    pub fn retain_tracks<F: Fn(&str) -> bool>(&mut self, alive: F) {
        if self
            .hovered_track
            .as_ref()
            .is_some_and(|h| !alive(&h.track_id))
        {
            self.hovered_track = None;
        }
        if self
            .followed_track
            .as_ref()
            .is_some_and(|id| !alive(id))
        {
            self.followed_track = None;
        }
        self.selected_tracks.retain(|id| alive(id));
    }

    /// Clears voxel hover; the caller must also clear the shader's highlight
    /// uniform.
    pub fn clear_voxel_hover(&mut self) {
        self.hovered_voxel = None;
    }

    /// Clears all hover and selection-adjacent transient state (used when a
    /// VR session ends).
    pub fn clear_transient(&mut self) {
        self.hovered_track = None;
        self.hovered_voxel = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_hover_beats_controller() {
        let mut state = InteractionState::new();
        assert!(state.set_hover("a", HoverSource::Pointer));
        assert!(!state.set_hover("b", HoverSource::Controller(0)));
        assert_eq!(state.hovered_track_id(), Some("a"));

        // Pointer may replace pointer
        assert!(state.set_hover("b", HoverSource::Pointer));
        assert_eq!(state.hovered_track_id(), Some("b"));
    }

    #[test]
    fn test_controller_hover_allowed_when_free() {
        let mut state = InteractionState::new();
        assert!(state.set_hover("a", HoverSource::Controller(1)));
        assert_eq!(state.hovered_track_id(), Some("a"));
        // Pointer displaces it
        assert!(state.set_hover("c", HoverSource::Pointer));
        assert_eq!(state.hovered_track_id(), Some("c"));
    }

    #[test]
    fn test_clear_from_source() {
        let mut state = InteractionState::new();
        state.set_hover("a", HoverSource::Controller(0));
        assert!(!state.clear_hover_from(HoverSource::Controller(1)));
        assert!(state.clear_hover_from(HoverSource::Controller(0)));
        assert!(state.hovered_track_id().is_none());
    }

    #[test]
    fn test_follow_is_exclusive() {
        let mut state = InteractionState::new();
        state.follow("a");
        state.follow("b");
        assert_eq!(state.followed_track_id(), Some("b"));
        state.unfollow();
        assert!(state.followed_track_id().is_none());
    }

    #[test]
    fn test_retain_tracks_drops_dead_references() {
        let mut state = InteractionState::new();
        state.set_hover("gone", HoverSource::Pointer);
        state.follow("gone");
        state.toggle_selected("gone");
        state.toggle_selected("kept");

        state.retain_tracks(|id| id == "kept");

        assert!(state.hovered_track_id().is_none());
        assert!(state.followed_track_id().is_none());
        assert!(!state.is_selected("gone"));
        assert!(state.is_selected("kept"));
    }
}
