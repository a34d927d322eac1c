//! Track overlay engine: line resource lifecycle, time-windowed draw
//! ranges, and the multi-factor visual-state machine.

use glam::{Vec2, Vec3};

use voluscope_core::track::{
    derive_visual_state, highlight_color, palette_color, TrackChannelSettings, TrackColorMode,
    TrackStateInput,
};
use voluscope_core::transfer::parse_hex_color;
use voluscope_render::{RenderEngine, TrackLineRenderData};

use crate::runtime::ViewerRuntime;

impl ViewerRuntime {
    /// Reconciles line resources against the track list: lazily creates a
    /// line per track id with at least one point, rebuilds when the
    /// channel's 2D offset changed, and disposes lines whose track id
    /// disappeared. Interaction state drops references to dead tracks.
    pub(crate) fn sync_track_lines(&mut self, engine: &RenderEngine) {
        let hovered_before = self
            .interaction
            .hovered_track_id()
            .map(ToString::to_string);

        // Dispose lines for tracks that no longer exist
        let live: std::collections::HashSet<&str> =
            self.tracks.iter().map(|t| t.id.as_str()).collect();
        self.track_lines.retain(|id, _| live.contains(id.as_str()));
        self.line_offsets.retain(|id, _| live.contains(id.as_str()));
        self.interaction.retain_tracks(|id| live.contains(id));

        if let Some(hovered) = hovered_before {
            if self.interaction.hovered_track_id().is_none() && !live.contains(hovered.as_str()) {
                if let Some(callback) = &mut self.callbacks.on_hover_track {
                    callback(None);
                }
            }
        }

        for track in &self.tracks {
            if track.points.is_empty() {
                continue;
            }
            let offset = self
                .channel_settings
                .get(&track.channel_id)
                .map_or(Vec2::ZERO, |s| s.offset);

            let stale = self.line_offsets.get(&track.id) != Some(&offset);
            if self.track_lines.contains_key(&track.id) && !stale {
                continue;
            }
            // Dispose before the key is reused
            self.track_lines.remove(&track.id);

            let points: Vec<Vec3> = track
                .points
                .iter()
                .map(|p| Vec3::new(p.x + offset.x, p.y + offset.y, p.z))
                .collect();
            let times: Vec<f32> = track.points.iter().map(|p| p.time).collect();
            let mut line = TrackLineRenderData::new(
                &engine.device,
                &engine.track_line_bind_group_layout,
                &engine.camera_buffer,
                &points,
                times,
                self.track_base_color(&track.id, &track.channel_id),
            );
            line.update_draw_range(self.timepoint as f32);
            line.write_resolution(&engine.queue, engine.width, engine.height);
            self.track_lines.insert(track.id.clone(), line);
            self.line_offsets.insert(track.id.clone(), offset);
        }
    }

    /// Advances every track's draw range to the current timepoint. Runs on
    /// every timepoint change and is O(points per track) per track.
    pub(crate) fn update_track_draw_ranges(&mut self) {
        let t = self.timepoint as f32;
        for line in self.track_lines.values_mut() {
            line.update_draw_range(t);
        }
    }

    /// Recomputes each track's visual state (visibility, color, width,
    /// opacity, outline) from the visibility map, channel settings, hover,
    /// selection, and follow. A track whose only visibility source was
    /// hover clears the hover when it goes invisible, so no tooltip ever
    /// references a hidden line.
    pub(crate) fn refresh_track_visuals(&mut self, engine: &RenderEngine) {
        let hovered = self
            .interaction
            .hovered_track_id()
            .map(ToString::to_string);
        let followed = self
            .interaction
            .followed_track_id()
            .map(ToString::to_string);
        let mut clear_hover = false;

        for track in &self.tracks {
            let Some(line) = self.track_lines.get_mut(&track.id) else {
                continue;
            };
            let settings = self.channel_settings.get(&track.channel_id);
            let defaults = TrackChannelSettings::default();
            let settings = settings.unwrap_or(&defaults);

            let is_hovered = hovered.as_deref() == Some(track.id.as_str());
            let is_followed = followed.as_deref() == Some(track.id.as_str());
            let input = TrackStateInput {
                visible: !settings.hidden_tracks.contains(&track.id),
                hovered: is_hovered,
                followed: is_followed,
                selected: self.interaction.is_selected(&track.id),
                channel_opacity: settings.opacity,
                channel_line_width: settings.line_width,
            };
            let style = derive_visual_state(&input);

            if is_hovered && !style.should_show {
                clear_hover = true;
            }

            let base = match settings.color_mode {
                TrackColorMode::Uniform => {
                    parse_hex_color(&settings.color).unwrap_or(Vec3::ONE)
                }
                TrackColorMode::Palette => palette_color(&track.id),
            };
            let highlight = highlight_color(base);
            let color = if style.highlighted { highlight } else { base };

            line.apply_style(
                &engine.queue,
                &style,
                color,
                highlight,
                (engine.width, engine.height),
            );
        }

        if clear_hover {
            self.interaction.clear_hover();
            if let Some(callback) = &mut self.callbacks.on_hover_track {
                callback(None);
            }
        }
    }

    /// Camera-follow target for the followed track at the current
    /// timepoint, in world space.
    #[must_use]
    pub fn follow_target(&self) -> Option<Vec3> {
        let id = self.interaction.followed_track_id()?;
        let track = self.tracks.iter().find(|t| t.id == id)?;
        track.centroid_at(self.timepoint as f32, &self.track_world)
    }

    fn track_base_color(&self, track_id: &str, channel_id: &str) -> Vec3 {
        let defaults = TrackChannelSettings::default();
        let settings = self.channel_settings.get(channel_id).unwrap_or(&defaults);
        match settings.color_mode {
            TrackColorMode::Uniform => parse_hex_color(&settings.color).unwrap_or(Vec3::ONE),
            TrackColorMode::Palette => palette_color(track_id),
        }
    }
}
