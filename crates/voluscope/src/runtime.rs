//! The owned viewer runtime: resource maps, frame ordering, callbacks.
//!
//! All GPU resource maps live here and are mutated only from the render
//! thread. Per frame the order is fixed: resource reconciliation, then
//! clipmap updates, then the render call; interaction rays update hover
//! state for the next frame, so hover lags by at most one frame.

use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec3};

use voluscope_core::interaction::{HoverSource, HoveredVoxel, InteractionState};
use voluscope_core::layer::{LayerMode, ViewerLayer};
use voluscope_core::options::ViewerOptions;
use voluscope_core::track::{TrackChannelSettings, TrackDefinition};
use voluscope_core::volume::CancelToken;
use voluscope_render::{
    FrameContent, HudRenderData, RenderEngine, RenderResult, TrackLineRenderData, VolumeBindings,
    VolumeResources,
};

use crate::app::picking::{
    self, hover_voxel_for_layer, pick_track_at_ray, world_to_screen, TRACK_PICK_THRESHOLD,
};
use crate::vr::{HudController, VrAction, VrController, VrSession, VrTarget};

/// Outbound event callbacks registered by the embedding application.
#[derive(Default)]
pub struct ViewerCallbacks {
    /// Hover-voxel change: intensity + coordinates (+ label).
    pub on_hover_voxel: Option<Box<dyn FnMut(Option<&HoveredVoxel>)>>,
    /// Hover-track change, with a screen-space tooltip anchor.
    pub on_hover_track: Option<Box<dyn FnMut(Option<(&str, Vec2)>)>>,
    /// Reset-view requests.
    pub on_reset_view: Option<Box<dyn FnMut()>>,
    /// Immersive session started.
    pub on_vr_started: Option<Box<dyn FnMut()>>,
    /// Immersive session ended.
    pub on_vr_ended: Option<Box<dyn FnMut()>>,
}

/// The viewer's single owned runtime object. No global state: every
/// subsystem takes this by reference.
pub struct ViewerRuntime {
    pub options: ViewerOptions,
    pub interaction: InteractionState,

    pub(crate) layers: Vec<ViewerLayer>,
    pub(crate) tracks: Vec<TrackDefinition>,
    pub(crate) channel_settings: HashMap<String, TrackChannelSettings>,
    pub(crate) timepoint: u32,
    pub(crate) playing: bool,
    /// World transform of the track group (dataset -> world).
    pub(crate) track_world: Mat4,

    pub(crate) resources: HashMap<String, VolumeResources>,
    pub(crate) track_lines: HashMap<String, TrackLineRenderData>,
    pub(crate) line_offsets: HashMap<String, Vec2>,

    pub vr: VrSession,
    pub controllers: [VrController; 2],
    pub hud: HudController,
    /// Whether desktop orbit controls are active (disabled while a VR
    /// session presents or while dolly/pan interactions are running).
    pub controls_enabled: bool,

    pub callbacks: ViewerCallbacks,

    clip_cancel: CancelToken,
    hover_pulse_phase: f32,
    interaction_lod: bool,
}

impl Default for ViewerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: ViewerOptions::default(),
            interaction: InteractionState::new(),
            layers: Vec::new(),
            tracks: Vec::new(),
            channel_settings: HashMap::new(),
            timepoint: 0,
            playing: false,
            track_world: Mat4::IDENTITY,
            resources: HashMap::new(),
            track_lines: HashMap::new(),
            line_offsets: HashMap::new(),
            vr: VrSession::new(),
            controllers: [VrController::new(), VrController::new()],
            hud: HudController::new(),
            controls_enabled: true,
            callbacks: ViewerCallbacks::default(),
            clip_cancel: CancelToken::new(),
            hover_pulse_phase: 0.0,
            interaction_lod: false,
        }
    }

    /// Replaces the full layer list; resources are reconciled on the next
    /// frame.
    pub fn set_layers(&mut self, layers: Vec<ViewerLayer>) {
        self.layers = layers;
    }

    #[must_use]
    pub fn layers(&self) -> &[ViewerLayer] {
        &self.layers
    }

    /// Replaces the track list; line resources are reconciled on the next
    /// frame.
    pub fn set_tracks(&mut self, tracks: Vec<TrackDefinition>) {
        self.tracks = tracks;
    }

    #[must_use]
    pub fn tracks(&self) -> &[TrackDefinition] {
        &self.tracks
    }

    pub fn set_channel_settings(&mut self, channel_id: &str, settings: TrackChannelSettings) {
        self.channel_settings
            .insert(channel_id.to_string(), settings);
    }

    #[must_use]
    pub fn timepoint(&self) -> u32 {
        self.timepoint
    }

    /// Last timepoint across all tracks.
    #[must_use]
    pub fn max_timepoint(&self) -> u32 {
        self.tracks
            .iter()
            .flat_map(|t| t.points.iter())
            .map(|p| p.time.ceil() as u32)
            .max()
            .unwrap_or(0)
    }

    pub fn set_timepoint(&mut self, timepoint: u32) {
        self.timepoint = timepoint.min(self.max_timepoint());
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
        self.hud.set_playing(playing);
    }

    pub fn toggle_playback(&mut self) {
        let playing = !self.playing;
        self.set_playing(playing);
    }

    /// Advances playback one timepoint per call while playing, wrapping at
    /// the end.
    pub fn tick_playback(&mut self) {
        if !self.playing {
            return;
        }
        let max = self.max_timepoint();
        if max == 0 {
            return;
        }
        self.timepoint = if self.timepoint >= max {
            0
        } else {
            self.timepoint + 1
        };
    }

    /// External "follow track X" request.
    pub fn follow_track(&mut self, track_id: &str) {
        self.interaction.follow(track_id);
    }

    /// Keys of the currently owned volume resources. After a reconcile
    /// pass this exactly equals the set of layer keys with non-null
    /// volumes.
    #[must_use]
    pub fn resource_keys(&self) -> std::collections::HashSet<String> {
        self.resources.keys().cloned().collect()
    }

    /// Runs only the track-overlay portion of a frame: line resource
    /// reconciliation, draw ranges, and visual state.
    pub fn update_track_overlays(&mut self, engine: &RenderEngine) {
        self.sync_track_lines(engine);
        self.update_track_draw_ranges();
        self.refresh_track_visuals(engine);
    }

    /// Currently revealed segment count for a track, if its line exists.
    #[must_use]
    pub fn track_visible_segments(&self, track_id: &str) -> Option<u32> {
        self.track_lines.get(track_id).map(|l| l.visible_segments)
    }

    /// Whether a track's line is currently drawn.
    #[must_use]
    pub fn track_line_visible(&self, track_id: &str) -> Option<bool> {
        self.track_lines.get(track_id).map(|l| l.visible)
    }

    /// Whether a track's highlight outline is currently drawn.
    #[must_use]
    pub fn track_outline_visible(&self, track_id: &str) -> Option<bool> {
        self.track_lines.get(track_id).map(|l| l.outline_visible)
    }

    /// Drops line resources and interaction references for tracks no
    /// longer in the track list. This is the GPU-free subset of the
    /// per-frame reconciliation, exposed for hosts that mutate track lists
    /// while no engine is running.
    pub fn prune_dead_tracks(&mut self) {
        let live: std::collections::HashSet<&str> =
            self.tracks.iter().map(|t| t.id.as_str()).collect();
        self.track_lines.retain(|id, _| live.contains(id.as_str()));
        self.line_offsets.retain(|id, _| live.contains(id.as_str()));
        self.interaction.retain_tracks(|id| live.contains(id));
    }

    pub fn unfollow(&mut self) {
        self.interaction.unfollow();
    }

    // ---- Per-frame pipeline ----

    /// Runs one full frame in the required order: reconciliation, clipmap
    /// updates, track updates, render.
    pub fn frame(&mut self, engine: &mut RenderEngine, hud: Option<&mut HudRenderData>, dt: f32) -> RenderResult<()> {
        self.hover_pulse_phase = (self.hover_pulse_phase + dt * 2.0).fract();

        self.reconcile(engine)?;
        self.update_clipmaps(engine);

        self.sync_track_lines(engine);
        self.update_track_draw_ranges();
        self.refresh_track_visuals(engine);
        self.apply_follow_camera(engine);
        self.write_hover_uniforms(engine);

        let hud_ref = if let Some(hud) = hud {
            self.update_hud(engine, &mut *hud);
            Some(&*hud)
        } else {
            None
        };

        let bg = self.options.background_color;
        let mut volumes: Vec<&VolumeResources> = Vec::with_capacity(self.resources.len());
        for layer in &self.layers {
            if !layer.visible {
                continue;
            }
            if let Some(resources) = self.resources.get(&layer.key) {
                volumes.push(resources);
            }
        }
        let tracks: Vec<&TrackLineRenderData> = if self.options.show_tracks {
            self.track_lines.values().collect()
        } else {
            Vec::new()
        };

        engine.render(&FrameContent {
            background: wgpu::Color {
                r: f64::from(bg[0]),
                g: f64::from(bg[1]),
                b: f64::from(bg[2]),
                a: f64::from(bg[3]),
            },
            additive: self.options.additive_blending,
            volumes,
            tracks,
            hud: hud_ref,
        })
    }

    /// Reconciles the resource map against the layer list: after this,
    /// map keys exactly equal the layer keys with non-null volumes.
    pub fn reconcile(&mut self, engine: &mut RenderEngine) -> RenderResult<()> {
        // Dispose resources whose layer disappeared or lost its volume.
        // Dropping the entry disposes its GPU objects before map removal.
        let live: std::collections::HashSet<&str> = self
            .layers
            .iter()
            .filter(|l| l.has_volume())
            .map(|l| l.key.as_str())
            .collect();
        self.resources.retain(|key, _| {
            let keep = live.contains(key.as_str());
            if !keep {
                log::info!("disposing volume resources for removed layer '{key}'");
            }
            keep
        });

        // A vanished layer must not leave a dangling voxel hover (or a
        // stale shader highlight behind it)
        if self
            .interaction
            .hovered_voxel
            .as_ref()
            .is_some_and(|h| !live.contains(h.layer_key.as_str()))
        {
            self.interaction.clear_voxel_hover();
            if let Some(callback) = &mut self.callbacks.on_hover_voxel {
                callback(None);
            }
        }

        for layer in &self.layers {
            if !layer.has_volume() {
                continue;
            }
            let rebuild = match self.resources.get(&layer.key) {
                Some(existing) => existing.needs_rebuild(layer),
                None => true,
            };

            let colormap = engine.colormaps.get_or_create(
                &engine.device,
                &engine.queue,
                &layer.color,
            );
            let bindings = VolumeBindings {
                layout: &engine.volume_bind_group_layout,
                slice_layout: &engine.slice_bind_group_layout,
                camera_buffer: &engine.camera_buffer,
                linear_sampler: &engine.linear_sampler,
                nearest_sampler: &engine.nearest_sampler,
                colormap_view: &colormap.view,
                colormap_sampler: &engine.colormap_sampler,
                dummy_label_view: &engine.dummy_label_view,
            };

            if rebuild {
                // Remove first so the old GPU objects are disposed before
                // the key is reused.
                self.resources.remove(&layer.key);
                let resources = VolumeResources::new(
                    &engine.device,
                    &engine.queue,
                    layer,
                    &self.options,
                    &bindings,
                )?;
                self.resources.insert(layer.key.clone(), resources);
            } else if let Some(resources) = self.resources.get_mut(&layer.key) {
                resources.update(&engine.device, &engine.queue, layer, &self.options, &bindings)?;
            }
        }
        Ok(())
    }

    /// Re-centers every streamed layer's clipmap around the camera target.
    /// A fresh cancellation token is issued per pass so a stale in-flight
    /// population can be abandoned without uploading.
    pub fn update_clipmaps(&mut self, engine: &RenderEngine) {
        self.clip_cancel.cancel();
        self.clip_cancel = CancelToken::new();

        let focus_world = engine.camera.target;
        for layer in &self.layers {
            let Some(volume) = layer.volume.as_ref() else {
                continue;
            };
            let Some(resources) = self.resources.get_mut(&layer.key) else {
                continue;
            };
            // Focus in the layer's voxel space
            let model = voluscope_render::volume_model_matrix(layer.offset_x, layer.offset_y);
            let focus = model.inverse().transform_point3(focus_world);
            resources.update_clipmap(&engine.queue, volume, focus, &self.clip_cancel);
        }
    }

    /// During fast camera interaction the finest clip level is skipped.
    pub fn set_interaction_lod(&mut self, engine: &RenderEngine, active: bool) {
        if self.interaction_lod == active {
            return;
        }
        self.interaction_lod = active;
        for resources in self.resources.values_mut() {
            resources.set_interaction_lod(&engine.queue, active);
        }
    }

    /// Propagates a resize to the camera aspect and every line material's
    /// resolution uniform.
    pub fn resize(&mut self, engine: &mut RenderEngine, width: u32, height: u32) {
        engine.resize(width, height);
        for line in self.track_lines.values() {
            line.write_resolution(&engine.queue, width, height);
        }
    }

    /// Frames the union bounding box of visible layers and notifies the
    /// registered reset-view callback.
    pub fn reset_view(&mut self, engine: &mut RenderEngine) {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut any = false;
        for layer in &self.layers {
            let Some(volume) = layer.volume.as_ref() else {
                continue;
            };
            if !layer.visible {
                continue;
            }
            let offset = Vec3::new(layer.offset_x, layer.offset_y, 0.0);
            min = min.min(offset - Vec3::splat(0.5));
            max = max.max(volume.dims().as_vec3() + offset - Vec3::splat(0.5));
            any = true;
        }
        if any {
            engine.camera.look_at_box(min, max);
        }
        if let Some(callback) = &mut self.callbacks.on_reset_view {
            callback();
        }
    }

    // ---- Hover ----

    /// Updates pointer hover state: raycasts visible track lines, then
    /// falls back to voxel hover on the topmost visible 3D layer. `None`
    /// pointer (left the element) clears both.
    pub fn pointer_hover(&mut self, engine: &RenderEngine, pointer: Option<Vec2>) {
        let ray = pointer.and_then(|p| {
            picking::screen_ray(p, engine.width, engine.height, &engine.camera)
        });
        let Some((origin, dir)) = ray else {
            self.clear_pointer_hover();
            return;
        };

        let threshold = TRACK_PICK_THRESHOLD * engine.camera.distance_to_target().max(1.0);
        let hit = pick_track_at_ray(
            self.track_lines
                .iter()
                .map(|(id, line)| (id.as_str(), line)),
            &self.track_world,
            origin,
            dir,
            threshold,
        );

        match hit {
            Some(hit) => {
                let changed = self
                    .interaction
                    .set_hover(&hit.track_id, HoverSource::Pointer);
                if changed {
                    let anchor =
                        world_to_screen(hit.point, engine.width, engine.height, &engine.camera)
                            .unwrap_or(Vec2::ZERO);
                    if let Some(callback) = &mut self.callbacks.on_hover_track {
                        callback(Some((hit.track_id.as_str(), anchor)));
                    }
                }
                // Track hover suppresses voxel hover
                if self.interaction.hovered_voxel.take().is_some() {
                    if let Some(callback) = &mut self.callbacks.on_hover_voxel {
                        callback(None);
                    }
                }
            }
            None => {
                if self.interaction.clear_hover_from(HoverSource::Pointer) {
                    if let Some(callback) = &mut self.callbacks.on_hover_track {
                        callback(None);
                    }
                }
                self.update_voxel_hover(origin, dir);
            }
        }
    }

    fn update_voxel_hover(&mut self, origin: Vec3, dir: Vec3) {
        let hovered = self.layers.iter().find_map(|layer| {
            if !layer.visible || layer.mode != LayerMode::ThreeD {
                return None;
            }
            let model = voluscope_render::volume_model_matrix(layer.offset_x, layer.offset_y);
            hover_voxel_for_layer(layer, origin, dir, &model, self.options.step_scale)
        });

        if hovered != self.interaction.hovered_voxel {
            self.interaction.hovered_voxel = hovered;
            if let Some(callback) = &mut self.callbacks.on_hover_voxel {
                callback(self.interaction.hovered_voxel.as_ref());
            }
        }
    }

    /// Clears pointer-sourced hover state (pointer left the element or the
    /// surface lost its geometry). The shader highlight uniform is cleared
    /// on the next `write_hover_uniforms` pass.
    pub fn clear_pointer_hover(&mut self) {
        if self.interaction.clear_hover_from(HoverSource::Pointer) {
            if let Some(callback) = &mut self.callbacks.on_hover_track {
                callback(None);
            }
        }
        if self.interaction.hovered_voxel.take().is_some() {
            if let Some(callback) = &mut self.callbacks.on_hover_voxel {
                callback(None);
            }
        }
    }

    /// Plain click: hit-test tracks and follow the nearest hit. Returns
    /// whether a track was hit.
    pub fn click_follow(&mut self, engine: &RenderEngine, pointer: Vec2) -> bool {
        let Some((origin, dir)) =
            picking::screen_ray(pointer, engine.width, engine.height, &engine.camera)
        else {
            return false;
        };
        let threshold = TRACK_PICK_THRESHOLD * engine.camera.distance_to_target().max(1.0);
        let hit = pick_track_at_ray(
            self.track_lines
                .iter()
                .map(|(id, line)| (id.as_str(), line)),
            &self.track_world,
            origin,
            dir,
            threshold,
        );
        match hit {
            Some(hit) => {
                log::info!("following track '{}'", hit.track_id);
                self.interaction.follow(&hit.track_id);
                true
            }
            None => false,
        }
    }

    /// Writes the hover highlight uniform into every 3D layer's resources:
    /// active on the hovered layer, cleared elsewhere. Invalidation is
    /// explicit so a vanished layer never keeps a stale highlight.
    fn write_hover_uniforms(&mut self, engine: &RenderEngine) {
        let pulse = (self.hover_pulse_phase * std::f32::consts::TAU).sin() * 0.5 + 0.5;
        let hovered = self.interaction.hovered_voxel.clone();
        for (key, resources) in &mut self.resources {
            let hover = hovered.as_ref().filter(|h| h.layer_key == *key).map(|h| {
                let dims = resources.dims.as_vec3();
                (h.normalized_pos * dims, pulse, h.label)
            });
            resources.write_hover(&engine.queue, hover);
        }
    }

    // ---- Follow camera ----

    /// Moves the camera target to the followed track's centroid for the
    /// current timepoint, carrying the camera along at a fixed offset.
    fn apply_follow_camera(&mut self, engine: &mut RenderEngine) {
        let Some(target) = self.follow_target() else {
            return;
        };
        let delta = target - engine.camera.target;
        if delta.length_squared() < 1e-12 {
            return;
        }
        engine.camera.target = target;
        engine.camera.position += delta;
    }

    // ---- VR ----

    /// Requests an immersive session.
    pub fn request_vr(&mut self, supported: bool) -> voluscope_core::Result<()> {
        self.vr.request(supported)
    }

    /// Device granted the session: snapshot the pose, disable desktop
    /// controls, show the HUD.
    pub fn vr_presented(&mut self, engine: &RenderEngine, hud: &mut HudRenderData) {
        if !self.vr.begin_presenting(&engine.camera) {
            return;
        }
        self.controls_enabled = false;
        hud.visible = true;
        if let Some(callback) = &mut self.callbacks.on_vr_started {
            callback();
        }
    }

    /// Session ended (user, device, or error): restore the exact pre-VR
    /// pose, re-enable desktop controls, hide the HUD, clear transient
    /// hover/active state.
    pub fn vr_ended(&mut self, engine: &mut RenderEngine, hud: &mut HudRenderData) {
        let was_presenting = self.vr.end(&mut engine.camera);
        self.controls_enabled = true;
        hud.visible = false;
        self.hud.cancel_drag();
        self.hud.set_hovered(None);
        self.hud.set_pressed(None);
        self.interaction.clear_transient();
        for controller in &mut self.controllers {
            controller.update_target(None);
        }
        if was_presenting {
            if let Some(callback) = &mut self.callbacks.on_vr_ended {
                callback();
            }
        }
    }

    /// Per-frame controller ray update: HUD interactables first (closest
    /// HUD hit wins and suppresses track hover for that controller), then
    /// visible track lines.
    pub fn controller_ray(
        &mut self,
        engine: &RenderEngine,
        index: usize,
        ray_origin: Vec3,
        ray_dir: Vec3,
        hud: &HudRenderData,
    ) {
        if index >= self.controllers.len() || !self.controllers[index].is_connected() {
            return;
        }

        let hud_model = hud_model_matrix(engine);
        let hud_hit = if hud.visible {
            self.hud.hit_test(ray_origin, ray_dir, &hud_model)
        } else {
            None
        };

        let target = if let Some(hit) = hud_hit {
            // Live slider preview while dragging
            if matches!(
                self.controllers[index].phase,
                crate::vr::ControllerPhase::Pressing { .. }
            ) && matches!(
                hit.element,
                voluscope_render::HudElement::SliderKnob
                    | voluscope_render::HudElement::SliderTrack
            ) {
                self.hud.drag_to(hit.local.x);
            }
            Some(VrTarget::Hud(hit.element))
        } else {
            let threshold = TRACK_PICK_THRESHOLD * engine.camera.distance_to_target().max(1.0);
            pick_track_at_ray(
                self.track_lines
                    .iter()
                    .map(|(id, line)| (id.as_str(), line)),
                &self.track_world,
                ray_origin,
                ray_dir,
                threshold,
            )
            .map(|hit| VrTarget::Track(hit.track_id))
        };

        self.controllers[index].update_target(target.clone());
        self.sync_controller_hover(index, target);
    }

    fn sync_controller_hover(&mut self, index: usize, target: Option<VrTarget>) {
        match &target {
            Some(VrTarget::Hud(element)) => {
                self.hud.set_hovered(Some(*element));
                self.interaction
                    .clear_hover_from(HoverSource::Controller(index));
            }
            Some(VrTarget::Track(id)) => {
                self.hud.set_hovered(None);
                self.interaction
                    .set_hover(id, HoverSource::Controller(index));
            }
            None => {
                self.hud.set_hovered(None);
                self.interaction
                    .clear_hover_from(HoverSource::Controller(index));
            }
        }
    }

    /// Select button pressed on a controller.
    pub fn controller_select_start(&mut self, index: usize) {
        if let Some(controller) = self.controllers.get_mut(index) {
            controller.select_start();
            if let Some(VrTarget::Hud(element)) = controller.hover_target() {
                self.hud.set_pressed(Some(*element));
            }
        }
    }

    /// Select button released: commit the resulting action.
    pub fn controller_select_end(&mut self, index: usize) {
        let Some(controller) = self.controllers.get_mut(index) else {
            return;
        };
        let action = controller.select_end();
        self.hud.set_pressed(None);
        if let Some(action) = action {
            self.apply_vr_action(&action);
        }
    }

    /// Applies a committed VR action.
    pub fn apply_vr_action(&mut self, action: &VrAction) {
        match action {
            VrAction::TogglePlayback => self.toggle_playback(),
            VrAction::CommitScrub => {
                let fraction = self.hud.commit_drag();
                let timepoint = HudController::quantize(fraction, self.max_timepoint());
                self.set_timepoint(timepoint);
            }
            VrAction::FollowTrack(id) => self.interaction.follow(id),
        }
    }

    fn update_hud(&mut self, engine: &RenderEngine, hud: &mut HudRenderData) {
        if !hud.visible {
            return;
        }
        let max = self.max_timepoint();
        if max > 0 && !self.hud_dragging() {
            self.hud
                .set_slider_fraction(self.timepoint as f32 / max as f32);
        }
        if let Some(text) = self.hud.refresh_label(self.timepoint, max) {
            let text = text.to_string();
            hud.set_label(&engine.queue, &text);
        }
        hud.update_quads(&engine.queue, &self.hud.visual);
        hud.update_anchor(&engine.queue, &hud_model_matrix(engine));
    }

    fn hud_dragging(&self) -> bool {
        self.controllers.iter().any(|c| {
            matches!(
                &c.phase,
                crate::vr::ControllerPhase::Pressing {
                    active: VrTarget::Hud(
                        voluscope_render::HudElement::SliderKnob
                            | voluscope_render::HudElement::SliderTrack
                    ),
                    ..
                }
            )
        })
    }
}

/// The HUD panel anchors to the camera: its model matrix is the inverse
/// view transform (the fixed local offset is applied by the HUD itself).
fn hud_model_matrix(engine: &RenderEngine) -> Mat4 {
    engine.camera.view_matrix().inverse()
}
