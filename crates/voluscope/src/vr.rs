//! Immersive session lifecycle, controller state machines, and the HUD
//! controller.
//!
//! Session negotiation with the device is an external collaborator; this
//! module owns the explicit state machine around it so that cancellation
//! (a request followed by an immediate end) is a first-class transition
//! rather than a race. Controllers are modeled as per-device state machines
//! fed by connect/disconnect and select press/release events instead of
//! closures capturing mutable state.

use glam::{Mat4, Vec2, Vec3};

use voluscope_core::error::{Result, ViewerError};
use voluscope_render::hud_render::{
    fraction_from_local_x, knob_center_x, HudElement, HudVisualState, PLAY_BUTTON_CENTER,
    PLAY_BUTTON_RADIUS, SLIDER_CENTER, SLIDER_HALF_WIDTH, SLIDER_HIT_HALF_HEIGHT,
    SLIDER_KNOB_RADIUS,
};
use voluscope_render::{Camera, CameraPose};

/// Immersive session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VrSessionState {
    #[default]
    Inactive,
    /// A session request is in flight with the device layer.
    Requesting,
    Presenting,
}

/// Explicit immersive-session state machine.
///
/// On `Presenting` entry the camera pose is snapshotted; on any exit it is
/// restored exactly, so device-initiated session loss never leaves the
/// desktop viewer in an inconsistent state.
#[derive(Debug, Default)]
pub struct VrSession {
    state: VrSessionState,
    saved_pose: Option<CameraPose>,
}

impl VrSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> VrSessionState {
        self.state
    }

    #[must_use]
    pub fn is_presenting(&self) -> bool {
        self.state == VrSessionState::Presenting
    }

    /// Starts a session request.
    ///
    /// # Errors
    ///
    /// [`ViewerError::VrUnsupported`] when the device layer reports no
    /// immersive capability (the desktop viewer stays fully usable), and
    /// [`ViewerError::VrSessionBusy`] when a request or session is already
    /// active.
    pub fn request(&mut self, supported: bool) -> Result<()> {
        match self.state {
            VrSessionState::Inactive => {
                if !supported {
                    return Err(ViewerError::VrUnsupported(
                        "no immersive capability on this device".to_string(),
                    ));
                }
                self.state = VrSessionState::Requesting;
                log::info!("immersive session requested");
                Ok(())
            }
            VrSessionState::Requesting => Err(ViewerError::VrSessionBusy("requesting")),
            VrSessionState::Presenting => Err(ViewerError::VrSessionBusy("presenting")),
        }
    }

    /// The device granted the session: snapshot the camera pose and enter
    /// `Presenting`. Ignored unless a request is in flight.
    pub fn begin_presenting(&mut self, camera: &Camera) -> bool {
        if self.state != VrSessionState::Requesting {
            return false;
        }
        self.saved_pose = Some(camera.snapshot());
        self.state = VrSessionState::Presenting;
        log::info!("immersive session presenting");
        true
    }

    /// Ends the session (user action, device-initiated end, or an abort of
    /// an in-flight request) and restores the snapshotted pose exactly.
    /// Returns whether a presenting session actually ended.
    pub fn end(&mut self, camera: &mut Camera) -> bool {
        let was_presenting = self.state == VrSessionState::Presenting;
        if let Some(pose) = self.saved_pose.take() {
            camera.restore(&pose);
        }
        if self.state != VrSessionState::Inactive {
            log::info!("immersive session ended (was presenting: {was_presenting})");
        }
        self.state = VrSessionState::Inactive;
        was_presenting
    }
}

/// What a controller ray currently points at. HUD interactables win over
/// track lines, so a HUD target suppresses track hover for that controller.
#[derive(Debug, Clone, PartialEq)]
pub enum VrTarget {
    Hud(HudElement),
    Track(String),
}

/// Per-controller interaction phases.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ControllerPhase {
    #[default]
    Disconnected,
    Idle,
    Hovering(VrTarget),
    /// Select is held; `active` is what was hovered at press time and
    /// `hovering` tracks the current target until release.
    Pressing {
        active: VrTarget,
        hovering: Option<VrTarget>,
    },
}

/// Action committed by a select release.
#[derive(Debug, Clone, PartialEq)]
pub enum VrAction {
    TogglePlayback,
    /// Commit the slider drag at its current fraction.
    CommitScrub,
    FollowTrack(String),
}

/// Explicit state machine for one VR controller.
#[derive(Debug, Default)]
pub struct VrController {
    pub phase: ControllerPhase,
    /// Ray/controller mesh visibility: connected and not hand-tracked.
    pub visible: bool,
    hand_tracked: bool,
}

impl VrController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, hand_tracked: bool) {
        self.hand_tracked = hand_tracked;
        self.visible = !hand_tracked;
        if self.phase == ControllerPhase::Disconnected {
            self.phase = ControllerPhase::Idle;
        }
    }

    pub fn disconnect(&mut self) {
        self.phase = ControllerPhase::Disconnected;
        self.visible = false;
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.phase != ControllerPhase::Disconnected
    }

    /// Feeds the controller's current ray target (None = pointing at
    /// nothing). While pressing, only the hover side updates; the captured
    /// active target is kept for the release match.
    pub fn update_target(&mut self, target: Option<VrTarget>) {
        match &mut self.phase {
            ControllerPhase::Disconnected => {}
            ControllerPhase::Pressing { hovering, .. } => *hovering = target,
            phase => {
                *phase = match target {
                    Some(t) => ControllerPhase::Hovering(t),
                    None => ControllerPhase::Idle,
                };
            }
        }
    }

    /// Current hover target, if any.
    #[must_use]
    pub fn hover_target(&self) -> Option<&VrTarget> {
        match &self.phase {
            ControllerPhase::Hovering(t) => Some(t),
            ControllerPhase::Pressing { hovering, .. } => hovering.as_ref(),
            _ => None,
        }
    }

    /// Select press: captures the hovered target as active.
    pub fn select_start(&mut self) {
        if let ControllerPhase::Hovering(target) = &self.phase {
            self.phase = ControllerPhase::Pressing {
                active: target.clone(),
                hovering: Some(target.clone()),
            };
        }
    }

    /// Select release: commits the action. HUD elements fire only when the
    /// released target matches the one captured at press (a drag that ends
    /// on a different element fires nothing); track follow uses simple tap
    /// semantics and fires on whatever track is hovered at release.
    pub fn select_end(&mut self) -> Option<VrAction> {
        let (active, hovering) = match std::mem::take(&mut self.phase) {
            ControllerPhase::Pressing { active, hovering } => (active, hovering),
            other => {
                // Spurious release (no press captured a target): no-op
                self.phase = other;
                return None;
            }
        };

        let action = match (&active, &hovering) {
            (VrTarget::Hud(pressed), Some(VrTarget::Hud(released))) if pressed == released => {
                match pressed {
                    HudElement::PlayButton => Some(VrAction::TogglePlayback),
                    HudElement::SliderKnob | HudElement::SliderTrack => {
                        Some(VrAction::CommitScrub)
                    }
                }
            }
            (_, Some(VrTarget::Track(id))) => Some(VrAction::FollowTrack(id.clone())),
            _ => None,
        };

        self.phase = match hovering {
            Some(t) => ControllerPhase::Hovering(t),
            None => ControllerPhase::Idle,
        };
        action
    }
}

/// A HUD interactable hit by a controller ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HudHit {
    pub element: HudElement,
    /// Distance along the ray.
    pub t: f32,
    /// Hit position in panel-local units.
    pub local: Vec2,
}

/// Playback HUD state: play/pause, scrub slider, label.
#[derive(Debug, Default)]
pub struct HudController {
    pub visual: HudVisualState,
    /// In-flight slider drag fraction (committed on release).
    drag_fraction: Option<f32>,
    label: String,
}

impl HudController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tests a world-space ray against the HUD interactables: play button,
    /// then the knob, then the widened invisible hit area around the
    /// slider track. The elements are coplanar, so this priority order
    /// stands in for closest-hit.
    #[must_use]
    pub fn hit_test(&self, ray_origin: Vec3, ray_dir: Vec3, hud_model: &Mat4) -> Option<HudHit> {
        let inv = hud_model.inverse();
        let o = inv.transform_point3(ray_origin);
        let d = inv.transform_vector3(ray_dir);
        if d.z.abs() < 1e-8 {
            return None;
        }
        let t = -o.z / d.z;
        if t < 0.0 {
            return None;
        }
        let local = Vec2::new(o.x + d.x * t, o.y + d.y * t);

        let play_center = Vec2::from(PLAY_BUTTON_CENTER);
        if local.distance(play_center) <= PLAY_BUTTON_RADIUS {
            return Some(HudHit {
                element: HudElement::PlayButton,
                t,
                local,
            });
        }

        let knob_center = Vec2::new(knob_center_x(self.current_fraction()), SLIDER_CENTER[1]);
        if local.distance(knob_center) <= SLIDER_KNOB_RADIUS * 1.5 {
            return Some(HudHit {
                element: HudElement::SliderKnob,
                t,
                local,
            });
        }

        // Invisible widened hit area around the track
        if (local.x - SLIDER_CENTER[0]).abs() <= SLIDER_HALF_WIDTH
            && (local.y - SLIDER_CENTER[1]).abs() <= SLIDER_HIT_HALF_HEIGHT
        {
            return Some(HudHit {
                element: HudElement::SliderTrack,
                t,
                local,
            });
        }

        None
    }

    /// Slider fraction currently displayed (drag preview wins over the
    /// committed value).
    #[must_use]
    pub fn current_fraction(&self) -> f32 {
        self.drag_fraction.unwrap_or(self.visual.fraction)
    }

    /// Sets the committed slider fraction (e.g. from the running playback
    /// timepoint).
    pub fn set_slider_fraction(&mut self, fraction: f32) {
        self.visual.fraction = fraction.clamp(0.0, 1.0);
    }

    /// Starts or continues a slider drag at a panel-local X position.
    pub fn drag_to(&mut self, local_x: f32) {
        let fraction = fraction_from_local_x(local_x);
        self.drag_fraction = Some(fraction);
        self.visual.fraction = fraction;
    }

    /// Commits the drag and returns the final fraction.
    pub fn commit_drag(&mut self) -> f32 {
        let fraction = self.current_fraction();
        self.drag_fraction = None;
        self.visual.fraction = fraction;
        fraction
    }

    /// Abandons an in-flight drag (e.g. session ended mid-drag).
    pub fn cancel_drag(&mut self) {
        self.drag_fraction = None;
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.visual.playing = playing;
    }

    pub fn set_hovered(&mut self, hovered: Option<HudElement>) {
        self.visual.hovered = hovered;
    }

    pub fn set_pressed(&mut self, pressed: Option<HudElement>) {
        self.visual.pressed = pressed;
    }

    /// Quantizes a slider fraction to the nearest integer timepoint.
    #[must_use]
    pub fn quantize(fraction: f32, max_timepoint: u32) -> u32 {
        (fraction.clamp(0.0, 1.0) * max_timepoint as f32).round() as u32
    }

    /// Playback label text; callers upload it only when it changed.
    #[must_use]
    pub fn label_text(timepoint: u32, max_timepoint: u32) -> String {
        format!("t={timepoint}/{max_timepoint}")
    }

    /// Updates and returns whether the label string actually changed.
    pub fn refresh_label(&mut self, timepoint: u32, max_timepoint: u32) -> Option<&str> {
        let text = Self::label_text(timepoint, max_timepoint);
        if text == self.label {
            return None;
        }
        self.label = text;
        Some(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_at(position: Vec3) -> Camera {
        let mut camera = Camera::new(1.0);
        camera.position = position;
        camera
    }

    #[test]
    fn test_session_restores_pose_exactly() {
        let mut session = VrSession::new();
        let mut camera = camera_at(Vec3::new(1.0, 2.0, 3.0));
        let pose = camera.snapshot();

        session.request(true).unwrap();
        assert!(session.begin_presenting(&camera));
        assert!(session.is_presenting());

        // Head tracking moves the camera arbitrarily during the session
        camera.position = Vec3::new(9.0, -4.0, 0.5);
        camera.target = Vec3::new(1.0, 1.0, 1.0);

        assert!(session.end(&mut camera));
        assert_eq!(camera.position, pose.position);
        assert_eq!(camera.target, pose.target);
        assert_eq!(camera.up, pose.up);
        assert_eq!(session.state(), VrSessionState::Inactive);
    }

    #[test]
    fn test_unsupported_request_rejected() {
        let mut session = VrSession::new();
        assert!(matches!(
            session.request(false),
            Err(ViewerError::VrUnsupported(_))
        ));
        assert_eq!(session.state(), VrSessionState::Inactive);
    }

    #[test]
    fn test_abort_inflight_request_is_clean() {
        let mut session = VrSession::new();
        let mut camera = camera_at(Vec3::ONE);
        let before = camera.snapshot();

        session.request(true).unwrap();
        // Request + immediate end, before the device ever granted it
        assert!(!session.end(&mut camera));
        assert_eq!(session.state(), VrSessionState::Inactive);
        assert_eq!(camera.position, before.position);

        // A new request is allowed afterwards
        assert!(session.request(true).is_ok());
    }

    #[test]
    fn test_double_request_rejected() {
        let mut session = VrSession::new();
        session.request(true).unwrap();
        assert!(matches!(
            session.request(true),
            Err(ViewerError::VrSessionBusy("requesting"))
        ));
    }

    #[test]
    fn test_controller_visibility_follows_hand_tracking() {
        let mut controller = VrController::new();
        controller.connect(false);
        assert!(controller.visible);
        controller.disconnect();
        assert!(!controller.visible);
        controller.connect(true);
        assert!(!controller.visible, "hand-tracked controllers hide the ray");
    }

    #[test]
    fn test_press_release_same_hud_element_commits() {
        let mut controller = VrController::new();
        controller.connect(false);
        controller.update_target(Some(VrTarget::Hud(HudElement::PlayButton)));
        controller.select_start();
        let action = controller.select_end();
        assert_eq!(action, Some(VrAction::TogglePlayback));
    }

    #[test]
    fn test_press_release_different_hud_element_fires_nothing() {
        let mut controller = VrController::new();
        controller.connect(false);
        controller.update_target(Some(VrTarget::Hud(HudElement::PlayButton)));
        controller.select_start();
        // Drag off the button onto the slider before releasing
        controller.update_target(Some(VrTarget::Hud(HudElement::SliderTrack)));
        assert_eq!(controller.select_end(), None);
    }

    #[test]
    fn test_track_follow_fires_on_hover_at_release() {
        let mut controller = VrController::new();
        controller.connect(false);
        controller.update_target(Some(VrTarget::Track("a".into())));
        controller.select_start();
        // Tap semantics: release over a different track follows that one
        controller.update_target(Some(VrTarget::Track("b".into())));
        assert_eq!(
            controller.select_end(),
            Some(VrAction::FollowTrack("b".into()))
        );
    }

    #[test]
    fn test_release_over_nothing_fires_nothing() {
        let mut controller = VrController::new();
        controller.connect(false);
        controller.update_target(Some(VrTarget::Track("a".into())));
        controller.select_start();
        controller.update_target(None);
        assert_eq!(controller.select_end(), None);
        assert_eq!(controller.phase, ControllerPhase::Idle);
    }

    #[test]
    fn test_hud_hit_play_button_and_slider() {
        let hud = HudController::new();
        let model = Mat4::IDENTITY;

        // Straight-on ray at the play button center
        let origin = Vec3::new(PLAY_BUTTON_CENTER[0], PLAY_BUTTON_CENTER[1], 1.0);
        let hit = hud.hit_test(origin, Vec3::NEG_Z, &model).unwrap();
        assert_eq!(hit.element, HudElement::PlayButton);

        // The widened hit area catches rays above the slider track
        let origin = Vec3::new(
            SLIDER_CENTER[0] + SLIDER_HALF_WIDTH * 0.9,
            SLIDER_CENTER[1] + SLIDER_HIT_HALF_HEIGHT * 0.8,
            1.0,
        );
        let hit = hud.hit_test(origin, Vec3::NEG_Z, &model).unwrap();
        assert_eq!(hit.element, HudElement::SliderTrack);

        // Far corner hits nothing
        let origin = Vec3::new(10.0, 10.0, 1.0);
        assert!(hud.hit_test(origin, Vec3::NEG_Z, &model).is_none());
    }

    #[test]
    fn test_hud_hit_behind_panel_rejected() {
        let hud = HudController::new();
        let origin = Vec3::new(PLAY_BUTTON_CENTER[0], PLAY_BUTTON_CENTER[1], -1.0);
        // Ray pointing away from the plane
        assert!(hud.hit_test(origin, Vec3::NEG_Z, &Mat4::IDENTITY).is_none());
    }

    #[test]
    fn test_slider_drag_round_trip() {
        let mut hud = HudController::new();
        for fraction in [0.0, 0.3, 0.5, 1.0] {
            hud.drag_to(knob_center_x(fraction));
            let committed = hud.commit_drag();
            assert!((committed - fraction).abs() < 1e-6);
            assert!((hud.current_fraction() - fraction).abs() < 1e-6);
        }
    }

    #[test]
    fn test_quantize_to_timepoint() {
        assert_eq!(HudController::quantize(0.0, 100), 0);
        assert_eq!(HudController::quantize(1.0, 100), 100);
        assert_eq!(HudController::quantize(0.504, 100), 50);
        assert_eq!(HudController::quantize(0.505, 100), 51);
        assert_eq!(HudController::quantize(0.5, 0), 0);
    }

    #[test]
    fn test_label_changes_only_when_text_changes() {
        let mut hud = HudController::new();
        assert_eq!(hud.refresh_label(3, 10), Some("t=3/10"));
        assert_eq!(hud.refresh_label(3, 10), None);
        assert_eq!(hud.refresh_label(4, 10), Some("t=4/10"));
    }
}
