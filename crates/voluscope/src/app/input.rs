//! Desktop pointer and keyboard interaction.
//!
//! Pointer state machine: `idle -> (ctrl+press) dollying -> idle`,
//! `idle -> (shift+press) panning -> idle`, plain press-drag orbits, and a
//! press-release with negligible drag is a click that follows the hit
//! track. While dollying or panning the orbit controls are disabled and
//! the previous enabled state is restored on release.

use std::collections::HashSet;

use glam::Vec2;
use winit::keyboard::KeyCode;

use voluscope_render::RenderEngine;

use crate::runtime::ViewerRuntime;

/// Pixels of accumulated motion separating a click from a drag.
pub const DRAG_THRESHOLD: f32 = 5.0;

/// Pointer interaction modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerMode {
    #[default]
    Idle,
    Orbiting,
    Dollying,
    Panning,
}

/// Desktop interaction state.
#[derive(Debug, Default)]
pub struct InputState {
    pub mode: PointerMode,
    pub pointer: Vec2,
    pub ctrl_down: bool,
    pub shift_down: bool,
    pub keys_down: HashSet<KeyCode>,
    drag_distance: f32,
    /// Orbit-enabled flag stashed when a dolly/pan begins, restored on
    /// release.
    prev_controls_enabled: bool,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary button pressed.
    pub fn on_pointer_down(&mut self, runtime: &mut ViewerRuntime, pointer: Vec2) {
        self.pointer = pointer;
        self.drag_distance = 0.0;
        if self.mode != PointerMode::Idle {
            return;
        }
        if self.ctrl_down {
            self.mode = PointerMode::Dollying;
            self.prev_controls_enabled = runtime.controls_enabled;
            runtime.controls_enabled = false;
        } else if self.shift_down {
            self.mode = PointerMode::Panning;
            self.prev_controls_enabled = runtime.controls_enabled;
            runtime.controls_enabled = false;
        } else {
            self.mode = PointerMode::Orbiting;
        }
    }

    /// Pointer moved; drives the camera according to the current mode and
    /// updates hover when idle.
    pub fn on_pointer_move(
        &mut self,
        runtime: &mut ViewerRuntime,
        engine: &mut RenderEngine,
        pointer: Vec2,
    ) {
        let delta = pointer - self.pointer;
        self.pointer = pointer;

        match self.mode {
            PointerMode::Idle => {
                runtime.pointer_hover(engine, Some(pointer));
                return;
            }
            PointerMode::Orbiting => {
                if runtime.controls_enabled {
                    engine.camera.orbit(delta.x * 0.01, delta.y * 0.01);
                }
            }
            PointerMode::Dollying => {
                // Move along the view direction, scaled by the distance to
                // the orbit target so the feel is zoom-invariant
                let scale = engine.camera.distance_to_target() * 0.005;
                engine.camera.dolly(-delta.y * scale);
            }
            PointerMode::Panning => {
                let scale = engine.camera.distance_to_target() * 0.002;
                engine.camera.pan(-delta.x * scale, delta.y * scale);
            }
        }
        self.drag_distance += delta.x.abs() + delta.y.abs();
        runtime.set_interaction_lod(engine, true);
    }

    /// Primary button released: a negligible-drag release is a click that
    /// requests follow on the hit track.
    pub fn on_pointer_up(&mut self, runtime: &mut ViewerRuntime, engine: &RenderEngine) {
        let was = self.mode;
        self.mode = PointerMode::Idle;
        runtime.set_interaction_lod(engine, false);

        match was {
            PointerMode::Dollying | PointerMode::Panning => {
                runtime.controls_enabled = self.prev_controls_enabled;
            }
            PointerMode::Orbiting => {
                if self.drag_distance < DRAG_THRESHOLD {
                    runtime.click_follow(engine, self.pointer);
                }
            }
            PointerMode::Idle => {}
        }
        self.drag_distance = 0.0;
    }

    /// Pointer left the surface: clear hover and abandon any drag.
    pub fn on_pointer_leave(&mut self, runtime: &mut ViewerRuntime, engine: &RenderEngine) {
        if matches!(self.mode, PointerMode::Dollying | PointerMode::Panning) {
            runtime.controls_enabled = self.prev_controls_enabled;
        }
        self.mode = PointerMode::Idle;
        runtime.set_interaction_lod(engine, false);
        runtime.clear_pointer_hover();
    }

    /// Scroll wheel dolly, scaled by the distance to the target.
    pub fn on_scroll(&mut self, runtime: &ViewerRuntime, engine: &mut RenderEngine, delta: f32) {
        if runtime.controls_enabled {
            let scale = engine.camera.distance_to_target() * 0.1;
            engine.camera.dolly(delta * scale);
        }
    }

    /// Per-frame WASD + vertical free-fly. Active only on desktop while no
    /// track is followed; movement scales with the distance to the orbit
    /// target and moves both the camera and the target.
    pub fn fly_tick(&mut self, runtime: &ViewerRuntime, engine: &mut RenderEngine, dt: f32) {
        if runtime.vr.is_presenting()
            || runtime.interaction.followed_track_id().is_some()
            || self.keys_down.is_empty()
        {
            return;
        }

        let mut delta = glam::Vec3::ZERO;
        if self.keys_down.contains(&KeyCode::KeyA) {
            delta.x -= 1.0;
        }
        if self.keys_down.contains(&KeyCode::KeyD) {
            delta.x += 1.0;
        }
        if self.keys_down.contains(&KeyCode::KeyW) {
            delta.z += 1.0;
        }
        if self.keys_down.contains(&KeyCode::KeyS) {
            delta.z -= 1.0;
        }
        if self.keys_down.contains(&KeyCode::KeyQ) {
            delta.y += 1.0;
        }
        if self.keys_down.contains(&KeyCode::KeyE) {
            delta.y -= 1.0;
        }
        if delta.length_squared() == 0.0 {
            return;
        }

        let speed = engine.camera.distance_to_target().max(1.0) * dt;
        engine.camera.fly(delta.normalize() * speed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctrl_press_enters_dollying_and_disables_controls() {
        let mut input = InputState::new();
        let mut runtime = ViewerRuntime::new();
        input.ctrl_down = true;
        input.on_pointer_down(&mut runtime, Vec2::ZERO);
        assert_eq!(input.mode, PointerMode::Dollying);
        assert!(!runtime.controls_enabled);
    }

    #[test]
    fn test_shift_press_enters_panning() {
        let mut input = InputState::new();
        let mut runtime = ViewerRuntime::new();
        input.shift_down = true;
        input.on_pointer_down(&mut runtime, Vec2::ZERO);
        assert_eq!(input.mode, PointerMode::Panning);
        assert!(!runtime.controls_enabled);
    }

    #[test]
    fn test_plain_press_orbits_and_keeps_controls() {
        let mut input = InputState::new();
        let mut runtime = ViewerRuntime::new();
        input.on_pointer_down(&mut runtime, Vec2::ZERO);
        assert_eq!(input.mode, PointerMode::Orbiting);
        assert!(runtime.controls_enabled);
    }
}
