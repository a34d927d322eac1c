//! voluscope: an interactive viewer engine for multi-channel, time-resolved
//! 3D microscopy volumes and particle tracks.
//!
//! The viewer renders volumetric data by GPU ray marching (MIP and
//! iso-surface modes with windowing, inversion, and per-layer colormaps),
//! renders 2D orthogonal slices, overlays time-windowed trajectory lines,
//! and supports desktop-mouse, keyboard, and VR-controller interaction:
//! voxel and track hover-picking, trajectory following, and an in-scene VR
//! HUD for playback control.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use voluscope::*;
//!
//! fn main() -> Result<()> {
//!     let volume = Arc::new(NormalizedVolume::new(
//!         64, 64, 32, 1,
//!         vec![0u8; 64 * 64 * 32],
//!         0.0, 1.0,
//!         VolumeDataType::Uint8,
//!     )?);
//!
//!     let mut runtime = ViewerRuntime::new();
//!     runtime.set_layers(vec![ViewerLayer::new("dapi", volume)]);
//!
//!     // Blocks until the window closes
//!     show(runtime);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! All state lives in an explicitly owned [`ViewerRuntime`] passed by
//! reference to each subsystem; there is no global state. The embedding
//! application replaces the layer and track lists on every relevant change
//! and the runtime reconciles its GPU resources against them by key.

mod app;
mod runtime;
mod tracks;
pub mod vr;

pub use app::input::{InputState, PointerMode, DRAG_THRESHOLD};
pub use app::picking::{
    hover_voxel_for_layer, pick_track_at_ray, ray_segment_distance, screen_ray, world_to_screen,
    TrackHit, TRACK_PICK_THRESHOLD,
};
pub use runtime::{ViewerCallbacks, ViewerRuntime};
pub use vr::{
    ControllerPhase, HudController, HudHit, VrAction, VrController, VrSession, VrSessionState,
    VrTarget,
};

// Re-export core types
pub use voluscope_core::{
    error::{Result, ViewerError},
    interaction::{HoverSource, HoveredVoxel, InteractionState, TrackHover},
    layer::{LayerMode, RenderStyle, SamplingMode, ViewerLayer},
    options::ViewerOptions,
    track::{TrackChannelSettings, TrackColorMode, TrackDefinition, TrackPoint},
    volume::{CancelToken, NormalizedVolume, VolumeDataType, VolumeStream},
    Mat4, UVec3, Vec2, Vec3, Vec4,
};

// Re-export render types
pub use voluscope_render::{
    Camera, CameraPose, HudElement, HudRenderData, RenderEngine, RenderError, RenderResult,
};

/// Runs the viewer window until it closes.
///
/// This function blocks. Logging is initialized here so embedding
/// applications that configure their own logger are left alone.
pub fn show(runtime: ViewerRuntime) {
    let _ = env_logger::try_init();
    app::run_app(runtime);
}
