//! Rendering backend for voluscope.
//!
//! Owns the wgpu engine, the per-layer GPU volume resources (with the
//! rebuild-vs-update reconciliation policy), clipmap textures, the
//! ray-march / slice / track-line / HUD pipelines and their WGSL shaders,
//! and the colormap texture cache.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// GPU math is clearer with explicit numeric casts
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod camera;
pub mod clipmap_render;
pub mod colormap;
pub mod engine;
pub mod error;
pub mod hud_render;
pub mod raymarch;
pub mod slice_compose;
pub mod track_line_render;
pub mod volume_resources;

pub use camera::{Camera, CameraPose};
pub use clipmap_render::ClipmapTextures;
pub use colormap::{ColormapCache, ColormapTexture};
pub use engine::{CameraUniforms, FrameContent, RenderEngine};
pub use error::{RenderError, RenderResult};
pub use hud_render::{
    build_hud_quads, fraction_from_local_x, knob_center_x, HudElement, HudRenderData,
    HudVisualState, HUD_LOCAL_OFFSET, PLAY_BUTTON_CENTER, PLAY_BUTTON_RADIUS, SLIDER_CENTER,
    SLIDER_HALF_WIDTH, SLIDER_HIT_HALF_HEIGHT, SLIDER_KNOB_RADIUS,
};
pub use raymarch::{generate_volume_box, volume_model_matrix, RayMarchUniforms};
pub use slice_compose::{compose_slice, slice_buffer_len, SliceUniforms};
pub use track_line_render::{TrackLineRenderData, TrackLineUniforms};
pub use volume_resources::{
    texture_format_for_channels, ModeData, VolumeBindings, VolumeResources,
};
