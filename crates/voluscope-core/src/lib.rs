//! Core abstractions for voluscope.
//!
//! This crate provides the GPU-independent half of the viewer:
//! - [`NormalizedVolume`] and the streaming contract for out-of-core data
//! - [`ViewerLayer`] / [`TrackDefinition`] inputs supplied by the host
//! - Windowing, colormap gradients, and the CPU reference ray marcher
//! - Clipmap level math and staging-buffer population
//! - Hover/selection/follow interaction state

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Layer/settings structs legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Voxel indexing math is clearer with explicit numeric casts
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod clipmap;
pub mod error;
pub mod histogram;
pub mod interaction;
pub mod layer;
pub mod options;
pub mod raycast;
pub mod track;
pub mod transfer;
pub mod volume;

pub use clipmap::{aligned_origin, level_count_for, ClipLevel, ClipmapState, CLIP_SIZE, MAX_CLIP_LEVELS};
pub use error::{Result, ViewerError};
pub use histogram::{channel_histograms, HistogramCache, VolumeFingerprint, HISTOGRAM_BINS};
pub use interaction::{HoverSource, HoveredVoxel, InteractionState, TrackHover};
pub use layer::{LayerMode, RenderStyle, SamplingMode, ViewerLayer};
pub use options::ViewerOptions;
pub use raycast::{
    intersect_volume, march_iso, march_mip, IsoSample, MarchSettings, MipSample, Ray,
    MAX_RAY_STEPS,
};
pub use track::{
    derive_visual_state, highlight_color, palette_color, TrackChannelSettings, TrackColorMode,
    TrackDefinition, TrackPoint, TrackStateInput, TrackVisualState,
};
pub use transfer::{
    apply_window, colormap_gradient, normalize_hex, parse_hex_color, windowed_intensity,
    COLORMAP_RESOLUTION,
};
pub use volume::{channel_luminance, CancelToken, NormalizedVolume, VolumeDataType, VolumeStream};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec3, Vec2, Vec3, Vec4};
