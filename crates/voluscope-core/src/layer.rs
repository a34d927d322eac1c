//! Renderable layer descriptions supplied by the embedding application.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::volume::NormalizedVolume;

/// Volume compositing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderStyle {
    /// Maximum intensity projection.
    #[default]
    Mip = 0,
    /// Iso-surface with single-bounce lighting.
    Iso = 1,
}

/// Texture sampling / ray stepping mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplingMode {
    /// Trilinear sampling with distance-proportional stepping.
    #[default]
    Linear,
    /// Nearest sampling with whole-voxel stepping.
    Nearest,
}

/// Whether a layer renders as a ray-marched volume or a 2D slice plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayerMode {
    #[default]
    ThreeD,
    Slice,
}

/// One renderable surface.
///
/// The embedding application replaces the full layer list whenever dataset
/// selection or per-layer controls change; the viewer reconciles its owned
/// GPU resources against the list by `key`.
#[derive(Clone, Serialize, Deserialize)]
pub struct ViewerLayer {
    /// Unique, stable identity used for resource reconciliation.
    pub key: String,
    #[serde(skip)]
    pub volume: Option<Arc<NormalizedVolume>>,
    pub visible: bool,
    pub window_min: f32,
    pub window_max: f32,
    /// Display color as `#rrggbb`.
    pub color: String,
    pub offset_x: f32,
    pub offset_y: f32,
    pub render_style: RenderStyle,
    pub invert: bool,
    pub sampling_mode: SamplingMode,
    /// Segmentation layers highlight by exact label match instead of
    /// spatial radius.
    pub is_segmentation: bool,
    pub mode: LayerMode,
    pub slice_index: u32,
}

impl ViewerLayer {
    /// Creates a visible 3D MIP layer with a full window.
    #[must_use]
    pub fn new(key: impl Into<String>, volume: Arc<NormalizedVolume>) -> Self {
        Self {
            key: key.into(),
            volume: Some(volume),
            visible: true,
            window_min: 0.0,
            window_max: 1.0,
            color: "#ffffff".to_string(),
            offset_x: 0.0,
            offset_y: 0.0,
            render_style: RenderStyle::Mip,
            invert: false,
            sampling_mode: SamplingMode::Linear,
            is_segmentation: false,
            mode: LayerMode::ThreeD,
            slice_index: 0,
        }
    }

    /// Whether the layer currently has data to draw.
    #[must_use]
    pub fn has_volume(&self) -> bool {
        self.volume.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::VolumeDataType;

    #[test]
    fn test_layer_defaults() {
        let volume = Arc::new(
            NormalizedVolume::new(1, 1, 1, 1, vec![0], 0.0, 1.0, VolumeDataType::Uint8).unwrap(),
        );
        let layer = ViewerLayer::new("ch0", volume);
        assert!(layer.visible);
        assert_eq!(layer.render_style, RenderStyle::Mip);
        assert_eq!(layer.mode, LayerMode::ThreeD);
        assert_eq!(layer.window_max, 1.0);
    }
}
