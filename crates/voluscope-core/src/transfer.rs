//! Intensity windowing and colormap gradients.

use glam::Vec3;

use crate::error::{Result, ViewerError};

/// Colormap texture resolution (number of samples).
pub const COLORMAP_RESOLUTION: u32 = 256;

/// Linearly remaps `value` from `[window_min, window_max]` to `[0, 1]`.
///
/// Monotonically non-decreasing in `value` for any `window_min < window_max`.
#[must_use]
pub fn apply_window(value: f32, window_min: f32, window_max: f32) -> f32 {
    let range = window_max - window_min;
    if range <= 0.0 {
        return if value >= window_max { 1.0 } else { 0.0 };
    }
    ((value - window_min) / range).clamp(0.0, 1.0)
}

/// Windowing followed by optional inversion.
#[must_use]
pub fn windowed_intensity(value: f32, window_min: f32, window_max: f32, invert: bool) -> f32 {
    let w = apply_window(value, window_min, window_max);
    if invert {
        1.0 - w
    } else {
        w
    }
}

/// Parses a `#rrggbb` color into linear RGB in [0, 1].
///
/// # Errors
///
/// Returns [`ViewerError::InvalidColor`] for anything but 6 hex digits with
/// an optional leading `#`.
pub fn parse_hex_color(color: &str) -> Result<Vec3> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ViewerError::InvalidColor(color.to_string()));
    }
    let byte = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map(|b| f32::from(b) / 255.0)
    };
    let r = byte(0..2).map_err(|_| ViewerError::InvalidColor(color.to_string()))?;
    let g = byte(2..4).map_err(|_| ViewerError::InvalidColor(color.to_string()))?;
    let b = byte(4..6).map_err(|_| ViewerError::InvalidColor(color.to_string()))?;
    Ok(Vec3::new(r, g, b))
}

/// Canonical form of a hex color, used as the colormap cache key.
#[must_use]
pub fn normalize_hex(color: &str) -> String {
    let hex = color.strip_prefix('#').unwrap_or(color);
    format!("#{}", hex.to_ascii_lowercase())
}

/// Builds the 256x1 RGBA gradient for a single-channel layer color: a ramp
/// from black to `color`, alpha rising with intensity.
#[must_use]
pub fn colormap_gradient(color: Vec3) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(COLORMAP_RESOLUTION as usize * 4);
    for i in 0..COLORMAP_RESOLUTION {
        let t = i as f32 / (COLORMAP_RESOLUTION - 1) as f32;
        pixels.push((color.x * t * 255.0) as u8);
        pixels.push((color.y * t * 255.0) as u8);
        pixels.push((color.z * t * 255.0) as u8);
        pixels.push((t * 255.0) as u8);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_window_endpoints() {
        assert_eq!(apply_window(0.2, 0.2, 0.8), 0.0);
        assert_eq!(apply_window(0.8, 0.2, 0.8), 1.0);
        assert!((apply_window(0.5, 0.2, 0.8) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_window_is_step() {
        assert_eq!(apply_window(0.49, 0.5, 0.5), 0.0);
        assert_eq!(apply_window(0.5, 0.5, 0.5), 1.0);
    }

    #[test]
    fn test_invert_flips() {
        let w = windowed_intensity(0.6, 0.0, 1.0, false);
        let wi = windowed_intensity(0.6, 0.0, 1.0, true);
        assert!((w + wi - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(parse_hex_color("#ff0000").unwrap(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("00ff00").unwrap(), Vec3::new(0.0, 1.0, 0.0));
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
    }

    #[test]
    fn test_normalize_hex() {
        assert_eq!(normalize_hex("FF00aa"), "#ff00aa");
        assert_eq!(normalize_hex("#FF00AA"), "#ff00aa");
    }

    #[test]
    fn test_gradient_shape() {
        let g = colormap_gradient(Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(g.len(), 256 * 4);
        // Starts black/transparent, ends at full color/opaque
        assert_eq!(&g[0..4], &[0, 0, 0, 0]);
        assert_eq!(g[255 * 4], 255);
        assert_eq!(g[255 * 4 + 3], 255);
    }

    proptest! {
        #[test]
        fn prop_window_in_unit_range(
            value in 0.0f32..1.0,
            min in 0.0f32..0.99,
            span in 0.01f32..1.0,
        ) {
            let max = (min + span).min(1.0);
            let w = apply_window(value, min, max);
            prop_assert!((0.0..=1.0).contains(&w));
        }

        #[test]
        fn prop_window_monotonic(
            a in 0.0f32..1.0,
            b in 0.0f32..1.0,
            min in 0.0f32..0.99,
            span in 0.01f32..1.0,
        ) {
            let max = (min + span).min(1.0);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(apply_window(lo, min, max) <= apply_window(hi, min, max));
            // Inverted windowing is non-increasing
            prop_assert!(
                windowed_intensity(lo, min, max, true) >= windowed_intensity(hi, min, max, true)
            );
        }
    }
}
