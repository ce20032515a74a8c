//! Color space conversion utilities
//!
//! This module handles the conversions the feature pipeline needs:
//! - sRGB to luma (BT.601 weights, 0-255)
//! - sRGB to HSV on the 8-bit scale used by most vision tooling
//!   (H in 0..=180, S and V in 0..=255)

/// BT.601 luma weights
const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

/// Hue, saturation, value on the 8-bit scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    /// Hue in half-degrees (0..=180)
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

/// Luma of an RGB pixel on a 0-255 scale
#[inline]
pub fn luma(rgb: [u8; 3]) -> f64 {
    LUMA_R * rgb[0] as f64 + LUMA_G * rgb[1] as f64 + LUMA_B * rgb[2] as f64
}

/// Luma rounded to the nearest histogram bin
#[inline]
pub fn luma_u8(rgb: [u8; 3]) -> u8 {
    luma(rgb).round().clamp(0.0, 255.0) as u8
}

/// Convert an RGB pixel to 8-bit HSV
///
/// # Algorithm
/// 1. V = max(R, G, B)
/// 2. S = (V - min) / V, scaled to 0-255 (0 for black)
/// 3. H from the dominant channel in degrees, halved to fit a byte
pub fn rgb_to_hsv(rgb: [u8; 3]) -> Hsv {
    let r = rgb[0] as f64;
    let g = rgb[1] as f64;
    let b = rgb[2] as f64;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    Hsv {
        h: (h / 2.0).round().clamp(0.0, 180.0) as u8,
        s: s.round().clamp(0.0, 255.0) as u8,
        v: max as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_extremes() {
        assert_eq!(luma_u8([0, 0, 0]), 0);
        assert_eq!(luma_u8([255, 255, 255]), 255);
        // Green dominates luma
        assert!(luma([0, 255, 0]) > luma([255, 0, 0]));
        assert!(luma([255, 0, 0]) > luma([0, 0, 255]));
    }

    #[test]
    fn test_primary_hues() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), Hsv { h: 0, s: 255, v: 255 });
        assert_eq!(rgb_to_hsv([0, 255, 0]), Hsv { h: 60, s: 255, v: 255 });
        assert_eq!(rgb_to_hsv([0, 0, 255]), Hsv { h: 120, s: 255, v: 255 });
    }

    #[test]
    fn test_grays_have_no_saturation() {
        for level in [0u8, 17, 128, 255] {
            let hsv = rgb_to_hsv([level, level, level]);
            assert_eq!(hsv.h, 0);
            assert_eq!(hsv.s, 0);
            assert_eq!(hsv.v, level);
        }
    }

    #[test]
    fn test_cardboard_brown_hue() {
        // Typical corrugated cardboard
        let hsv = rgb_to_hsv([181, 134, 84]);
        assert!((8..=25).contains(&hsv.h), "hue was {}", hsv.h);
        assert!(hsv.s >= 50);
    }
}
