//! Ground-region waste detector
//!
//! Looks at the bottom of the frame, where accumulated waste shows up in
//! a container photograph, and measures how much of it looks like waste:
//! light paper/plastic, vivid packaging, cardboard, or black bags.
//! Vegetation, soil and pavement are carved out before a morphological
//! opening drops speckle noise.

use image::{GrayImage, Luma, RgbImage};

use super::extract::round_to;
use super::morphology;
use crate::color::{self, Hsv};

/// Default share of the frame height analysed, counted from the bottom
pub const DEFAULT_GROUND_SLICE: f64 = 0.45;

/// Inclusive HSV box on the 8-bit scale (H 0..=180)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvBand {
    pub hue: (u8, u8),
    pub saturation: (u8, u8),
    pub value: (u8, u8),
}

impl HsvBand {
    pub const fn new(hue: (u8, u8), saturation: (u8, u8), value: (u8, u8)) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }

    #[inline]
    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.hue.0..=self.hue.1).contains(&hsv.h)
            && (self.saturation.0..=self.saturation.1).contains(&hsv.s)
            && (self.value.0..=self.value.1).contains(&hsv.v)
    }
}

// ========== Waste bands ==========

/// Near-white or light gray: paper, bags, polystyrene
pub const LIGHT: HsvBand = HsvBand::new((0, 180), (0, 40), (180, 255));

/// Strongly saturated and reasonably bright: colored plastics
pub const VIVID: HsvBand = HsvBand::new((0, 180), (80, 255), (100, 255));

/// Orange-brown hues: cardboard
pub const CARDBOARD: HsvBand = HsvBand::new((8, 25), (50, 255), (50, 200));

/// Very dark: black bin bags, glossy film
pub const NEAR_BLACK: HsvBand = HsvBand::new((0, 180), (0, 255), (0, 50));

pub const WASTE_BANDS: [HsvBand; 4] = [LIGHT, VIVID, CARDBOARD, NEAR_BLACK];

/// Grass, soil and pavement; removed from the waste mask
pub const NATURAL_GROUND: HsvBand = HsvBand::new((25, 95), (0, 60), (90, 220));

/// Absorbs the representation error of `1.0 - slice` before flooring
const SLICE_EPSILON: f64 = 1e-9;

/// First row of the ground slice: `floor(height * (1 - slice))`.
/// Always leaves at least one row.
fn slice_start(height: u32, slice: f64) -> u32 {
    let start = (height as f64 * (1.0 - slice.clamp(0.0, 1.0)) + SLICE_EPSILON).floor() as u32;
    start.min(height.saturating_sub(1))
}

/// Classify a single pixel
pub fn is_waste_pixel(rgb: [u8; 3]) -> bool {
    let hsv = color::rgb_to_hsv(rgb);
    WASTE_BANDS.iter().any(|band| band.contains(hsv)) && !NATURAL_GROUND.contains(hsv)
}

/// Waste mask of the ground slice before opening (0 or 255 per pixel)
pub fn raw_waste_mask(raster: &RgbImage, slice: f64) -> GrayImage {
    let (width, height) = raster.dimensions();
    if width == 0 || height == 0 {
        return GrayImage::new(0, 0);
    }

    let start = slice_start(height, slice);
    GrayImage::from_fn(width, height - start, |x, y| {
        let rgb = raster.get_pixel(x, y + start).0;
        Luma([if is_waste_pixel(rgb) { 255 } else { 0 }])
    })
}

/// Fraction of waste-like pixels in the ground slice, in [0, 1], 4 decimals
pub fn ground_ratio(raster: &RgbImage, slice: f64) -> f64 {
    let mask = raw_waste_mask(raster, slice);
    let total = mask.width() as u64 * mask.height() as u64;
    if total == 0 {
        return 0.0;
    }

    let opened = morphology::open(&mask);
    let waste = opened.pixels().filter(|p| p[0] == 255).count() as u64;

    round_to((waste as f64 / total as f64).clamp(0.0, 1.0), 4)
}
