//! Photometric feature extraction
//!
//! Downscales the raster (never upscales) and measures channel means,
//! the luma histogram spread, per-channel contrast and the share of
//! dark pixels in one pass over the pixels.

use image::{imageops::FilterType, RgbImage};

use crate::color;

/// Default cap on the longest side after downscale
pub const DEFAULT_MAX_SIDE: u32 = 1024;

/// Default luma below which a pixel counts as dark (0-255 scale)
pub const DEFAULT_DARK_LUMA: u8 = 80;

/// Measurements taken before the ground mask runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Photometrics {
    pub width: u32,
    pub height: u32,
    pub size_kb: f64,
    pub mean_r: f64,
    pub mean_g: f64,
    pub mean_b: f64,
    pub entropy: f64,
    pub contrast: f64,
    pub dark_ratio: f64,
}

/// Round to a fixed number of decimals
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Shrink so the longest side is at most `max_side`, keeping aspect ratio.
/// Images already within the cap are returned untouched.
pub fn downscale(img: RgbImage, max_side: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    let longest = width.max(height);
    if longest <= max_side || max_side == 0 {
        return img;
    }

    let scale = max_side as f64 / longest as f64;
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_side);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_side);

    image::imageops::resize(&img, new_width, new_height, FilterType::Lanczos3)
}

/// Measure a raster. `byte_len` is the size of the original encoded input.
pub fn photometrics(raster: &RgbImage, byte_len: usize, dark_luma: u8) -> Photometrics {
    let (width, height) = raster.dimensions();
    let size_kb = round_to(byte_len as f64 / 1024.0, 2);
    let pixel_count = width as u64 * height as u64;

    if pixel_count == 0 {
        return Photometrics {
            width,
            height,
            size_kb,
            mean_r: 0.0,
            mean_g: 0.0,
            mean_b: 0.0,
            entropy: 0.0,
            contrast: 0.0,
            dark_ratio: 0.0,
        };
    }

    let mut sums = [0u64; 3];
    let mut squares = [0u64; 3];
    let mut histogram = [0u64; 256];
    let mut dark = 0u64;

    for pixel in raster.pixels() {
        let rgb = pixel.0;
        for c in 0..3 {
            let v = rgb[c] as u64;
            sums[c] += v;
            squares[c] += v * v;
        }
        histogram[color::luma_u8(rgb) as usize] += 1;
        if color::luma(rgb) < dark_luma as f64 {
            dark += 1;
        }
    }

    let n = pixel_count as f64;
    let means = sums.map(|s| s as f64 / n);

    // Population standard deviation per channel
    let mut stds = [0f64; 3];
    for c in 0..3 {
        let variance = squares[c] as f64 / n - means[c] * means[c];
        stds[c] = variance.max(0.0).sqrt();
    }
    let contrast = stds.iter().sum::<f64>() / 3.0;

    // Spread of the histogram counts: peaky histograms score high
    let mean_count = n / 256.0;
    let entropy = histogram
        .iter()
        .map(|&count| {
            let d = count as f64 - mean_count;
            d * d
        })
        .sum::<f64>()
        / 256.0;

    Photometrics {
        width,
        height,
        size_kb,
        mean_r: round_to(means[0], 1),
        mean_g: round_to(means[1], 1),
        mean_b: round_to(means[2], 1),
        entropy: round_to(entropy, 2),
        contrast: round_to(contrast, 2),
        dark_ratio: round_to(dark as f64 / n, 4),
    }
}
