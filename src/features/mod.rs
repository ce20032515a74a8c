//! Feature extraction module
//!
//! This module handles:
//! - Decoding image bytes into RGB rasters (decode.rs)
//! - Downscaling and photometric measurements (extract.rs)
//! - Ground-slice waste detection (ground.rs, morphology.rs)

pub mod decode;
pub mod extract;
pub mod ground;
pub mod morphology;

use image::RgbImage;

use crate::config::ClassifierConfig;
use crate::error::DecodeError;
use crate::state::FeatureVector;

/// Full feature vector for an already decoded raster
pub fn features_from_raster(raster: RgbImage, byte_len: usize, config: &ClassifierConfig) -> FeatureVector {
    let raster = extract::downscale(raster, config.max_side);
    let p = extract::photometrics(&raster, byte_len, config.dark_luma_cutoff);
    let ground_ratio = ground::ground_ratio(&raster, config.ground_slice);

    FeatureVector {
        width: p.width,
        height: p.height,
        size_kb: p.size_kb,
        mean_r: p.mean_r,
        mean_g: p.mean_g,
        mean_b: p.mean_b,
        entropy: p.entropy,
        contrast: p.contrast,
        dark_ratio: p.dark_ratio,
        ground_ratio,
    }
}

/// Decode and measure encoded image bytes
pub fn analyze(bytes: &[u8], config: &ClassifierConfig) -> Result<FeatureVector, DecodeError> {
    let raster = decode::decode(bytes)?;
    Ok(features_from_raster(raster, bytes.len(), config))
}
