//! Binary morphology on 0/255 masks.

use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_open, Mask};

/// 5x5 elliptical structuring element:
///
/// ```text
/// . . X . .
/// X X X X X
/// X X X X X
/// X X X X X
/// . . X . .
/// ```
const ELLIPSE_5X5: [[u8; 5]; 5] = [
    [0, 0, 1, 0, 0],
    [1, 1, 1, 1, 1],
    [1, 1, 1, 1, 1],
    [1, 1, 1, 1, 1],
    [0, 0, 1, 0, 0],
];

/// Structuring element centred on (2, 2)
pub fn ellipse_5x5() -> Mask {
    let kernel = GrayImage::from_fn(5, 5, |x, y| Luma([ELLIPSE_5X5[y as usize][x as usize]]));
    Mask::from_image(&kernel, 2, 2)
}

/// Erosion followed by dilation; removes specks smaller than the kernel.
/// Pixels beyond the frame are ignored, so a filled mask stays filled.
pub fn open(mask: &GrayImage) -> GrayImage {
    grayscale_open(mask, &ellipse_5x5())
}
