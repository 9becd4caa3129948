//! Image filtering engine: border padding and manual 2D correlation.

pub mod convolve;
pub mod padding;

use image::{GrayImage, Luma};
use ndarray::{Array2, ArrayView2};
use thiserror::Error;

pub use convolve::{Kernel, SaturatingCast, filter, filter_image};
pub use padding::{Padding, crop_center, extended_pad, pad, zero_pad};

/// Reasons a filter request produces no result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("image is empty")]
    EmptyImage,
    #[error("kernel is empty")]
    EmptyKernel,
    #[error("kernel must be square, got {rows}x{cols}")]
    NonSquareKernel { rows: usize, cols: usize },
    #[error("kernel size must be odd, got {size}x{size}")]
    EvenKernel { size: usize },
}

/// Copy a grayscale image into a `(rows, cols)` matrix
pub fn gray_to_matrix(image: &GrayImage) -> Array2<u8> {
    let (width, height) = image.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        image.get_pixel(x as u32, y as u32)[0]
    })
}

/// Copy a `(rows, cols)` matrix back into a grayscale image
pub fn matrix_to_gray(matrix: &ArrayView2<u8>) -> GrayImage {
    let (rows, cols) = matrix.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([matrix[[y as usize, x as usize]]])
    })
}

/// Stretch a floating-point matrix onto `[0, 255]`: subtract the minimum,
/// scale by `255 / max` and round. A constant matrix maps to zeros.
pub fn normalize_to_u8(matrix: &ArrayView2<f64>) -> Array2<u8> {
    let min = matrix.iter().copied().fold(f64::INFINITY, f64::min);
    let shifted = matrix.mapv(|v| v - min);
    let max = shifted.iter().copied().fold(0.0, f64::max);

    if !max.is_finite() || max <= 0.0 {
        return Array2::zeros(matrix.dim());
    }

    shifted.mapv(|v| (v * 255.0 / max).round() as u8)
}
