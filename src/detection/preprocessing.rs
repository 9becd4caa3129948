use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::filter::median_filter;
use ndarray::{Array2, ArrayView2, Axis, Zip};
use std::sync::{Arc, Mutex};

use crate::filter::{gray_to_matrix, matrix_to_gray, normalize_to_u8};

/// Gap between the two images of a vertical composite
pub const STACK_GAP: u32 = 20;

/// Resize an image to exactly `(width, height)`
pub fn resize_exact(img: &DynamicImage, (width, height): (u32, u32)) -> DynamicImage {
    if img.width() == width && img.height() == height {
        return img.clone();
    }
    img.resize_exact(width, height, FilterType::Triangle)
}

/// Shrink an image so it stays at least 2 pixels smaller than `(width, height)`
/// in each dimension. Smaller images are returned unchanged.
pub fn fit_within(img: &DynamicImage, (width, height): (u32, u32)) -> DynamicImage {
    let max_w = width.saturating_sub(2).max(1);
    let max_h = height.saturating_sub(2).max(1);
    let new_w = img.width().min(max_w);
    let new_h = img.height().min(max_h);
    resize_exact(img, (new_w, new_h))
}

/// 256-entry gamma lookup table
#[derive(Debug, Clone, PartialEq)]
pub struct GammaTable {
    gamma: f64,
    lut: [u8; 256],
}

impl GammaTable {
    pub fn new(gamma: f64) -> Self {
        let inv_gamma = 1.0 / gamma;
        let mut lut = [0u8; 256];
        for (v, entry) in lut.iter_mut().enumerate() {
            let level = (v as f64 / 255.0).powf(inv_gamma) * 255.0;
            *entry = level.round().clamp(0.0, 255.0) as u8;
        }
        Self { gamma, lut }
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn lookup(&self, value: u8) -> u8 {
        self.lut[value as usize]
    }

    /// Apply the table to every channel. Grayscale stays grayscale, anything
    /// else becomes RGB.
    pub fn apply(&self, img: &DynamicImage) -> DynamicImage {
        match img {
            DynamicImage::ImageLuma8(gray) => {
                let mut out = gray.clone();
                self.apply_in_place(&mut out);
                DynamicImage::ImageLuma8(out)
            }
            other => {
                let mut out = other.to_rgb8();
                self.apply_in_place(&mut out);
                DynamicImage::ImageRgb8(out)
            }
        }
    }

    fn apply_in_place<P>(&self, buffer: &mut image::ImageBuffer<P, Vec<u8>>)
    where
        P: image::Pixel<Subpixel = u8>,
    {
        for v in buffer.iter_mut() {
            *v = self.lut[*v as usize];
        }
    }
}

/// Keeps the last gamma table and rebuilds it only when gamma changes
#[derive(Debug, Default)]
pub struct GammaCache {
    table: Mutex<Option<Arc<GammaTable>>>,
}

impl GammaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for `gamma`, reusing the cached one when it matches
    pub fn table(&self, gamma: f64) -> Arc<GammaTable> {
        let mut guard = match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_ref() {
            Some(table) if table.gamma() == gamma => table.clone(),
            _ => {
                log::debug!("Building gamma lookup table for gamma={}", gamma);
                let table = Arc::new(GammaTable::new(gamma));
                *guard = Some(table.clone());
                table
            }
        }
    }
}

/// Median blur with an odd square aperture, per channel
pub fn median_blur(img: &DynamicImage, kernel_size: u32) -> DynamicImage {
    let radius = kernel_size / 2;
    if radius == 0 {
        return img.clone();
    }
    match img {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(median_filter(gray, radius, radius)),
        other => {
            let rgb: RgbImage = other.to_rgb8();
            DynamicImage::ImageRgb8(median_filter(&rgb, radius, radius))
        }
    }
}

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Gradient magnitude `sqrt(dy² + dx²)` stretched onto `[0, 255]`
pub fn gradient_edges(gray: &GrayImage) -> GrayImage {
    let m = gray_to_matrix(gray).mapv(f64::from);
    let dy = axis_gradient(&m.view(), Axis(0));
    let dx = axis_gradient(&m.view(), Axis(1));
    let magnitude = Zip::from(&dy).and(&dx).map_collect(|&y, &x| y.hypot(x));
    matrix_to_gray(&normalize_to_u8(&magnitude.view()).view())
}

/// Central differences inside, one-sided differences at the two ends.
/// An axis of length 1 has no gradient.
fn axis_gradient(m: &ArrayView2<f64>, axis: Axis) -> Array2<f64> {
    let n = m.len_of(axis);
    let mut out = Array2::zeros(m.dim());
    if n < 2 {
        return out;
    }

    for i in 0..n {
        let (lo, hi, span) = if i == 0 {
            (0, 1, 1.0)
        } else if i == n - 1 {
            (n - 2, n - 1, 1.0)
        } else {
            (i - 1, i + 1, 2.0)
        };
        let diff = (&m.index_axis(axis, hi) - &m.index_axis(axis, lo)) / span;
        out.index_axis_mut(axis, i).assign(&diff);
    }
    out
}

/// Binary threshold: `v > cutoff` becomes `high`, everything else 0.
/// `invert` swaps the two outputs.
pub fn threshold(gray: &GrayImage, cutoff: u8, high: u8, invert: bool) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let above = gray.get_pixel(x, y)[0] > cutoff;
        Luma([if above != invert { high } else { 0 }])
    })
}

/// Stack two grayscale images vertically with a black gap
pub fn stack_vertical_gray(top: &GrayImage, bottom: &GrayImage) -> GrayImage {
    let mut out = GrayImage::new(
        top.width().max(bottom.width()),
        top.height() + STACK_GAP + bottom.height(),
    );
    imageops::replace(&mut out, top, 0, 0);
    imageops::replace(&mut out, bottom, 0, (top.height() + STACK_GAP) as i64);
    out
}

/// Stack two colour images vertically with a black gap
pub fn stack_vertical_rgb(top: &RgbImage, bottom: &RgbImage) -> RgbImage {
    let mut out = RgbImage::new(
        top.width().max(bottom.width()),
        top.height() + STACK_GAP + bottom.height(),
    );
    imageops::replace(&mut out, top, 0, 0);
    imageops::replace(&mut out, bottom, 0, (top.height() + STACK_GAP) as i64);
    out
}
