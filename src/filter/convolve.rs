//! Manual 2D correlation of an image with a numeric kernel.
//!
//! The kernel is applied as-is (not flipped) to every pixel of a padded copy of
//! the image. Sums are accumulated in `f64` and converted to the caller's
//! output type with saturation.

use image::DynamicImage;
use ndarray::{Array2, ArrayView2, array, s};

use super::padding::{Padding, pad};
use super::{FilterError, gray_to_matrix};

/// A validated filter kernel: square, odd-sized and non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    weights: Array2<f64>,
}

impl Kernel {
    /// Validate and wrap a weight matrix
    pub fn new(weights: Array2<f64>) -> Result<Self, FilterError> {
        let (rows, cols) = weights.dim();
        if rows == 0 || cols == 0 {
            return Err(FilterError::EmptyKernel);
        }
        if rows != cols {
            return Err(FilterError::NonSquareKernel { rows, cols });
        }
        if rows % 2 == 0 {
            return Err(FilterError::EvenKernel { size: rows });
        }
        Ok(Self { weights })
    }

    /// 1x1 kernel that leaves the image unchanged
    pub fn identity() -> Self {
        Self {
            weights: array![[1.0]],
        }
    }

    /// Normalized `size x size` averaging kernel
    pub fn box_blur(size: usize) -> Result<Self, FilterError> {
        let weight = 1.0 / (size * size).max(1) as f64;
        Self::new(Array2::from_elem((size, size), weight))
    }

    /// 3x3 sharpening Laplacian
    pub fn laplacian3() -> Self {
        Self {
            weights: array![[-1.0, -1.0, -1.0], [-1.0, 9.0, -1.0], [-1.0, -1.0, -1.0]],
        }
    }

    /// 5x5 sharpening Laplacian
    pub fn laplacian5() -> Self {
        Self {
            weights: array![
                [0.0, 0.0, -1.0, 0.0, 0.0],
                [0.0, -1.0, -2.0, -1.0, 0.0],
                [-1.0, -2.0, 17.0, -2.0, -1.0],
                [0.0, -1.0, -2.0, -1.0, 0.0],
                [0.0, 0.0, -1.0, 0.0, 0.0],
            ],
        }
    }

    pub fn weights(&self) -> ArrayView2<'_, f64> {
        self.weights.view()
    }

    /// Vertical and horizontal half-widths `((rows-1)/2, (cols-1)/2)`
    pub fn half_widths(&self) -> (usize, usize) {
        let (rows, cols) = self.weights.dim();
        ((rows - 1) / 2, (cols - 1) / 2)
    }
}

/// Conversion from an `f64` accumulator that clips to the target range
/// instead of wrapping.
pub trait SaturatingCast: Copy {
    fn saturating_cast(value: f64) -> Self;
}

macro_rules! impl_saturating_int {
    ($($t:ty),*) => {
        $(
            impl SaturatingCast for $t {
                fn saturating_cast(value: f64) -> Self {
                    value.clamp(<$t>::MIN as f64, <$t>::MAX as f64) as $t
                }
            }
        )*
    };
}

impl_saturating_int!(u8, i8, u16, i16, u32, i32);

impl SaturatingCast for f32 {
    fn saturating_cast(value: f64) -> Self {
        value.clamp(f32::MIN as f64, f32::MAX as f64) as f32
    }
}

impl SaturatingCast for f64 {
    fn saturating_cast(value: f64) -> Self {
        value.clamp(f64::MIN, f64::MAX)
    }
}

/// Correlate `image` with `kernel` and return a same-shaped matrix in the
/// output type `O`.
pub fn filter<T, O>(
    image: &ArrayView2<T>,
    kernel: &Kernel,
    padding: Padding,
) -> Result<Array2<O>, FilterError>
where
    T: Copy + Default + Into<f64>,
    O: SaturatingCast,
{
    if image.is_empty() {
        return Err(FilterError::EmptyImage);
    }

    let (pad_v, pad_h) = kernel.half_widths();
    let padded = pad(image, pad_v, pad_h, padding).mapv(Into::<f64>::into);
    let weights = kernel.weights();
    let (k_rows, k_cols) = weights.dim();

    let result = Array2::from_shape_fn(image.dim(), |(i, j)| {
        let window = padded.slice(s![i..i + k_rows, j..j + k_cols]);
        let sum: f64 = window
            .iter()
            .zip(weights.iter())
            .map(|(pixel, weight)| pixel * weight)
            .sum();
        O::saturating_cast(sum)
    });

    Ok(result)
}

/// Filter a decoded image. Multi-channel images are reduced to luminance first.
pub fn filter_image<O>(
    image: &DynamicImage,
    kernel: &Kernel,
    padding: Padding,
) -> Result<Array2<O>, FilterError>
where
    O: SaturatingCast,
{
    if image.width() == 0 || image.height() == 0 {
        return Err(FilterError::EmptyImage);
    }
    if image.color().channel_count() > 1 {
        log::info!("Input image not in grayscale mode. Converting it to grayscale.");
    }
    let matrix = gray_to_matrix(&image.to_luma8());
    filter(&matrix.view(), kernel, padding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn ramp(rows: usize, cols: usize) -> Array2<u8> {
        Array2::from_shape_fn((rows, cols), |(r, c)| ((r * cols + c) * 2 + 2) as u8)
    }

    #[test]
    fn identity_kernel_keeps_image() {
        let image = ramp(5, 7);
        let out: Array2<u8> = filter(&image.view(), &Kernel::identity(), Padding::Zero).unwrap();
        assert_eq!(out, image);

        let out: Array2<f64> = filter(&image.view(), &Kernel::identity(), Padding::Zero).unwrap();
        assert_eq!(out, image.mapv(f64::from));
    }

    #[test]
    fn output_saturates_instead_of_wrapping() {
        let image = Array2::from_elem((4, 4), 200u8);
        let kernel = Kernel::new(Array2::from_elem((3, 3), 1.0)).unwrap();

        let out: Array2<u8> = filter(&image.view(), &kernel, Padding::Extended).unwrap();
        assert!(out.iter().all(|&v| v == 255));

        let negative = Kernel::new(Array2::from_elem((3, 3), -1.0)).unwrap();
        let out: Array2<u8> = filter(&image.view(), &negative, Padding::Extended).unwrap();
        assert!(out.iter().all(|&v| v == 0));

        let out: Array2<i16> = filter(&image.view(), &kernel, Padding::Extended).unwrap();
        assert!(out.iter().all(|&v| v == 1800));
    }

    #[test]
    fn kernel_validation_rejects_bad_shapes() {
        assert!(matches!(
            Kernel::new(Array2::zeros((2, 2))),
            Err(FilterError::EvenKernel { size: 2 })
        ));
        assert!(matches!(
            Kernel::new(Array2::zeros((4, 4))),
            Err(FilterError::EvenKernel { size: 4 })
        ));
        assert!(matches!(
            Kernel::new(Array2::zeros((3, 5))),
            Err(FilterError::NonSquareKernel { rows: 3, cols: 5 })
        ));
        assert!(matches!(
            Kernel::new(Array2::zeros((0, 0))),
            Err(FilterError::EmptyKernel)
        ));
        assert!(Kernel::new(Array2::zeros((5, 5))).is_ok());
    }

    #[test]
    fn laplacian_on_small_tensor_zero_padding() {
        // 5x5 tensor of 2, 4, ..., 50
        let image = ramp(5, 5);
        let out: Array2<i32> = filter(&image.view(), &Kernel::laplacian3(), Padding::Zero).unwrap();

        // Top-left: 9*2 - (4 + 12 + 14)
        assert_eq!(out[[0, 0]], 18 - 30);
        // Interior pixel of a linear ramp: 9*v - 8*v
        assert_eq!(out[[2, 2]], image[[2, 2]] as i32);

        let saturated: Array2<u8> =
            filter(&image.view(), &Kernel::laplacian3(), Padding::Zero).unwrap();
        assert_eq!(saturated[[0, 0]], 0);
        assert_eq!(saturated[[2, 2]], image[[2, 2]]);
    }

    #[test]
    fn extended_padding_keeps_flat_image_flat() {
        let image = Array2::from_elem((6, 4), 37u8);
        let out: Array2<u8> =
            filter(&image.view(), &Kernel::laplacian5(), Padding::Extended).unwrap();
        assert!(out.iter().all(|&v| v == 37));

        // Zero padding darkens the border under the same kernel
        let out: Array2<u8> = filter(&image.view(), &Kernel::laplacian5(), Padding::Zero).unwrap();
        assert!(out[[0, 0]] > 37);
    }

    #[test]
    fn kernel_is_not_flipped() {
        let image = ramp(3, 3);
        let kernel = Kernel::new(array![[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, 0.0]]).unwrap();
        let out: Array2<u8> = filter(&image.view(), &kernel, Padding::Zero).unwrap();
        // Each output takes its right-hand neighbour
        assert_eq!(out[[0, 0]], image[[0, 1]]);
        assert_eq!(out[[1, 1]], image[[1, 2]]);
        assert_eq!(out[[2, 2]], 0);
    }

    #[test]
    fn filter_image_reduces_color_input() {
        let rgb = RgbImage::from_pixel(3, 2, Rgb([90, 90, 90]));
        let out: Array2<u8> =
            filter_image(&DynamicImage::ImageRgb8(rgb), &Kernel::identity(), Padding::Zero).unwrap();
        assert_eq!(out.dim(), (2, 3));
        assert!(out.iter().all(|&v| v == 90));

        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let err = filter_image::<u8>(&empty, &Kernel::identity(), Padding::Zero);
        assert!(matches!(err, Err(FilterError::EmptyImage)));

        let gray = GrayImage::from_pixel(2, 2, Luma([10]));
        let out: Array2<f32> =
            filter_image(&DynamicImage::ImageLuma8(gray), &Kernel::identity(), Padding::Zero)
                .unwrap();
        assert!(out.iter().all(|&v| v == 10.0));
    }
}
