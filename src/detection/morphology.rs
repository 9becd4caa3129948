//! Binary morphology with a rectangular all-ones mask.
//!
//! Pixels outside the image never take part in a dilation or erosion, so
//! shapes touching the border are neither grown from nor eaten by it.

use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

use crate::filter::{crop_center, gray_to_matrix, matrix_to_gray, zero_pad};
use crate::settings::{MaskShape, Settings};

/// Extra border added around a reference object before closing it
pub const OBJECT_PAD_MARGIN: u32 = 2;

pub struct Morphology {
    mask: Mask,
}

impl Morphology {
    /// Mask of `shape.rows x shape.cols` ones anchored at its centre.
    /// Each side must be within `1..=255`.
    pub fn new(shape: MaskShape) -> Self {
        let ones = GrayImage::from_pixel(shape.cols, shape.rows, Luma([255]));
        let mask = Mask::from_image(&ones, (shape.cols / 2) as u8, (shape.rows / 2) as u8);
        Self { mask }
    }

    pub fn dilate(&self, image: &GrayImage, iterations: u32) -> GrayImage {
        let mut out = image.clone();
        if is_empty(image) {
            return out;
        }
        for _ in 0..iterations {
            out = grayscale_dilate(&out, &self.mask);
        }
        out
    }

    pub fn erode(&self, image: &GrayImage, iterations: u32) -> GrayImage {
        let mut out = image.clone();
        if is_empty(image) {
            return out;
        }
        for _ in 0..iterations {
            out = grayscale_erode(&out, &self.mask);
        }
        out
    }

    /// `iterations` dilations followed by as many erosions
    pub fn close(&self, image: &GrayImage, iterations: u32) -> GrayImage {
        self.erode(&self.dilate(image, iterations), iterations)
    }

    /// `iterations` erosions followed by as many dilations
    pub fn open(&self, image: &GrayImage, iterations: u32) -> GrayImage {
        self.dilate(&self.erode(image, iterations), iterations)
    }

    /// Closing then opening, as applied to the scene
    pub fn clean_scene(&self, scene: &GrayImage, settings: &Settings) -> GrayImage {
        let closed = self.close(scene, settings.morph_close_iterations);
        self.open(&closed, settings.morph_open_iterations)
    }

    /// Close a reference-object mask without letting it touch the array
    /// bounds: pad by `close + 2`, close, crop back to the input size.
    /// Objects are opened first when neither gradients nor a bright
    /// background are in use.
    pub fn close_object(&self, object: &GrayImage, settings: &Settings) -> GrayImage {
        let object = if settings.opens_objects() {
            self.open(object, settings.morph_open_iterations)
        } else {
            object.clone()
        };

        let pad = (settings.morph_close_iterations + OBJECT_PAD_MARGIN) as usize;
        let padded = zero_pad(&gray_to_matrix(&object).view(), pad, pad);
        let closed = self.close(
            &matrix_to_gray(&padded.view()),
            settings.morph_close_iterations,
        );
        let cropped = crop_center(&gray_to_matrix(&closed).view(), pad, pad);
        matrix_to_gray(&cropped.view())
    }
}

fn is_empty(image: &GrayImage) -> bool {
    image.width() == 0 || image.height() == 0
}

impl Default for Morphology {
    fn default() -> Self {
        Self::new(MaskShape::default())
    }
}
