use crate::detection::morphology::Morphology;
use crate::detection::preprocessing::{self, GammaCache};
use crate::pipeline::{PipelineContext, PipelineData, PipelineStep};
use crate::settings::Settings;
use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use std::sync::Arc;

/// Bring inputs to the working resolution: the scene is resized to the
/// working shape, reference objects are shrunk to fit inside it
pub struct FitToShapeStep {
    pub shape: (u32, u32),
}

impl PipelineStep for FitToShapeStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let fitted = if item.is_scene() {
                preprocessing::resize_exact(&item.image, self.shape)
            } else {
                preprocessing::fit_within(&item.image, self.shape)
            };
            if context.verbose && fitted.dimensions() != item.image.dimensions() {
                log::info!(
                    "  Resized {} from {:?} to {:?}",
                    item.role.label(),
                    item.image.dimensions(),
                    fitted.dimensions()
                );
            }
            result.push(item.with_image(fitted));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Fit To Shape"
    }
}

/// Gamma contrast adjustment through a cached lookup table
pub struct ContrastStep {
    pub gamma: f64,
    // Shared with the detector so the table survives across runs
    cache: Arc<GammaCache>,
}

impl ContrastStep {
    pub fn new(gamma: f64, cache: Arc<GammaCache>) -> Self {
        Self { gamma, cache }
    }
}

impl PipelineStep for ContrastStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let table = self.cache.table(self.gamma);
        Ok(data
            .into_iter()
            .map(|item| {
                let adjusted = table.apply(&item.image);
                item.with_image(adjusted)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Contrast Adjustment"
    }
}

/// Median blur
pub struct MedianBlurStep {
    pub kernel_size: u32,
}

impl PipelineStep for MedianBlurStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .into_iter()
            .map(|item| {
                let blurred = preprocessing::median_blur(&item.image, self.kernel_size);
                item.with_image(blurred)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Median Blur"
    }
}

/// Convert image to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let gray = preprocessing::to_grayscale(&item.image);
            result.push(item.with_image(DynamicImage::ImageLuma8(gray)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Replace brightness with gradient magnitude
pub struct GradientEdgeStep;

impl PipelineStep for GradientEdgeStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let edges = preprocessing::gradient_edges(&item.image.to_luma8());
            result.push(item.with_image(DynamicImage::ImageLuma8(edges)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Gradient Edge Detection"
    }
}

/// Binarize with a single cutoff
pub struct ThresholdStep {
    pub cutoff: u8,
    pub high: u8,
    pub invert: bool,
}

impl ThresholdStep {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            cutoff: settings.threshold1,
            high: settings.threshold2,
            invert: settings.inverts_threshold(),
        }
    }
}

impl PipelineStep for ThresholdStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let binary =
                preprocessing::threshold(&item.image.to_luma8(), self.cutoff, self.high, self.invert);
            result.push(item.with_image(DynamicImage::ImageLuma8(binary)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Thresholding"
    }
}

/// Morphological cleanup: the scene is closed then opened, each reference
/// object is closed on a padded canvas
pub struct ClosingStep {
    settings: Settings,
    morph: Morphology,
}

impl ClosingStep {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
            morph: Morphology::new(settings.mask_shape),
        }
    }
}

impl PipelineStep for ClosingStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let binary = item.image.to_luma8();
            let closed = if item.is_scene() {
                self.morph.clean_scene(&binary, &self.settings)
            } else {
                self.morph.close_object(&binary, &self.settings)
            };
            result.push(item.with_image(DynamicImage::ImageLuma8(closed)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Closing"
    }
}
