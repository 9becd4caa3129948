pub mod annotate;
pub mod contours;
pub mod hitmiss;
pub mod morphology;
pub mod preprocessing;
pub mod steps;
pub mod structuring;

use ab_glyph::FontArc;
use image::{DynamicImage, GrayImage};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{DetectError, Result};
use crate::models::{Detection, DetectionOutput, ImageRole, ObjectKind, Point};
use crate::pipeline::{Pipeline, PipelineData};
use crate::report::Reporter;
use crate::settings::Settings;
use annotate::Annotator;
use morphology::Morphology;
use preprocessing::GammaCache;
use steps::*;

/// Runs the full detection: preprocessing, binarization, morphology, the
/// hit-or-miss sweep, and contour classification
pub struct ObjectDetector {
    gamma_cache: Arc<GammaCache>,
    font: Option<FontArc>,
    verbose: bool,
    debug_dir: Option<PathBuf>,
}

impl ObjectDetector {
    pub fn new() -> Self {
        Self {
            gamma_cache: Arc::new(GammaCache::new()),
            font: None,
            verbose: false,
            debug_dir: None,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Save every intermediate image under `dir`
    pub fn with_debug(mut self, dir: PathBuf) -> Self {
        self.debug_dir = Some(dir);
        self
    }

    /// Font used for count labels; without one only outlines are drawn
    pub fn with_font(mut self, font: Option<FontArc>) -> Self {
        self.font = font;
        self
    }

    /// Locate and count both reference objects in the scene
    pub fn detect(
        &self,
        object1: &DynamicImage,
        object2: &DynamicImage,
        scene: &DynamicImage,
        settings: &Settings,
        reporter: &Reporter,
    ) -> Result<DetectionOutput> {
        reporter.status("Running Object Detection using Morphological Operators...");

        if let Err(e) = settings.validate() {
            reporter.status(&format!("ERROR - {}", e));
            return Err(e);
        }
        for (image, role) in [
            (object1, ImageRole::Object1),
            (object2, ImageRole::Object2),
            (scene, ImageRole::Scene),
        ] {
            if image.width() == 0 || image.height() == 0 {
                let e = DetectError::InvalidInput(format!("{} image is empty", role.label()));
                reporter.status(&format!("ERROR - {}", e));
                return Err(e);
            }
        }

        let inputs = vec![
            PipelineData::new(object1.clone(), ImageRole::Object1),
            PipelineData::new(object2.clone(), ImageRole::Object2),
            PipelineData::new(scene.clone(), ImageRole::Scene),
        ];

        let fitted = self.run_stage(self.fitting_pipeline(settings), inputs, reporter)?;
        let binary = self.run_stage(self.binarization_pipeline(settings), fitted.clone(), reporter)?;
        let closed = self.run_stage(self.morphology_pipeline(settings), binary.clone(), reporter)?;

        let obj1_closed = gray_of(&closed, ImageRole::Object1)?;
        let obj2_closed = gray_of(&closed, ImageRole::Object2)?;
        let scene_closed = gray_of(&closed, ImageRole::Scene)?;

        let morph = Morphology::new(settings.mask_shape);
        let (scores1, scores2) = hitmiss::sweep(
            &scene_closed,
            &obj1_closed,
            &obj2_closed,
            settings,
            &morph,
            reporter,
        );
        let object1_hits = scores1.to_image();
        let object2_hits = scores2.to_image();

        let scene_fitted = image_of(&fitted, ImageRole::Scene)?;
        let mut annotated_scene = scene_fitted.to_rgb8();
        let annotator = Annotator::new(self.font.clone(), settings.mark_color, settings.mark_thickness);
        let detections = classify(
            &scene_closed,
            &object1_hits,
            &object2_hits,
            &morph,
            &annotator,
            &mut annotated_scene,
            reporter,
        );

        let first_count = detections.iter().filter(|d| d.kind == ObjectKind::First).count();
        let second_count = detections.len() - first_count;

        let output = DetectionOutput {
            objects_composite: preprocessing::stack_vertical_rgb(
                &image_of(&fitted, ImageRole::Object1)?.to_rgb8(),
                &image_of(&fitted, ImageRole::Object2)?.to_rgb8(),
            ),
            binary_masks: preprocessing::stack_vertical_gray(
                &gray_of(&binary, ImageRole::Object1)?,
                &gray_of(&binary, ImageRole::Object2)?,
            ),
            closed_masks: preprocessing::stack_vertical_gray(&obj1_closed, &obj2_closed),
            scene_binary: gray_of(&binary, ImageRole::Scene)?,
            scene_closed,
            object1_hits,
            object2_hits,
            annotated_scene,
            first_count,
            second_count,
            detections,
        };

        reporter.status(&output.summary());
        reporter.progress(100.0);
        Ok(output)
    }

    fn fitting_pipeline(&self, settings: &Settings) -> Pipeline {
        Pipeline::new("Prepare").add_step(Arc::new(FitToShapeStep {
            shape: settings.image_shape,
        }))
    }

    fn binarization_pipeline(&self, settings: &Settings) -> Pipeline {
        let mut pipeline = Pipeline::new("Binarize")
            .add_step(Arc::new(ContrastStep::new(
                settings.gamma_correction,
                self.gamma_cache.clone(),
            )))
            .add_step(Arc::new(MedianBlurStep {
                kernel_size: settings.blur_kernel_size,
            }))
            .add_step(Arc::new(GrayscaleStep));

        if settings.use_gradient_edge_detector {
            pipeline = pipeline.add_step(Arc::new(GradientEdgeStep));
        }

        pipeline.add_step(Arc::new(ThresholdStep::from_settings(settings)))
    }

    fn morphology_pipeline(&self, settings: &Settings) -> Pipeline {
        Pipeline::new("Morphology").add_step(Arc::new(ClosingStep::new(settings)))
    }

    fn run_stage(
        &self,
        pipeline: Pipeline,
        inputs: Vec<PipelineData>,
        reporter: &Reporter,
    ) -> Result<Vec<PipelineData>> {
        let mut pipeline = pipeline.with_verbose(self.verbose);
        if let Some(dir) = &self.debug_dir {
            pipeline = pipeline
                .with_debug(dir.clone())
                .map_err(|e| upstream(reporter, e))?;
        }
        pipeline.run(inputs).map_err(|e| upstream(reporter, e))
    }
}

impl Default for ObjectDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn upstream(reporter: &Reporter, e: anyhow::Error) -> DetectError {
    let e = DetectError::UpstreamFailure(format!("{:#}", e));
    reporter.status(&format!("ERROR - {}", e));
    e
}

fn image_of(data: &[PipelineData], role: ImageRole) -> Result<&DynamicImage> {
    data.iter()
        .find(|d| d.role == role)
        .map(|d| &d.image)
        .ok_or_else(|| DetectError::UpstreamFailure(format!("{} image was lost", role.label())))
}

fn gray_of(data: &[PipelineData], role: ImageRole) -> Result<GrayImage> {
    image_of(data, role).map(DynamicImage::to_luma8)
}

/// Label scene silhouettes by the score-map locations they contain.
///
/// Object 1 is tried before object 2 and the first match wins. Progress
/// moves from wherever the sweep left it towards 100, one tick per location
/// tested without a match.
fn classify(
    scene_closed: &GrayImage,
    object1_hits: &GrayImage,
    object2_hits: &GrayImage,
    morph: &Morphology,
    annotator: &Annotator,
    canvas: &mut image::RgbImage,
    reporter: &Reporter,
) -> Vec<Detection> {
    reporter.status("Highlighting objects in image...");

    let locations1 = contours::locations(object1_hits, morph);
    let locations2 = contours::locations(object2_hits, morph);
    let scene_contours = contours::external_contours(scene_closed);
    log::debug!(
        "{} scene contours, {} object 1 locations, {} object 2 locations",
        scene_contours.len(),
        locations1.len(),
        locations2.len()
    );

    let mut progress = reporter.current();
    reporter.progress(progress);
    let max_locations = locations1.len().max(locations2.len()).max(1);
    let total_steps = (scene_contours.len() * max_locations).max(1) as f64;
    let progress_step = (100.0 - progress) / total_steps;

    let mut tick = || {
        progress += progress_step;
        reporter.progress(progress);
    };

    let mut detections = Vec::new();
    let (mut count1, mut count2) = (0usize, 0usize);

    for contour in scene_contours {
        if contour.len() < contours::MIN_CONTOUR_POINTS {
            continue;
        }

        let kind = if contains_any(&contour, &locations1, &mut tick) {
            count1 += 1;
            Some((ObjectKind::First, count1))
        } else if contains_any(&contour, &locations2, &mut tick) {
            count2 += 1;
            Some((ObjectKind::Second, count2))
        } else {
            None
        };

        if let Some((kind, index)) = kind {
            let (center, _radius) = contours::min_enclosing_circle(&contour);
            annotator.mark(canvas, &contour, center, kind, index);
            detections.push(Detection {
                kind,
                index,
                center,
                contour,
            });
        }
    }

    detections
}

/// Whether any location lies inside or on the contour
fn contains_any(contour: &[Point], locations: &[Point], tick: &mut impl FnMut()) -> bool {
    for &location in locations {
        if contours::point_polygon_test(contour, location) >= 0 {
            return true;
        }
        tick();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::new(w, h))
    }

    #[test]
    fn empty_input_is_rejected() {
        let detector = ObjectDetector::new();
        let err = detector
            .detect(&blank(0, 0), &blank(5, 5), &blank(50, 50), &Settings::default(), &Reporter::silent())
            .unwrap_err();
        assert!(matches!(err, DetectError::InvalidInput(_)));
    }

    #[test]
    fn invalid_settings_are_rejected_before_running() {
        let settings = Settings {
            rotation_step_degrees: 0,
            ..Settings::default()
        };
        let err = ObjectDetector::new()
            .detect(&blank(5, 5), &blank(5, 5), &blank(50, 50), &settings, &Reporter::silent())
            .unwrap_err();
        assert!(matches!(err, DetectError::ConfigOutOfRange(_)));
    }

    #[test]
    fn first_object_wins_on_shared_contour() {
        let mut scene = GrayImage::new(30, 30);
        for y in 5..15 {
            for x in 5..15 {
                scene.put_pixel(x, y, Luma([255]));
            }
        }
        let mut hits = GrayImage::new(30, 30);
        hits.put_pixel(10, 10, Luma([1]));

        let mut canvas = image::RgbImage::new(30, 30);
        let annotator = Annotator::new(None, [0, 255, 0], 1);
        let detections = classify(
            &scene,
            &hits,
            &hits,
            &Morphology::default(),
            &annotator,
            &mut canvas,
            &Reporter::silent(),
        );

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].kind, ObjectKind::First);
        assert_eq!(detections[0].index, 1);
        assert_eq!(canvas.get_pixel(5, 5), &image::Rgb([0, 255, 0]));
    }
}
