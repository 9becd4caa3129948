use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;

use crate::models::ImageRole;

/// Data that flows through the pipeline
/// Each PipelineData is one of the three run inputs at its current stage
#[derive(Clone)]
pub struct PipelineData {
    /// The image data (can be grayscale or color)
    pub image: DynamicImage,

    /// Which input this is
    pub role: ImageRole,
}

impl PipelineData {
    pub fn new(image: DynamicImage, role: ImageRole) -> Self {
        Self { image, role }
    }

    /// Same item with a new image
    pub fn with_image(&self, image: DynamicImage) -> Self {
        Self {
            image,
            role: self.role,
        }
    }

    pub fn is_scene(&self) -> bool {
        self.role == ImageRole::Scene
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Directory this pipeline's intermediate images go to
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub verbose: bool,
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Process data and return transformed data
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>>;

    /// Human-readable name for this step (used in verbose output)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
pub struct Pipeline {
    name: String,
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.context.verbose = verbose;
        self
    }

    /// Enable debug mode. Images are saved under `root/<pipeline name>`,
    /// which must be empty or non-existent.
    pub fn with_debug(mut self, root: PathBuf) -> Result<Self> {
        let output_dir = root.join(dir_name(&self.name));
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Run every step in order over the inputs
    pub fn run(&self, inputs: Vec<PipelineData>) -> Result<Vec<PipelineData>> {
        self.run_partial(inputs, self.steps.len())
    }

    /// Run only the first `num_steps` steps (useful for debugging)
    pub fn run_partial(&self, inputs: Vec<PipelineData>, num_steps: usize) -> Result<Vec<PipelineData>> {
        self.save_debug("00_input", &inputs)?;

        let mut data = inputs;
        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            if self.context.verbose {
                log::info!(
                    "[{}] Running step: {} (processing {} items)",
                    self.name,
                    step.name(),
                    data.len()
                );
            }

            data = step
                .process(data, &self.context)
                .with_context(|| format!("step '{}' failed", step.name()))?;

            let step_dir_name = format!("{:02}_{}", step_idx + 1, dir_name(step.name()));
            self.save_debug(&step_dir_name, &data)?;
        }

        Ok(data)
    }

    /// Save one image per item, named after its role
    fn save_debug(&self, step_dir_name: &str, data: &[PipelineData]) -> Result<()> {
        let Some(debug_config) = &self.context.debug else {
            return Ok(());
        };

        let step_dir = debug_config.output_dir.join(step_dir_name);
        std::fs::create_dir_all(&step_dir)?;

        for item in data {
            let output_path = step_dir.join(format!("{}.png", item.role.label()));
            item.image
                .save(&output_path)
                .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
        }

        if self.context.verbose {
            log::debug!("  Debug: saved {} images to {}/", data.len(), step_dir_name);
        }
        Ok(())
    }
}

fn dir_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    struct Invert;

    impl PipelineStep for Invert {
        fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
            Ok(data
                .into_iter()
                .map(|item| {
                    let mut gray = item.image.to_luma8();
                    image::imageops::invert(&mut gray);
                    item.with_image(DynamicImage::ImageLuma8(gray))
                })
                .collect())
        }

        fn name(&self) -> &str {
            "Invert Levels"
        }
    }

    fn input(value: u8, role: ImageRole) -> PipelineData {
        PipelineData::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([value]))),
            role,
        )
    }

    #[test]
    fn steps_run_in_order_and_keep_roles() -> Result<()> {
        let pipeline = Pipeline::new("test")
            .add_step(Arc::new(Invert))
            .add_step(Arc::new(Invert));

        let out = pipeline.run(vec![input(10, ImageRole::Object1), input(200, ImageRole::Scene)])?;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].role, ImageRole::Object1);
        assert_eq!(out[0].image.to_luma8().get_pixel(0, 0)[0], 10);
        assert!(out[1].is_scene());

        let partial = pipeline.run_partial(vec![input(10, ImageRole::Object2)], 1)?;
        assert_eq!(partial[0].image.to_luma8().get_pixel(0, 0)[0], 245);
        assert_eq!(partial[0].role, ImageRole::Object2);
        Ok(())
    }

    #[test]
    fn debug_mode_saves_each_step() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let pipeline = Pipeline::new("Binarize")
            .add_step(Arc::new(Invert))
            .with_debug(dir.path().to_path_buf())?;

        pipeline.run(vec![input(3, ImageRole::Scene)])?;

        assert!(dir.path().join("binarize/00_input/scene.png").is_file());
        assert!(dir.path().join("binarize/01_invert_levels/scene.png").is_file());

        // A second pipeline with the same name refuses the now non-empty directory
        let again = Pipeline::new("Binarize").with_debug(dir.path().to_path_buf());
        assert!(again.is_err());
        Ok(())
    }
}
