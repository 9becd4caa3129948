pub mod detection;
pub mod error;
pub mod filter;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod settings;

pub use detection::ObjectDetector;
pub use error::DetectError;
pub use models::{Detection, DetectionOutput, ImageRole, ObjectKind, Point};
pub use pipeline::{DebugConfig, Pipeline, PipelineContext, PipelineData, PipelineStep};
pub use report::Reporter;
pub use runner::{DetectionRunner, RunEvent};
pub use settings::{MaskShape, Settings};
