mod fixtures;
pub use fixtures::*;

pub use morphdetect::{DetectionOutput, ObjectDetector, ObjectKind, Reporter, Settings};
