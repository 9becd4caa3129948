use thiserror::Error;

/// Failures that abort a detection run
#[derive(Error, Debug)]
pub enum DetectError {
    /// An image has the wrong shape or is empty
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A setting is outside the range the pipeline can work with
    #[error("setting out of range: {0}")]
    ConfigOutOfRange(String),

    /// A pipeline-critical image could not be produced
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A run is already in flight
    #[error("a detection run is already in progress")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, DetectError>;
