use thiserror::Error;

/// Failures raised by frame grabbers.
#[derive(Debug, Error)]
pub enum GrabberError {
    /// A setter received a value outside of what the device supports.
    #[error("setting error: {0}")]
    Setting(String),
    /// Acquisition was requested before the device was opened.
    #[error("initialization error: {0}")]
    Initialization(String),
    /// The device delivered fewer bytes than the configured frame needs.
    #[error("frame holds {actual} bytes, {expected} expected")]
    FrameSize { expected: usize, actual: usize },
    /// The device never reported an even field within the retry budget.
    #[error("no even field after {retries} acquisitions")]
    FieldSync { retries: u32 },
    #[error("no more frames in {0}")]
    EndOfSequence(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

/// Failures raised by the display dispatcher or a display backend.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display not initialized")]
    NotInitialized,
    #[error("display backend: {0}")]
    Backend(String),
}

/// Failures raised while computing visual features.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeatureError {
    /// The point depth is zero, the interaction matrix is undefined.
    #[error("point depth Z is zero")]
    ZeroDepth,
    #[error("selection {0:#b} picks no component of the feature")]
    EmptySelection(u32),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Grabber(#[from] GrabberError),
    #[error(transparent)]
    Display(#[from] DisplayError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
