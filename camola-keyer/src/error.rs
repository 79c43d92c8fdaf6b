use thiserror::Error;

/// Failures while acquiring frames from a capture source
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open capture source: {0}")]
    Open(String),

    #[error("failed to capture frame: {0}")]
    Frame(String),

    #[error("failed to decode frame: {0}")]
    Decode(String),

    #[error("no capture source is active")]
    NoSource,
}

/// A masking primitive could not produce a mask for this tick
#[derive(Debug, Error)]
pub enum MaskingError {
    #[error("frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("masking backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("malformed model output: expected [1, 1, H, W], got {0:?}")]
    MalformedOutput(Vec<usize>),

    #[error("mask is {mask:?} but frame is {frame:?}")]
    DimensionMismatch { frame: (u32, u32), mask: (u32, u32) },
}

/// Compositing could not use its inputs as given
#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("mask is {mask:?} but frame is {frame:?}")]
    DimensionMismatch { frame: (u32, u32), mask: (u32, u32) },

    #[error("background unavailable: {0}")]
    BackgroundUnavailable(String),
}

/// Why a tick fell back to presenting the raw frame
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Masking(#[from] MaskingError),

    #[error(transparent)]
    Composite(#[from] CompositeError),
}
