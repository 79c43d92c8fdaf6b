mod still;
mod webcam;

pub use still::StillCapture;
pub use webcam::WebcamCapture;

use crate::error::CaptureError;
use image::RgbaImage;

/// A fully decoded RGBA frame captured once per tick
pub type Frame = RgbaImage;

/// Trait for camera capture sources
pub trait CaptureSource {
    /// Capture a single frame
    fn capture_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}

/// Device and resolution the capture source should be opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
}

/// Replace the active capture source.
///
/// The previous source is dropped before `open` runs so the device handle is
/// released before the new one is acquired.
pub fn reconfigure_capture<F>(
    previous: Option<Box<dyn CaptureSource>>,
    config: &CaptureConfig,
    open: F,
) -> Result<Box<dyn CaptureSource>, CaptureError>
where
    F: FnOnce(&CaptureConfig) -> Result<Box<dyn CaptureSource>, CaptureError>,
{
    if let Some(source) = previous {
        let (width, height) = source.resolution();
        tracing::info!("Releasing capture source ({}x{})", width, height);
        drop(source);
    }

    tracing::info!(
        "Opening capture device {} at {}x{}",
        config.device_index,
        config.width,
        config.height
    );
    open(config)
}

/// Open a webcam for the given configuration
pub fn open_webcam(config: &CaptureConfig) -> Result<Box<dyn CaptureSource>, CaptureError> {
    let capture = WebcamCapture::new(config.device_index, config.width, config.height)?;
    Ok(Box::new(capture))
}
