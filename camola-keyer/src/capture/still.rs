use super::{CaptureSource, Frame};
use crate::error::CaptureError;
use image::imageops::{self, FilterType};
use std::path::Path;

/// Capture source that yields the same decoded image every tick.
///
/// Lets the pipeline run without a camera attached.
pub struct StillCapture {
    frame: Frame,
}

impl StillCapture {
    /// Load an image file, resizing it to `width`x`height` when they differ
    pub fn open<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        tracing::info!("Using still image {} as capture source", path.display());

        let image = image::open(path)
            .map_err(|e| CaptureError::Open(format!("{}: {}", path.display(), e)))?
            .into_rgba8();

        Ok(Self::from_frame(image, width, height))
    }

    pub fn from_frame(frame: Frame, width: u32, height: u32) -> Self {
        let frame = if frame.dimensions() != (width, height) {
            imageops::resize(&frame, width, height, FilterType::Triangle)
        } else {
            frame
        };

        Self { frame }
    }
}

impl CaptureSource for StillCapture {
    fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        Ok(self.frame.clone())
    }

    fn resolution(&self) -> (u32, u32) {
        self.frame.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn resizes_to_requested_resolution() {
        let source = Frame::from_pixel(8, 6, Rgba([10, 20, 30, 255]));
        let mut capture = StillCapture::from_frame(source, 4, 3);

        assert_eq!(capture.resolution(), (4, 3));
        let frame = capture.capture_frame().unwrap();
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        Frame::from_pixel(2, 2, Rgba([0, 0, 255, 255]))
            .save(&path)
            .unwrap();

        let mut capture = StillCapture::open(&path, 2, 2).unwrap();
        let frame = capture.capture_frame().unwrap();
        assert!(frame.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let result = StillCapture::open("/definitely/not/here.png", 2, 2);
        assert!(matches!(result, Err(CaptureError::Open(_))));
    }
}
