use super::{CaptureSource, Frame};
use crate::error::CaptureError;
use image::DynamicImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    pub fn new(device_index: u32, width: u32, height: u32) -> Result<Self, CaptureError> {
        tracing::info!(
            "Initializing webcam {} at {}x{}",
            device_index,
            width,
            height
        );

        let index = CameraIndex::Index(device_index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestResolution(
            Resolution::new(width, height),
        ));

        let mut camera = Camera::new(index, requested)
            .map_err(|e| CaptureError::Open(format!("camera {}: {}", device_index, e)))?;

        camera
            .open_stream()
            .map_err(|e| CaptureError::Open(format!("camera {} stream: {}", device_index, e)))?;

        // The driver may settle on a different size than requested
        let actual = camera.resolution();
        if (actual.width(), actual.height()) != (width, height) {
            tracing::warn!(
                "Webcam negotiated {}x{} instead of {}x{}",
                actual.width(),
                actual.height(),
                width,
                height
            );
        }

        tracing::info!("Webcam initialized successfully");

        Ok(Self {
            camera,
            width: actual.width(),
            height: actual.height(),
        })
    }
}

impl CaptureSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| CaptureError::Frame(e.to_string()))?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Decode(e.to_string()))?;

        Ok(DynamicImage::ImageRgb8(decoded).into_rgba8())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("Failed to stop webcam stream: {}", e);
        }
    }
}
