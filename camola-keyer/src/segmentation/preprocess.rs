use crate::capture::Frame;
use image::imageops;
use ndarray::Array4;

/// Preprocessor for converting RGBA frames to model input tensors
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Preprocess a frame into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Drop alpha, convert to float and normalize to [0, 1]
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, frame: &Frame) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized;
        let source = if frame.dimensions() != (self.target_width, self.target_height) {
            resized = imageops::resize(
                frame,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            );
            &resized
        } else {
            frame
        };

        let (width, height) = source.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in source.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                tensor[[0, channel, y, x]] = pixel[channel] as f32 / 255.0;
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn produces_nchw_at_target_size() {
        let frame = Frame::from_pixel(10, 6, Rgba([255, 0, 51, 7]));
        let tensor = Preprocessor::new(4, 2).preprocess(&frame);

        assert_eq!(tensor.shape(), &[1, 3, 2, 4]);
        assert_eq!(tensor[[0, 0, 1, 3]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);
        assert!((tensor[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn keeps_pixel_positions_without_resize() {
        let mut frame = Frame::new(2, 2);
        frame.put_pixel(1, 0, Rgba([255, 255, 255, 255]));
        let tensor = Preprocessor::new(2, 2).preprocess(&frame);

        assert_eq!(tensor[[0, 0, 0, 1]], 1.0);
        assert_eq!(tensor[[0, 0, 1, 0]], 0.0);
    }
}
