use super::{Mask, MaskingProvider, MASK_BACKGROUND, MASK_FOREGROUND};
use crate::capture::Frame;
use crate::config::ChromaParams;
use crate::error::MaskingError;
use image::Luma;

/// Chroma-key mask: a pixel is background when R, G and B all fall inside
/// `key ± tolerance` (inclusive). Alpha is ignored.
pub fn chroma_mask(frame: &Frame, params: &ChromaParams) -> Mask {
    let _span = tracing::debug_span!("chroma_mask").entered();

    let (lower, upper) = params.bounds();
    let (width, height) = frame.dimensions();
    let mut mask = Mask::new(width, height);

    for (pixel, out) in frame.pixels().zip(mask.pixels_mut()) {
        let in_range = (0..3).all(|c| (lower[c]..=upper[c]).contains(&pixel[c]));
        *out = Luma([if in_range {
            MASK_BACKGROUND
        } else {
            MASK_FOREGROUND
        }]);
    }

    mask
}

/// Stateless chroma-key provider
pub struct ChromaKeyer;

impl MaskingProvider for ChromaKeyer {
    type Params = ChromaParams;

    fn name(&self) -> &'static str {
        "chroma"
    }

    fn mask(&mut self, frame: &Frame, params: &ChromaParams) -> Result<Mask, MaskingError> {
        Ok(chroma_mask(frame, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use rstest::rstest;

    fn green_key() -> ChromaParams {
        ChromaParams {
            key: [0, 255, 0],
            tolerance: 40,
        }
    }

    #[rstest]
    #[case([0, 255, 0], MASK_BACKGROUND)]
    #[case([255, 0, 0], MASK_FOREGROUND)]
    #[case([40, 215, 40], MASK_BACKGROUND)]
    #[case([41, 255, 0], MASK_FOREGROUND)]
    #[case([0, 214, 0], MASK_FOREGROUND)]
    #[case([0, 0, 0], MASK_FOREGROUND)]
    fn classifies_against_green_key(#[case] rgb: [u8; 3], #[case] expected: u8) {
        let frame = Frame::from_pixel(1, 1, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        let mask = chroma_mask(&frame, &green_key());
        assert_eq!(mask.get_pixel(0, 0)[0], expected);
    }

    #[test]
    fn ignores_alpha() {
        let frame = Frame::from_pixel(1, 1, Rgba([0, 255, 0, 0]));
        let mask = chroma_mask(&frame, &green_key());
        assert_eq!(mask.get_pixel(0, 0)[0], MASK_BACKGROUND);
    }

    #[test]
    fn mask_matches_frame_dimensions() {
        let frame = Frame::new(7, 5);
        let mask = chroma_mask(&frame, &green_key());
        assert_eq!(mask.dimensions(), (7, 5));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let frame = Frame::from_fn(16, 9, |x, y| {
            Rgba([(x * 16) as u8, (y * 28) as u8, ((x + y) * 10) as u8, 255])
        });
        let params = ChromaParams {
            key: [100, 120, 90],
            tolerance: 60,
        };

        let first = chroma_mask(&frame, &params);
        let second = chroma_mask(&frame, &params);
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn zero_tolerance_matches_only_exact_key() {
        let params = ChromaParams {
            key: [10, 20, 30],
            tolerance: 0,
        };
        let mut frame = Frame::from_pixel(2, 1, Rgba([10, 20, 30, 255]));
        frame.put_pixel(1, 0, Rgba([10, 20, 31, 255]));

        let mask = chroma_mask(&frame, &params);
        assert_eq!(mask.get_pixel(0, 0)[0], MASK_BACKGROUND);
        assert_eq!(mask.get_pixel(1, 0)[0], MASK_FOREGROUND);
    }
}
