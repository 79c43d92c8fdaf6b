mod background;

pub use background::{load_background, BackgroundSource};

use crate::capture::Frame;
use crate::error::CompositeError;
use crate::masking::{Mask, MASK_BACKGROUND};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Layer the masked subject of `frame` over an optional background.
///
/// Without a background, removed pixels become fully transparent. With one,
/// the background scaled to the frame size is the base layer and foreground
/// pixels are copied over it unblended.
pub fn composite(
    frame: &Frame,
    mask: &Mask,
    background: Option<&RgbaImage>,
) -> Result<Frame, CompositeError> {
    let _span = tracing::debug_span!("composite").entered();

    if mask.dimensions() != frame.dimensions() {
        return Err(CompositeError::DimensionMismatch {
            frame: frame.dimensions(),
            mask: mask.dimensions(),
        });
    }

    let (width, height) = frame.dimensions();
    let mut output = match background {
        Some(bg) if bg.dimensions() == (width, height) => bg.clone(),
        Some(bg) => imageops::resize(bg, width, height, FilterType::Triangle),
        None => Frame::new(width, height),
    };

    for ((out, src), m) in output.pixels_mut().zip(frame.pixels()).zip(mask.pixels()) {
        if m[0] != MASK_BACKGROUND {
            *out = *src;
        }
    }

    Ok(output)
}

/// Grayscale, fully opaque rendering of a mask
pub fn mask_to_rgba(mask: &Mask) -> Frame {
    let (width, height) = mask.dimensions();
    Frame::from_fn(width, height, |x, y| {
        let value = mask.get_pixel(x, y)[0];
        Rgba([value, value, value, 255])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masking::MASK_FOREGROUND;
    use image::Luma;

    const SUBJECT: Rgba<u8> = Rgba([200, 100, 50, 255]);
    const BACKDROP: Rgba<u8> = Rgba([10, 20, 30, 255]);

    /// Left half foreground, right half background
    fn split_mask(width: u32, height: u32) -> Mask {
        Mask::from_fn(width, height, |x, _| {
            Luma([if x < width / 2 {
                MASK_FOREGROUND
            } else {
                MASK_BACKGROUND
            }])
        })
    }

    #[test]
    fn rejects_mismatched_mask() {
        let frame = Frame::from_pixel(4, 4, SUBJECT);
        let mask = Mask::new(4, 3);

        let result = composite(&frame, &mask, None);
        assert!(matches!(
            result,
            Err(CompositeError::DimensionMismatch {
                frame: (4, 4),
                mask: (4, 3)
            })
        ));

        let background = RgbaImage::from_pixel(4, 3, BACKDROP);
        assert!(composite(&frame, &mask, Some(&background)).is_err());
    }

    #[test]
    fn cutout_without_background_is_transparent() {
        let frame = Frame::from_pixel(4, 2, SUBJECT);
        let output = composite(&frame, &split_mask(4, 2), None).unwrap();

        for (x, _, pixel) in output.enumerate_pixels() {
            if x < 2 {
                assert_eq!(*pixel, SUBJECT);
            } else {
                assert_eq!(pixel[3], 0);
            }
        }
    }

    #[test]
    fn background_fills_removed_pixels_with_hard_edge() {
        let frame = Frame::from_pixel(6, 3, SUBJECT);
        let background = RgbaImage::from_pixel(6, 3, BACKDROP);
        let output = composite(&frame, &split_mask(6, 3), Some(&background)).unwrap();

        for (x, _, pixel) in output.enumerate_pixels() {
            let expected = if x < 3 { SUBJECT } else { BACKDROP };
            assert_eq!(*pixel, expected);
        }
    }

    #[test]
    fn background_is_scaled_to_frame() {
        let frame = Frame::from_pixel(8, 4, SUBJECT);
        let background = RgbaImage::from_pixel(2, 2, BACKDROP);
        let mask = Mask::from_pixel(8, 4, Luma([MASK_BACKGROUND]));

        let output = composite(&frame, &mask, Some(&background)).unwrap();
        assert_eq!(output.dimensions(), (8, 4));
        assert!(output.pixels().all(|p| *p == BACKDROP));
        assert_eq!(background.dimensions(), (2, 2));
    }

    #[test]
    fn matte_view_is_opaque_grayscale() {
        let rgba = mask_to_rgba(&split_mask(2, 1));
        assert_eq!(*rgba.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(*rgba.get_pixel(1, 0), Rgba([0, 0, 0, 255]));
    }
}
