use super::{Mask, MaskingProvider, MASK_BACKGROUND, MASK_FOREGROUND};
use crate::capture::Frame;
use crate::config::AiParams;
use crate::error::MaskingError;
use crate::segmentation::{Matte, SegmentationModel};
use image::imageops::{self, FilterType};
use image::Luma;

/// Model-backed provider: segment, threshold, then resample to frame size
pub struct InferenceMasker {
    model: Box<dyn SegmentationModel>,
}

impl InferenceMasker {
    pub fn new(model: Box<dyn SegmentationModel>) -> Self {
        let (width, height) = model.input_size();
        tracing::debug!("Inference masker using {}x{} model input", width, height);
        Self { model }
    }
}

/// Binarize a matte: values scaled to 0..=255 and strictly above `threshold`
/// are foreground
fn threshold_matte(matte: &Matte, threshold: u8) -> Mask {
    Mask::from_fn(matte.width, matte.height, |x, y| {
        let idx = (y * matte.width + x) as usize;
        let value = (matte.values[idx] * 255.0).round().clamp(0.0, 255.0) as u8;
        Luma([if value > threshold {
            MASK_FOREGROUND
        } else {
            MASK_BACKGROUND
        }])
    })
}

/// Resample a binary mask to `width`x`height` without introducing
/// intermediate values
fn resample_mask(mask: Mask, width: u32, height: u32) -> Mask {
    if mask.dimensions() == (width, height) {
        return mask;
    }
    imageops::resize(&mask, width, height, FilterType::Nearest)
}

impl MaskingProvider for InferenceMasker {
    type Params = AiParams;

    fn name(&self) -> &'static str {
        "ai"
    }

    fn mask(&mut self, frame: &Frame, params: &AiParams) -> Result<Mask, MaskingError> {
        let matte = self.model.segment(frame).map_err(|err| {
            err.downcast::<MaskingError>()
                .unwrap_or_else(|err| MaskingError::Inference(format!("{:#}", err)))
        })?;

        let _span = tracing::debug_span!("postprocess").entered();
        let mask = threshold_matte(&matte, params.threshold);
        let (width, height) = frame.dimensions();
        Ok(resample_mask(mask, width, height))
    }

    fn reset(&mut self) {
        self.model.reset_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};

    struct FixedModel {
        matte: Option<Matte>,
    }

    impl SegmentationModel for FixedModel {
        fn segment(&mut self, _frame: &Frame) -> Result<Matte> {
            self.matte
                .clone()
                .ok_or_else(|| anyhow!("backend went away"))
        }

        fn input_size(&self) -> (u32, u32) {
            (2, 2)
        }
    }

    struct MalformedModel;

    impl SegmentationModel for MalformedModel {
        fn segment(&mut self, _frame: &Frame) -> Result<Matte> {
            Err(MaskingError::MalformedOutput(vec![1, 3, 2, 2]).into())
        }

        fn input_size(&self) -> (u32, u32) {
            (2, 2)
        }
    }

    fn quadrant_matte() -> Matte {
        // left column foreground, right column background
        Matte {
            width: 2,
            height: 2,
            values: vec![0.9, 0.1, 1.0, 0.0],
        }
    }

    #[test]
    fn thresholds_at_midpoint() {
        let matte = Matte {
            width: 4,
            height: 1,
            values: vec![0.0, 128.0 / 255.0, 129.0 / 255.0, 1.0],
        };
        let mask = threshold_matte(&matte, 128);
        let values: Vec<u8> = mask.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![0, 0, 255, 255]);
    }

    #[test]
    fn resampled_mask_matches_frame_and_stays_binary() {
        let mut masker = InferenceMasker::new(Box::new(FixedModel {
            matte: Some(quadrant_matte()),
        }));

        let frame = Frame::new(6, 4);
        let mask = masker.mask(&frame, &AiParams::default()).unwrap();

        assert_eq!(mask.dimensions(), (6, 4));
        assert!(mask
            .pixels()
            .all(|p| p[0] == MASK_BACKGROUND || p[0] == MASK_FOREGROUND));
        assert_eq!(mask.get_pixel(0, 0)[0], MASK_FOREGROUND);
        assert_eq!(mask.get_pixel(5, 3)[0], MASK_BACKGROUND);
    }

    #[test]
    fn model_errors_become_inference_failures() {
        let mut masker = InferenceMasker::new(Box::new(FixedModel {
            matte: None,
        }));

        let result = masker.mask(&Frame::new(2, 2), &AiParams::default());
        match result {
            Err(MaskingError::Inference(msg)) => assert!(msg.contains("backend went away")),
            other => panic!("expected inference failure, got {:?}", other.map(|m| m.dimensions())),
        }
    }

    #[test]
    fn malformed_output_is_preserved() {
        let mut masker = InferenceMasker::new(Box::new(MalformedModel));
        let result = masker.mask(&Frame::new(2, 2), &AiParams::default());
        assert!(matches!(result, Err(MaskingError::MalformedOutput(_))));
    }
}
