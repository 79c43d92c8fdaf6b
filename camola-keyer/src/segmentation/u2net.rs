use super::preprocess::Preprocessor;
use super::types::{Matte, SegmentationModel};
use crate::capture::Frame;
use crate::error::MaskingError;
use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// U2Net input resolution.
const INPUT_SIZE: u32 = 320;

/// U2Net salient-object segmentation model
///
/// Stateless: one forward pass per frame, the first output (`d0`) is the matte.
pub struct U2Net {
    session: Session,
    preprocessor: Preprocessor,
}

impl U2Net {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading U2Net model from {}", path.display());
        let session = super::build_session(path)?;
        tracing::info!("U2Net model loaded successfully");

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(INPUT_SIZE, INPUT_SIZE),
        })
    }
}

impl SegmentationModel for U2Net {
    fn segment(&mut self, frame: &Frame) -> Result<Matte> {
        let _span = tracing::debug_span!("u2net_segment").entered();

        let input = Tensor::from_array(self.preprocessor.preprocess(frame))?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input])
            .context("Failed to run inference")?;
        drop(_infer_span);

        if outputs.len() == 0 {
            return Err(MaskingError::Inference("U2Net produced no outputs".into()).into());
        }

        let d0 = outputs[0].try_extract_array::<f32>()?;
        let shape = d0.shape().to_vec();
        let values: Vec<f32> = d0.iter().copied().collect();

        Matte::from_nchw(&shape, values).ok_or_else(|| MaskingError::MalformedOutput(shape).into())
    }

    fn input_size(&self) -> (u32, u32) {
        (INPUT_SIZE, INPUT_SIZE)
    }
}
