use super::preprocess::Preprocessor;
use super::types::{Matte, SegmentationModel};
use crate::capture::Frame;
use crate::error::MaskingError;
use anyhow::{Context, Result};
use ndarray::{Array1, Array4, Ix4};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// RobustVideoMatting segmentation model
///
/// This model uses recurrent connections to maintain temporal consistency.
/// Hidden states (r1-r4) are carried between frames for smooth results.
pub struct RobustVideoMatting {
    session: Session,
    preprocessor: Preprocessor,
    width: u32,
    height: u32,

    // Recurrent hidden states
    // These are updated after each inference and fed back in the next frame
    r1: Array4<f32>,
    r2: Array4<f32>,
    r3: Array4<f32>,
    r4: Array4<f32>,

    // Downsample ratio applied inside the network
    downsample_ratio: f32,
}

/// Placeholder state the exported graph accepts before the first frame
fn empty_state() -> Array4<f32> {
    Array4::zeros((1, 1, 1, 1))
}

impl RobustVideoMatting {
    /// Create a new RVM model from an ONNX file
    ///
    /// # Default Configuration
    /// - Input size: 512x512 (can be adjusted for performance/quality tradeoff)
    /// - Downsample ratio: 0.25
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading RVM model from {}", path.display());
        let session = super::build_session(path)?;
        tracing::info!("RVM model loaded successfully");

        let width = 512;
        let height = 512;

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(width, height),
            width,
            height,
            r1: empty_state(),
            r2: empty_state(),
            r3: empty_state(),
            r4: empty_state(),
            downsample_ratio: 0.25,
        })
    }
}

impl SegmentationModel for RobustVideoMatting {
    fn segment(&mut self, frame: &Frame) -> Result<Matte> {
        let _span = tracing::debug_span!("rvm_segment").entered();

        let src = Tensor::from_array(self.preprocessor.preprocess(frame))?;
        let r1 = Tensor::from_array(self.r1.clone())?;
        let r2 = Tensor::from_array(self.r2.clone())?;
        let r3 = Tensor::from_array(self.r3.clone())?;
        let r4 = Tensor::from_array(self.r4.clone())?;
        let ratio = Tensor::from_array(Array1::from_vec(vec![self.downsample_ratio]))?;

        // RVM expects: src, r1i, r2i, r3i, r4i, downsample_ratio
        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![src, r1, r2, r3, r4, ratio])
            .context("Failed to run inference")?;
        drop(_infer_span);

        // Outputs: fgr, pha, r1o, r2o, r3o, r4o
        if outputs.len() < 6 {
            return Err(MaskingError::Inference(format!(
                "RVM expected 6 outputs, got {}",
                outputs.len()
            ))
            .into());
        }

        let pha = outputs[1].try_extract_array::<f32>()?;
        let shape = pha.shape().to_vec();
        let values: Vec<f32> = pha.iter().copied().collect();
        let matte = Matte::from_nchw(&shape, values).ok_or(MaskingError::MalformedOutput(shape))?;

        let mut states = Vec::with_capacity(4);
        for i in 2..6 {
            let state = outputs[i]
                .try_extract_array::<f32>()?
                .to_owned()
                .into_dimensionality::<Ix4>()?;
            states.push(state);
        }
        drop(outputs);

        // Only commit hidden states once every output decoded cleanly
        let mut states = states.into_iter();
        if let (Some(r1), Some(r2), Some(r3), Some(r4)) =
            (states.next(), states.next(), states.next(), states.next())
        {
            self.r1 = r1;
            self.r2 = r2;
            self.r3 = r3;
            self.r4 = r4;
        }

        Ok(matte)
    }

    fn reset_state(&mut self) {
        tracing::info!("Resetting RVM hidden states");
        self.r1 = empty_state();
        self.r2 = empty_state();
        self.r3 = empty_state();
        self.r4 = empty_state();
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
