mod preprocess;
mod rvm;
pub mod types;
mod u2net;

use rvm::RobustVideoMatting;
use u2net::U2Net;

pub use types::{Matte, SegmentationModel};

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::fmt::Display;
use std::path::Path;

/// Supported segmentation model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    /// Salient-object model, 320x320, stateless
    U2net,
    /// Robust Video Matting, 512x512, recurrent
    Rvm,
}

/// Load a segmentation model of the given family
pub fn create_model(kind: ModelKind, model_path: &Path) -> Result<Box<dyn SegmentationModel>> {
    let model: Box<dyn SegmentationModel> = match kind {
        ModelKind::U2net => Box::new(U2Net::new(model_path)?),
        ModelKind::Rvm => Box::new(RobustVideoMatting::new(model_path)?),
    };
    Ok(model)
}

/// Configure ONNX Runtime with the CUDA execution provider, falling back to CPU
fn build_session(path: &Path) -> Result<Session> {
    let session = Session::builder()
        .map_err(|e| load_error(path, e))?
        .with_execution_providers([CUDAExecutionProvider::default().build()])
        .map_err(|e| load_error(path, e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| load_error(path, e))?
        .with_intra_threads(4)
        .map_err(|e| load_error(path, e))?
        .commit_from_file(path)
        .map_err(|e| load_error(path, e))?;

    Ok(session)
}

fn load_error<E: Display>(path: &Path, err: E) -> anyhow::Error {
    anyhow!("Failed to load model from {}: {}", path.display(), err)
}
