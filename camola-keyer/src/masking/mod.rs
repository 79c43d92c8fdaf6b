mod chroma;
mod inference;

pub use chroma::ChromaKeyer;
pub use inference::InferenceMasker;

use crate::capture::Frame;
use crate::config::{AiParams, ChromaParams, RemovalMode};
use crate::error::MaskingError;
use image::GrayImage;

/// Binary foreground mask, same dimensions as its frame
pub type Mask = GrayImage;

/// Mask value for pixels removed from the frame
pub const MASK_BACKGROUND: u8 = 0;

/// Mask value for pixels kept as foreground
pub const MASK_FOREGROUND: u8 = u8::MAX;

/// Capability that turns a frame into a foreground mask
pub trait MaskingProvider {
    /// Per-tick parameters this provider reads from the removal mode
    type Params;

    fn name(&self) -> &'static str;

    /// Produce a mask with the frame's dimensions
    fn mask(&mut self, frame: &Frame, params: &Self::Params) -> Result<Mask, MaskingError>;

    /// Drop any state carried between frames
    fn reset(&mut self) {}
}

pub type ChromaProvider = Box<dyn MaskingProvider<Params = ChromaParams>>;
pub type AiProvider = Box<dyn MaskingProvider<Params = AiParams>>;

/// Dispatches each frame to the masking provider named by the removal mode
pub struct ModeSelector {
    chroma: ChromaProvider,
    ai: Option<AiProvider>,
}

impl ModeSelector {
    /// Chroma keying plus an optional model-backed provider
    pub fn new(ai: Option<AiProvider>) -> Self {
        Self::with_providers(Box::new(ChromaKeyer), ai)
    }

    pub fn with_providers(chroma: ChromaProvider, ai: Option<AiProvider>) -> Self {
        Self { chroma, ai }
    }

    /// Compute the mask for `frame` using exactly the provider `mode` names
    pub fn select_mask(&mut self, frame: &Frame, mode: &RemovalMode) -> Result<Mask, MaskingError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(MaskingError::EmptyFrame { width, height });
        }

        let mask = match mode {
            RemovalMode::Chroma(params) => self.chroma.mask(frame, params)?,
            RemovalMode::Ai(params) => match self.ai.as_mut() {
                Some(provider) => provider.mask(frame, params)?,
                None => {
                    return Err(MaskingError::BackendUnavailable(
                        "no segmentation model loaded".into(),
                    ))
                }
            },
        };

        if mask.dimensions() != frame.dimensions() {
            return Err(MaskingError::DimensionMismatch {
                frame: frame.dimensions(),
                mask: mask.dimensions(),
            });
        }

        Ok(mask)
    }

    /// Reset every provider, e.g. after the camera changed
    pub fn reset(&mut self) {
        self.chroma.reset();
        if let Some(ai) = self.ai.as_mut() {
            tracing::debug!("Resetting {} provider", ai.name());
            ai.reset();
        }
    }
}
