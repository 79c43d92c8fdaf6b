use crate::capture::Frame;
use anyhow::Result;

/// Raw model output at model resolution: 0.0 = background, 1.0 = foreground,
/// flattened in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct Matte {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

impl Matte {
    /// Build a matte from an output tensor shape, which must be `[1, 1, H, W]`
    pub fn from_nchw(shape: &[usize], values: Vec<f32>) -> Option<Self> {
        match *shape {
            [1, 1, height, width] if height > 0 && width > 0 && values.len() == height * width => {
                Some(Self {
                    width: width as u32,
                    height: height as u32,
                    values,
                })
            }
            _ => None,
        }
    }
}

/// Trait for segmentation models
/// Allows swapping between different backends (U2Net, RVM, ...)
pub trait SegmentationModel {
    /// Run one forward pass and return the matte at model resolution
    fn segment(&mut self, frame: &Frame) -> Result<Matte>;

    /// Reset internal state (for models with temporal/recurrent components)
    ///
    /// Call this when switching cameras.
    fn reset_state(&mut self) {
        // Default implementation: no-op for stateless models
    }

    /// Get the model's fixed input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);
}
