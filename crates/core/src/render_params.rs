//! Render request parameters and their validation.
//!
//! The render worker splits the image into 4x4 tiles, so both dimensions
//! must be multiples of [`TILE_SIZE`].

use crate::error::CoreError;

/// Tile edge length used by the render worker.
pub const TILE_SIZE: u32 = 4;

/// Parameters staged in the side store for one render job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderParams {
    pub width: u32,
    pub height: u32,
    pub samples: u32,
    /// Opaque scene payload forwarded to the worker untouched.
    pub scene: Vec<u8>,
}

impl RenderParams {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_dimensions(self.width, self.height)?;
        validate_samples(self.samples)
    }
}

/// Validate that width and height are positive multiples of [`TILE_SIZE`].
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), CoreError> {
    if width == 0 || height == 0 {
        return Err(CoreError::Validation(
            "Width and Height must be greater than 0".to_string(),
        ));
    }
    if width % TILE_SIZE != 0 || height % TILE_SIZE != 0 {
        return Err(CoreError::Validation(format!(
            "Width and Height have to be divisible by {TILE_SIZE} (got {width}x{height})"
        )));
    }
    Ok(())
}

pub fn validate_samples(samples: u32) -> Result<(), CoreError> {
    if samples == 0 {
        return Err(CoreError::Validation(
            "Sample count must be a positive integer".to_string(),
        ));
    }
    Ok(())
}
