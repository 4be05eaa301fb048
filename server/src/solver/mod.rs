//! Segmentation solvers
//!
//! This module provides:
//! - `SegmentationSolver` trait for abstracting the segmentation backend
//! - `GrabCutSolver`, a colour-model + smoothness solver
//! - `SolverPool` for running solver calls off the async event loop

mod gmm;
mod grabcut;
mod pool;

pub use grabcut::{GrabCutSettings, GrabCutSolver};
pub use pool::SolverPool;

use crate::geometry::Rect;
use crate::mask::Mask;
use image::RgbImage;
use thiserror::Error;

/// Errors raised by a solver or the worker running it
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("No {0} samples to build a colour model from")]
    EmptyModel(&'static str),

    #[error("Mask is {mask_width}x{mask_height} but image is {image_width}x{image_height}")]
    ShapeMismatch {
        image_width: u32,
        image_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    #[error("Solver worker failed: {0}")]
    Worker(String),

    #[error("Solver pool is shut down")]
    Unavailable,
}

impl SolverError {
    pub(crate) fn check_shape(image: &RgbImage, mask: &Mask) -> Result<(), SolverError> {
        if image.dimensions() == mask.dimensions() {
            Ok(())
        } else {
            Err(SolverError::ShapeMismatch {
                image_width: image.width(),
                image_height: image.height(),
                mask_width: mask.width(),
                mask_height: mask.height(),
            })
        }
    }
}

/// Trait for segmentation backends
///
/// Both calls are synchronous and CPU-bound; callers on the async runtime go
/// through [`SolverPool`].
pub trait SegmentationSolver: Send + Sync {
    /// Segment `image` from a rectangle: outside is fixed background, inside
    /// is reconsidered
    fn init_with_rect(&self, image: &RgbImage, rect: Rect) -> Result<Mask, SolverError>;

    /// Re-segment using `mask` as a trimap: definite labels are kept,
    /// probable labels are reconsidered
    fn refine_with_mask(&self, image: &RgbImage, mask: &Mask) -> Result<Mask, SolverError>;

    /// Short backend name for logs and health reporting
    fn name(&self) -> &'static str;
}
