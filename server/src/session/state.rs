use crate::codec::{DEFAULT_MAX_DIMENSION, DEFAULT_MAX_PIXELS};
use crate::mask::Mask;
use image::RgbImage;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Events that arrive before the session is ready for them
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("No image loaded: send an image before a selection")]
    NoImage,

    #[error("No mask yet: send a selection before annotating")]
    NoMask,
}

/// Lifecycle of one segmentation session
///
/// `Empty -> ImageLoaded -> Initialized -> Refining`. A new image always
/// returns to `ImageLoaded` and drops the mask; a new selection always
/// returns to `Initialized`.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Empty,
    ImageLoaded {
        image: Arc<RgbImage>,
    },
    Initialized {
        image: Arc<RgbImage>,
        mask: Arc<Mask>,
    },
    Refining {
        image: Arc<RgbImage>,
        mask: Arc<Mask>,
        refinements: u32,
    },
}

impl SessionState {
    /// Every value `name()` can return
    pub const NAMES: [&'static str; 4] = ["empty", "image_loaded", "initialized", "refining"];

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::ImageLoaded { .. } => "image_loaded",
            SessionState::Initialized { .. } => "initialized",
            SessionState::Refining { .. } => "refining",
        }
    }

    pub fn image(&self) -> Option<&Arc<RgbImage>> {
        match self {
            SessionState::Empty => None,
            SessionState::ImageLoaded { image }
            | SessionState::Initialized { image, .. }
            | SessionState::Refining { image, .. } => Some(image),
        }
    }

    pub fn mask(&self) -> Option<&Arc<Mask>> {
        match self {
            SessionState::Initialized { mask, .. } | SessionState::Refining { mask, .. } => {
                Some(mask)
            }
            _ => None,
        }
    }

    /// Number of mask-based refinements since the last selection
    pub fn refinements(&self) -> u32 {
        match self {
            SessionState::Refining { refinements, .. } => *refinements,
            _ => 0,
        }
    }

    pub fn require_image(&self) -> Result<&Arc<RgbImage>, StateError> {
        self.image().ok_or(StateError::NoImage)
    }

    pub fn require_mask(&self) -> Result<(&Arc<RgbImage>, &Arc<Mask>), StateError> {
        match self {
            SessionState::Initialized { image, mask } | SessionState::Refining { image, mask, .. } => {
                Ok((image, mask))
            }
            _ => Err(StateError::NoMask),
        }
    }

    /// Any state -> `ImageLoaded`
    pub fn load_image(self, image: Arc<RgbImage>) -> SessionState {
        SessionState::ImageLoaded { image }
    }

    /// `ImageLoaded | Initialized | Refining -> Initialized`
    pub fn initialize(self, mask: Mask) -> Result<SessionState, StateError> {
        let image = self.require_image()?.clone();
        debug_assert_eq!(image.dimensions(), mask.dimensions());
        Ok(SessionState::Initialized {
            image,
            mask: Arc::new(mask),
        })
    }

    /// `Initialized | Refining -> Refining`
    pub fn refine(self, mask: Mask) -> Result<SessionState, StateError> {
        let refinements = self.refinements() + 1;
        let (image, _) = self.require_mask()?;
        debug_assert_eq!(image.dimensions(), mask.dimensions());
        Ok(SessionState::Refining {
            image: image.clone(),
            mask: Arc::new(mask),
            refinements,
        })
    }
}

/// Per-session limits
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub max_image_dimension: u32,
    pub max_image_pixels: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: DEFAULT_MAX_DIMENSION,
            max_image_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

/// Get current timestamp in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
