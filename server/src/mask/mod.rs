//! Label masks and the operations clients drive on them
//!
//! - [`Mask`]: per-pixel labels over the four-value [`Label`] enumeration
//! - [`compositor`]: merging client paint strokes into a mask
//! - [`projector`]: turning a mask into a binary 0/255 visualization

pub mod compositor;
pub mod projector;

pub use compositor::{ActionKind, AnnotationPatch};
pub use projector::{project, project_data_url};

use thiserror::Error;

/// Per-pixel segmentation label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Label {
    Background = 0,
    Foreground = 1,
    ProbableBackground = 2,
    ProbableForeground = 3,
}

impl Label {
    pub const ALL: [Label; 4] = [
        Label::Background,
        Label::Foreground,
        Label::ProbableBackground,
        Label::ProbableForeground,
    ];

    /// Definite or probable foreground
    pub fn is_foreground(self) -> bool {
        matches!(self, Label::Foreground | Label::ProbableForeground)
    }

    /// Definite labels are fixed hints the solver must not change
    pub fn is_fixed(self) -> bool {
        matches!(self, Label::Foreground | Label::Background)
    }
}

impl TryFrom<u8> for Label {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::Background),
            1 => Ok(Label::Foreground),
            2 => Ok(Label::ProbableBackground),
            3 => Ok(Label::ProbableForeground),
            other => Err(other),
        }
    }
}

/// A region that does not fit inside the mask or image it targets
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "Region {width}x{height} at ({left}, {top}) does not fit inside {bound_width}x{bound_height}"
)]
pub struct BoundsError {
    pub left: i64,
    pub top: i64,
    pub width: u32,
    pub height: u32,
    pub bound_width: u32,
    pub bound_height: u32,
}

/// Row-major grid of labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    labels: Vec<Label>,
}

impl Mask {
    /// Mask of `width` x `height` filled with `label`
    pub fn filled(width: u32, height: u32, label: Label) -> Self {
        Self {
            width,
            height,
            labels: vec![label; width as usize * height as usize],
        }
    }

    /// Build from raw labels; `None` if the length does not match
    pub fn from_labels(width: u32, height: u32, labels: Vec<Label>) -> Option<Self> {
        (labels.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            labels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn get(&self, x: u32, y: u32) -> Label {
        self.labels[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, label: Label) {
        let idx = self.index(x, y);
        self.labels[idx] = label;
    }

    /// Number of cells holding `label`
    pub fn count(&self, label: Label) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }
}
