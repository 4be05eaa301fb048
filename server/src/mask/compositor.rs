//! Compositing of client paint strokes into a label mask

use super::{BoundsError, Label, Mask};
use crate::geometry::Offset;
use image::DynamicImage;

/// What a paint stroke asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Add,
    Remove,
}

impl ActionKind {
    /// `"add"` is the only additive action; every other string removes
    pub fn from_wire(action: &str) -> Self {
        if action == "add" {
            ActionKind::Add
        } else {
            ActionKind::Remove
        }
    }

    /// Label written into touched cells. Adding is definite, removing is only
    /// probable so the solver may reconsider it.
    pub fn label(self) -> Label {
        match self {
            ActionKind::Add => Label::Foreground,
            ActionKind::Remove => Label::ProbableBackground,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Add => "add",
            ActionKind::Remove => "remove",
        }
    }
}

/// A paint stroke: which cells of a small sub-image the client touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationPatch {
    width: u32,
    height: u32,
    touched: Vec<bool>,
}

impl AnnotationPatch {
    /// Cells with a nonzero alpha are touched
    ///
    /// Alpha is read at the image's own bit depth, so any nonzero 16-bit
    /// alpha counts. `None` if the image has no alpha channel.
    pub fn from_stroke(stroke: &DynamicImage) -> Option<Self> {
        if !stroke.color().has_alpha() {
            return None;
        }
        let alpha = stroke.to_rgba16();
        Some(Self {
            width: alpha.width(),
            height: alpha.height(),
            touched: alpha.pixels().map(|p| p[3] != 0).collect(),
        })
    }

    /// Build from a row-major touched grid; `None` if the length does not match
    pub fn from_touched(width: u32, height: u32, touched: Vec<bool>) -> Option<Self> {
        (touched.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            touched,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_touched(&self, x: u32, y: u32) -> bool {
        self.touched[y as usize * self.width as usize + x as usize]
    }

    pub fn touched_count(&self) -> usize {
        self.touched.iter().filter(|&&t| t).count()
    }
}

impl Mask {
    /// Return a copy of this mask with every touched patch cell, placed at
    /// `offset`, set to `label`. The patch must lie fully inside the mask.
    pub fn composite(
        &self,
        patch: &AnnotationPatch,
        offset: Offset,
        label: Label,
    ) -> Result<Mask, BoundsError> {
        let out_of_bounds = BoundsError {
            left: offset.left,
            top: offset.top,
            width: patch.width,
            height: patch.height,
            bound_width: self.width(),
            bound_height: self.height(),
        };
        let fits = |start: i64, extent: u32, bound: u32| {
            start >= 0
                && start
                    .checked_add(extent as i64)
                    .is_some_and(|end| end <= bound as i64)
        };
        if !fits(offset.left, patch.width, self.width())
            || !fits(offset.top, patch.height, self.height())
        {
            return Err(out_of_bounds);
        }

        let (left, top) = (offset.left as u32, offset.top as u32);
        let mut result = self.clone();
        for y in 0..patch.height {
            for x in 0..patch.width {
                if patch.is_touched(x, y) {
                    result.set(left + x, top + y, label);
                }
            }
        }
        Ok(result)
    }
}
