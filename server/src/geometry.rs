//! Geometry extraction from raw request fields
//!
//! Clients send coordinates as loosely typed JSON numbers (the browser client
//! computes them from a scaled canvas, so they are often fractional). This
//! module turns those fields into typed [`Rect`] and [`Offset`] values.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while extracting geometry fields
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Field '{0}' is not an integer")]
    NotAnInteger(&'static str),

    #[error("Field '{0}' must not be negative")]
    Negative(&'static str),
}

/// Rectangular region of interest in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Position of an annotation patch's top-left corner within the full mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub left: i64,
    pub top: i64,
}

impl Rect {
    pub const FIELDS: [&'static str; 4] = ["left", "top", "width", "height"];

    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Build a rectangle from `{left, top, width, height}`
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, GeometryError> {
        let values = extract_fields(fields, Self::FIELDS)?;
        let mut out = [0u32; 4];
        for ((slot, value), key) in out.iter_mut().zip(values).zip(Self::FIELDS) {
            if value < 0 {
                return Err(GeometryError::Negative(key));
            }
            *slot = u32::try_from(value).map_err(|_| GeometryError::NotAnInteger(key))?;
        }
        let [left, top, width, height] = out;
        Ok(Self::new(left, top, width, height))
    }

    pub fn right(&self) -> u64 {
        self.left as u64 + self.width as u64
    }

    pub fn bottom(&self) -> u64 {
        self.top as u64 + self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (x as u64) >= self.left as u64
            && (x as u64) < self.right()
            && (y as u64) >= self.top as u64
            && (y as u64) < self.bottom()
    }

    /// Intersect with a `width` x `height` image anchored at the origin
    pub fn clip_to(&self, width: u32, height: u32) -> Rect {
        let left = self.left.min(width);
        let top = self.top.min(height);
        let right = self.right().min(width as u64) as u32;
        let bottom = self.bottom().min(height as u64) as u32;
        Rect::new(left, top, right - left, bottom - top)
    }
}

impl Offset {
    pub const FIELDS: [&'static str; 2] = ["left", "top"];

    pub fn new(left: i64, top: i64) -> Self {
        Self { left, top }
    }

    /// Build an offset from `{left, top}`
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, GeometryError> {
        let [left, top] = extract_fields(fields, Self::FIELDS)?;
        Ok(Self::new(left, top))
    }
}

/// Extract integer values for `keys`, in the order given
pub fn extract_fields<const N: usize>(
    fields: &Map<String, Value>,
    keys: [&'static str; N],
) -> Result<[i64; N], GeometryError> {
    let mut out = [0i64; N];
    for (slot, key) in out.iter_mut().zip(keys) {
        let value = fields.get(key).ok_or(GeometryError::MissingField(key))?;
        *slot = coerce_integer(value).ok_or(GeometryError::NotAnInteger(key))?;
    }
    Ok(out)
}

/// Integer coercion: integers as-is, finite floats truncated toward zero,
/// decimal strings parsed.
fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else if n.is_u64() {
                None
            } else {
                let f = n.as_f64()?;
                let t = f.trunc();
                if f.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
                    Some(t as i64)
                } else {
                    None
                }
            }
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
