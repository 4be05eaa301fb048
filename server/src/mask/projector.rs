//! Binary visualization of a label mask

use super::Mask;
use crate::codec::{CodecError, encode_data_url};
use image::{DynamicImage, GrayImage};

/// Foreground (definite or probable) becomes 255, everything else 0
pub fn project(mask: &Mask) -> GrayImage {
    let pixels = mask
        .labels()
        .iter()
        .map(|label| if label.is_foreground() { 255 } else { 0 })
        .collect();
    // Length always equals width * height
    GrayImage::from_raw(mask.width(), mask.height(), pixels)
        .unwrap_or_else(|| GrayImage::new(mask.width(), mask.height()))
}

/// Project and encode as a PNG data URL for transport
pub fn project_data_url(mask: &Mask) -> Result<String, CodecError> {
    encode_data_url(&DynamicImage::ImageLuma8(project(mask)))
}
