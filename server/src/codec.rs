//! PNG data URL codec
//!
//! Images travel over the socket as `data:image/png;base64,<payload>` strings.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, ImageFormat, ImageReader, Limits, RgbaImage};
use std::io::Cursor;
use thiserror::Error;

/// Fixed prefix of every data URL on the wire
pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Default upper bound for decoded image width and height
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

/// Default upper bound for decoded width * height (2048 x 2048)
///
/// Solver memory grows with the pixel count, several f64 buffers per pixel.
pub const DEFAULT_MAX_PIXELS: u64 = 2048 * 2048;

/// Errors that can occur while decoding or encoding data URLs
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Data URL must start with '{DATA_URL_PREFIX}'")]
    MissingPrefix,

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid PNG image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image {width}x{height} exceeds the {max}x{max} limit")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("Image {width}x{height} exceeds the {max_pixels} pixel limit")]
    TooManyPixels {
        width: u32,
        height: u32,
        max_pixels: u64,
    },

    #[error("Stroke image has no alpha channel")]
    MissingAlpha,
}

/// Decode limits applied to untrusted images
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    pub max_dimension: u32,
    pub max_pixels: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

/// Decode a PNG data URL into an RGBA pixel grid (alpha retained)
pub fn decode_data_url(data_url: &str, limits: DecodeLimits) -> Result<RgbaImage, CodecError> {
    Ok(decode_image_data_url(data_url, limits)?.into_rgba8())
}

/// Decode a PNG data URL keeping the PNG's own colour type and bit depth
pub fn decode_image_data_url(
    data_url: &str,
    limits: DecodeLimits,
) -> Result<DynamicImage, CodecError> {
    let payload = data_url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or(CodecError::MissingPrefix)?;

    // Payloads from some encoders are wrapped at 76 columns
    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let bytes = BASE64.decode(compact)?;

    let (width, height) =
        ImageReader::with_format(Cursor::new(&bytes), ImageFormat::Png).into_dimensions()?;
    if width > limits.max_dimension || height > limits.max_dimension {
        return Err(CodecError::TooLarge {
            width,
            height,
            max: limits.max_dimension,
        });
    }
    if width as u64 * height as u64 > limits.max_pixels {
        return Err(CodecError::TooManyPixels {
            width,
            height,
            max_pixels: limits.max_pixels,
        });
    }

    let mut image_limits = Limits::default();
    image_limits.max_image_width = Some(limits.max_dimension);
    image_limits.max_image_height = Some(limits.max_dimension);
    let mut reader = ImageReader::with_format(Cursor::new(&bytes), ImageFormat::Png);
    reader.limits(image_limits);

    Ok(reader.decode()?)
}

/// Encode an image as a PNG data URL (no line wrapping)
pub fn encode_data_url(image: &DynamicImage) -> Result<String, CodecError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;

    let encoded_len = buffer.get_ref().len().div_ceil(3) * 4;
    let mut url = String::with_capacity(DATA_URL_PREFIX.len() + encoded_len);
    url.push_str(DATA_URL_PREFIX);
    BASE64.encode_string(buffer.get_ref(), &mut url);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba};

    fn checkerboard(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 { Luma([255]) } else { Luma([0]) }
        })
    }

    #[test]
    fn test_mask_roundtrip_is_pixel_exact() {
        let mask = checkerboard(17, 9);
        let url = encode_data_url(&DynamicImage::ImageLuma8(mask.clone())).unwrap();
        assert!(url.starts_with(DATA_URL_PREFIX));

        let decoded = decode_data_url(&url, DecodeLimits::default()).unwrap();
        assert_eq!(decoded.dimensions(), (17, 9));
        for (x, y, pixel) in decoded.enumerate_pixels() {
            let expected = mask.get_pixel(x, y)[0];
            assert_eq!(*pixel, Rgba([expected, expected, expected, 255]));
        }
    }

    #[test]
    fn test_alpha_channel_is_retained() {
        let mut stroke = RgbaImage::new(4, 4);
        stroke.put_pixel(1, 2, Rgba([10, 20, 30, 200]));
        let url = encode_data_url(&DynamicImage::ImageRgba8(stroke.clone())).unwrap();

        let decoded = decode_data_url(&url, DecodeLimits::default()).unwrap();
        assert_eq!(decoded, stroke);
    }

    #[test]
    fn test_wrapped_base64_is_accepted() {
        let url = encode_data_url(&DynamicImage::ImageLuma8(checkerboard(32, 32))).unwrap();
        let payload = &url[DATA_URL_PREFIX.len()..];
        let wrapped: String = payload
            .as_bytes()
            .chunks(76)
            .map(|line| format!("{}\n", std::str::from_utf8(line).unwrap()))
            .collect();

        let decoded = decode_data_url(
            &format!("{DATA_URL_PREFIX}{wrapped}"),
            DecodeLimits::default(),
        );
        assert!(decoded.is_ok());
    }

    #[test]
    fn test_missing_prefix() {
        let result = decode_data_url("data:image/jpeg;base64,AAAA", DecodeLimits::default());
        assert!(matches!(result, Err(CodecError::MissingPrefix)));
    }

    #[test]
    fn test_corrupted_base64() {
        let result = decode_data_url(
            &format!("{DATA_URL_PREFIX}@@not*base64@@"),
            DecodeLimits::default(),
        );
        assert!(matches!(result, Err(CodecError::Base64(_))));
    }

    #[test]
    fn test_not_a_png() {
        let url = format!("{DATA_URL_PREFIX}{}", BASE64.encode(b"definitely not a png"));
        let result = decode_data_url(&url, DecodeLimits::default());
        assert!(matches!(result, Err(CodecError::Image(_))));
    }

    #[test]
    fn test_dimension_limit() {
        let url = encode_data_url(&DynamicImage::ImageLuma8(checkerboard(64, 8))).unwrap();
        let limits = DecodeLimits {
            max_dimension: 32,
            ..DecodeLimits::default()
        };
        let result = decode_data_url(&url, limits);
        assert!(matches!(
            result,
            Err(CodecError::TooLarge {
                width: 64,
                height: 8,
                max: 32
            })
        ));
    }

    #[test]
    fn test_pixel_limit() {
        let url = encode_data_url(&DynamicImage::ImageLuma8(checkerboard(64, 8))).unwrap();
        let limits = DecodeLimits {
            max_dimension: 64,
            max_pixels: 64 * 8 - 1,
        };
        assert!(matches!(
            decode_data_url(&url, limits),
            Err(CodecError::TooManyPixels {
                width: 64,
                height: 8,
                ..
            })
        ));

        let limits = DecodeLimits {
            max_pixels: 64 * 8,
            ..limits
        };
        assert!(decode_data_url(&url, limits).is_ok());
    }

    #[test]
    fn test_decoded_image_keeps_colour_type() {
        let url = encode_data_url(&DynamicImage::ImageLuma8(checkerboard(4, 4))).unwrap();
        let image = decode_image_data_url(&url, DecodeLimits::default()).unwrap();
        assert!(!image.color().has_alpha());
    }
}
