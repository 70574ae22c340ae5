use std::borrow::Cow;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::AppError;

/// Target length for the encoded image, kept under the store's 2000 char field.
pub const CHAR_BUDGET: usize = 1500;
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const START_WIDTH: f32 = 250.0;
const START_QUALITY: f32 = 0.3;
const QUALITY_FACTOR: f32 = 0.6;
const QUALITY_FLOOR: f32 = 0.05;
const WIDTH_FACTOR: f32 = 0.75;
const WIDTH_FLOOR: f32 = 100.0;
const MAX_ATTEMPTS: u32 = 12;
const FINAL_WIDTH: u32 = 80;
const FINAL_QUALITY: f32 = 0.05;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compressed {
    Fits { data_url: String, attempts: u32 },
    /// Nothing fit; the oversized payload is dropped so it can never be written.
    TooLarge { length: usize, attempts: u32 },
}

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("File must be an image")]
    NotAnImage,
    #[error("Image must be at most 10MB (got {0} bytes)")]
    TooBig(usize),
    #[error("Could not read image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image encoding failed")]
    Encode(#[source] anyhow::Error),
}

impl From<CompressError> for AppError {
    fn from(err: CompressError) -> Self {
        match err {
            CompressError::Encode(e) => AppError::Internal(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

/// Runs the reduction schedule against `encode(width, quality)` until the
/// output fits `budget`.
///
/// Odd attempts lower quality, even attempts lower width. After
/// `MAX_ATTEMPTS` one last pass runs at 80px / 0.05.
pub fn compress_with<F>(budget: usize, mut encode: F) -> anyhow::Result<Compressed>
where
    F: FnMut(u32, f32) -> anyhow::Result<String>,
{
    let mut width = START_WIDTH;
    let mut quality = START_QUALITY;
    let mut attempts = 0;
    let mut encoded = encode(width.round() as u32, quality)?;

    while encoded.len() > budget && attempts < MAX_ATTEMPTS {
        attempts += 1;
        if attempts % 2 == 0 {
            width = (width * WIDTH_FACTOR).max(WIDTH_FLOOR);
        } else {
            quality = (quality * QUALITY_FACTOR).max(QUALITY_FLOOR);
        }
        debug!(attempts, width, quality, size = encoded.len(), "compression attempt");
        encoded = encode(width.round() as u32, quality)?;
    }

    if encoded.len() > budget {
        attempts += 1;
        encoded = encode(FINAL_WIDTH, FINAL_QUALITY)?;
        if encoded.len() > budget {
            warn!(size = encoded.len(), budget, "image still too large after maximum compression");
            return Ok(Compressed::TooLarge {
                length: encoded.len(),
                attempts,
            });
        }
    }

    Ok(Compressed::Fits {
        data_url: encoded,
        attempts,
    })
}

/// A decoded image that can be re-encoded as a JPEG data URL at any size.
pub struct DataUrlEncoder {
    image: DynamicImage,
}

impl DataUrlEncoder {
    pub fn decode(bytes: &[u8]) -> Result<Self, CompressError> {
        Ok(Self {
            image: image::load_from_memory(bytes)?,
        })
    }

    /// Shrinks the longer side to `width` (never enlarges) and encodes at `quality` in 0..=1.
    pub fn encode(&self, width: u32, quality: f32) -> anyhow::Result<String> {
        let longest = self.image.width().max(self.image.height());
        let scaled: Cow<'_, DynamicImage> = if longest > width {
            Cow::Owned(self.image.resize(width, width, FilterType::Triangle))
        } else {
            Cow::Borrowed(&self.image)
        };

        let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(scaled.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, q))?;

        Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(&buf)))
    }
}

/// Validates an upload and compresses it to fit `CHAR_BUDGET`.
pub fn compress_upload(content_type: Option<&str>, bytes: &[u8]) -> Result<Compressed, CompressError> {
    if !content_type.is_some_and(|ct| ct.starts_with("image/")) {
        return Err(CompressError::NotAnImage);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CompressError::TooBig(bytes.len()));
    }
    let encoder = DataUrlEncoder::decode(bytes)?;
    compress_with(CHAR_BUDGET, |w, q| encoder.encode(w, q)).map_err(CompressError::Encode)
}
