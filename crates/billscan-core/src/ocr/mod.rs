//! Text extraction from receipt images.

#[cfg(feature = "native")]
mod onnx;

#[cfg(feature = "native")]
pub use onnx::OnnxTextExtractor;

use std::io::Write;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// Turns image bytes into plain text.
///
/// Implementations are blocking; async callers run them on a blocking
/// worker.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, image_bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// A recognized text region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRegion {
    /// Quadrilateral corners (x1, y1, x2, y2, x3, y3, x4, y4).
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl TextRegion {
    /// Get the top-left corner of the axis-aligned bounding rectangle.
    pub fn top_left(&self) -> (f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];
        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        (min_x, min_y)
    }
}

/// Row height, in pixels, within which regions count as one line.
const ROW_BAND: f32 = 20.0;

/// Join regions into text in reading order (top-to-bottom, left-to-right).
pub fn join_reading_order(regions: &mut [TextRegion]) -> String {
    regions.sort_by(|a, b| {
        let (ax, ay) = a.top_left();
        let (bx, by) = b.top_left();
        let row_a = (ay / ROW_BAND) as i32;
        let row_b = (by / ROW_BAND) as i32;
        if row_a != row_b {
            row_a.cmp(&row_b)
        } else {
            ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal)
        }
    });

    regions
        .iter()
        .map(|r| r.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode upload bytes into an image.
///
/// The bytes are spooled to a temporary file that is removed when this
/// function returns, whether decoding succeeds or not.
pub fn decode_upload(image_bytes: &[u8]) -> Result<DynamicImage, ExtractionError> {
    if image_bytes.is_empty() {
        return Err(ExtractionError::Decode("empty upload".to_string()));
    }

    let mut spool = tempfile::NamedTempFile::new()?;
    spool.write_all(image_bytes)?;
    spool.flush()?;

    image::ImageReader::open(spool.path())?
        .with_guessed_format()?
        .decode()
        .map_err(|e| ExtractionError::Decode(e.to_string()))
}
