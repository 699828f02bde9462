//! Text extractor backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use image::GenericImageView;
use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::models::config::OcrConfig;

use super::{TextExtractor, TextRegion, decode_upload, join_reading_order};

/// OCR text extractor using PaddleOCR detection and recognition models.
///
/// Models are loaded on first use and kept for the life of the extractor.
pub struct OnnxTextExtractor {
    det_path: PathBuf,
    rec_path: PathBuf,
    dict_path: PathBuf,
    replace_unknown: bool,
    engine: Mutex<Option<pure_onnx_ocr::engine::OcrEngine>>,
}

impl OnnxTextExtractor {
    /// Create an extractor reading model files named in the config.
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            det_path: config.model_dir.join(&config.detection_model),
            rec_path: config.model_dir.join(&config.recognition_model),
            dict_path: config.model_dir.join(&config.dictionary),
            replace_unknown: config.replace_unknown,
            engine: Mutex::new(None),
        }
    }

    /// Check that every model file is present.
    pub fn models_present(&self) -> bool {
        [&self.det_path, &self.rec_path, &self.dict_path]
            .iter()
            .all(|p| p.exists())
    }

    fn build_engine(&self) -> Result<pure_onnx_ocr::engine::OcrEngine, ExtractionError> {
        for path in [&self.det_path, &self.rec_path, &self.dict_path] {
            if !path.exists() {
                return Err(ExtractionError::ModelLoad(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&self.det_path)
            .rec_model_path(&self.rec_path)
            .dictionary_path(&self.dict_path)
            .build()
            .map_err(|e| ExtractionError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", self.det_path.display());
        Ok(engine)
    }
}

impl TextExtractor for OnnxTextExtractor {
    fn extract(&self, image_bytes: &[u8]) -> Result<String, ExtractionError> {
        let image = decode_upload(image_bytes)?;
        let start = Instant::now();
        let (width, height) = image.dimensions();
        debug!("Running OCR on {}x{} image", width, height);

        let mut guard = self
            .engine
            .lock()
            .map_err(|_| ExtractionError::Engine("OCR engine lock poisoned".to_string()))?;
        if guard.is_none() {
            *guard = Some(self.build_engine()?);
        }
        let Some(engine) = guard.as_ref() else {
            return Err(ExtractionError::ModelLoad("engine unavailable".to_string()));
        };

        let results = engine
            .run_from_image(&image)
            .map_err(|e| ExtractionError::Engine(format!("pure-onnx-ocr: {}", e)))?;

        let mut regions: Vec<TextRegion> = results
            .iter()
            .map(|r| TextRegion {
                bbox: polygon_to_bbox(&r.bounding_box),
                text: if self.replace_unknown {
                    r.text.replace("[UNK]", " ")
                } else {
                    r.text.clone()
                },
                confidence: r.confidence,
            })
            .collect();

        let text = join_reading_order(&mut regions);

        info!(
            "OCR complete: {} regions in {}ms",
            regions.len(),
            start.elapsed().as_millis()
        );

        if text.trim().is_empty() {
            return Err(ExtractionError::NoText);
        }
        Ok(text)
    }
}

/// Convert a `Polygon<f64>` to the `[f32; 8]` quadrilateral layout.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}
