//! ONNX-backed [`DescriptorExtractor`]: SCRFD detection + ArcFace descriptors.

use crate::detector::FaceDetector;
use crate::extractor::{DescriptorExtractor, ExtractError};
use crate::recognizer::{FaceRecognizer, RecognizerError, ARCFACE_DESCRIPTOR_DIM};
use crate::types::DetectedFace;
use image::RgbImage;
use std::path::Path;

/// SCRFD detection model file name inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

pub struct OnnxExtractor {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxExtractor {
    /// Load both models from `model_dir`. Fails fast if either is missing.
    pub fn load(model_dir: &Path) -> Result<Self, ExtractError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE).to_string_lossy())?;
        let recognizer =
            FaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE).to_string_lossy())?;
        Ok(Self {
            detector,
            recognizer,
        })
    }
}

impl DescriptorExtractor for OnnxExtractor {
    fn dimension(&self) -> usize {
        ARCFACE_DESCRIPTOR_DIM
    }

    fn extract(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ExtractError> {
        let boxes = self.detector.detect(image)?;
        tracing::debug!(faces = boxes.len(), "onnx: detected");

        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            match self.recognizer.describe(image, &bbox) {
                Ok(descriptor) => faces.push(DetectedFace { descriptor, bbox }),
                Err(RecognizerError::NoLandmarks) => {
                    tracing::warn!(confidence = bbox.confidence, "face without landmarks skipped");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(faces)
    }
}
