//! Descriptor extraction capability.
//!
//! Anything that turns an image into per-face descriptors can back the
//! matcher: the ONNX pipeline in [`crate::onnx`], or a fake in tests.

use crate::detector::DetectorError;
use crate::recognizer::RecognizerError;
use crate::types::DetectedFace;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("extraction failed: {0}")]
    Other(String),
}

/// Turns a decoded image into zero or more face descriptors.
pub trait DescriptorExtractor {
    /// Descriptor dimensionality produced by this extractor.
    fn dimension(&self) -> usize;

    /// Detect faces and return one descriptor per face, in detection order.
    /// An image without faces yields an empty vector, not an error.
    fn extract(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ExtractError>;
}

impl<T: DescriptorExtractor + ?Sized> DescriptorExtractor for Box<T> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn extract(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ExtractError> {
        (**self).extract(image)
    }
}
