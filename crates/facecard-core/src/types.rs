use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size in bytes of one serialized descriptor component (little-endian `f64`).
pub const DESCRIPTOR_COMPONENT_BYTES: usize = std::mem::size_of::<f64>();

#[derive(Error, Debug, PartialEq)]
pub enum DescriptorError {
    #[error("descriptor blob has {actual} bytes, expected {expected}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Fixed-length face descriptor produced by a [`DescriptorExtractor`](crate::DescriptorExtractor).
///
/// Stored as a raw little-endian `f64` blob; the dimensionality is fixed by
/// the extractor and constant across a gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f64>,
}

impl Descriptor {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Number of components.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Euclidean distance in descriptor space. Lower = more similar.
    pub fn distance(&self, other: &Descriptor) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Serialize as a little-endian `f64` byte blob.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.values.len() * DESCRIPTOR_COMPONENT_BYTES);
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Decode a little-endian `f64` blob of exactly `dimension` components.
    pub fn from_le_bytes(bytes: &[u8], dimension: usize) -> Result<Self, DescriptorError> {
        let expected = dimension * DESCRIPTOR_COMPONENT_BYTES;
        if bytes.len() != expected {
            return Err(DescriptorError::InvalidLength {
                expected,
                actual: bytes.len(),
            });
        }

        let values = bytes
            .chunks_exact(DESCRIPTOR_COMPONENT_BYTES)
            .map(|chunk| {
                let mut raw = [0u8; DESCRIPTOR_COMPONENT_BYTES];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();

        Ok(Self { values })
    }
}

impl From<Vec<f64>> for Descriptor {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// One face found in an image: its descriptor and where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub descriptor: Descriptor,
    pub bbox: BoundingBox,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identical() {
        let a = Descriptor::new(vec![0.25, -1.0, 3.0]);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_distance_pythagorean() {
        let a = Descriptor::new(vec![0.0, 0.0]);
        let b = Descriptor::new(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
        assert!((b.distance(&a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_blob_layout_is_little_endian_f64() {
        let d = Descriptor::new(vec![1.0, -2.5]);
        let blob = d.to_le_bytes();
        assert_eq!(blob.len(), 16);
        assert_eq!(&blob[..8], &1.0f64.to_le_bytes());
        assert_eq!(&blob[8..], &(-2.5f64).to_le_bytes());
        assert_eq!(Descriptor::from_le_bytes(&blob, 2).unwrap(), d);
    }

    #[test]
    fn test_blob_wrong_length_rejected() {
        let blob = vec![0u8; 20];
        let err = Descriptor::from_le_bytes(&blob, 2).unwrap_err();
        assert_eq!(
            err,
            DescriptorError::InvalidLength {
                expected: 16,
                actual: 20
            }
        );
    }
}
