//! facecard-core — face descriptors and identity matching.
//!
//! A [`DescriptorExtractor`] turns an image into per-face descriptors; a
//! [`Gallery`] of known descriptors is searched with a [`Matcher`] strategy.
//! The bundled extractor runs SCRFD detection and ArcFace recognition via
//! ONNX Runtime.

pub mod alignment;
pub mod detector;
pub mod extractor;
pub mod gallery;
pub mod identify;
pub mod matcher;
pub mod onnx;
pub mod payload;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use extractor::{DescriptorExtractor, ExtractError};
pub use gallery::{Gallery, GalleryError, GalleryMatch};
pub use identify::{identify, identify_all, FaceIdentification, IdentifyError, DEFAULT_TOLERANCE};
pub use matcher::{FirstMatchMatcher, MatchPolicy, MatchResult, Matcher, NearestMatcher};
pub use onnx::OnnxExtractor;
pub use types::{BoundingBox, Descriptor, DescriptorError, DetectedFace};

/// Base directory for facecard data: `$XDG_DATA_HOME/facecard`, falling back
/// to `~/.local/share/facecard`.
pub fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facecard")
}

/// Default directory holding the ONNX model files.
pub fn default_model_dir() -> PathBuf {
    default_data_dir().join("models")
}
