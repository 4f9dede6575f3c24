//! Fixtures shared by the daemon's tests.
//!
//! [`SolidColorExtractor`] treats an image whose top-left pixel has a fully
//! blue channel as containing exactly one face, with the descriptor taken
//! from the red and green channels. Anything else has no face.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use facecard_core::{BoundingBox, Descriptor, DescriptorExtractor, DetectedFace, ExtractError};
use facecard_store::{NewIdentity, Store};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tempfile::TempDir;

pub struct SolidColorExtractor;

impl DescriptorExtractor for SolidColorExtractor {
    fn dimension(&self) -> usize {
        2
    }

    fn extract(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ExtractError> {
        let Rgb([r, g, b]) = *image.get_pixel(0, 0);
        if b != u8::MAX {
            return Ok(Vec::new());
        }
        Ok(vec![DetectedFace {
            descriptor: Descriptor::new(vec![r as f64 / 255.0, g as f64 / 255.0]),
            bbox: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: image.width() as f32,
                height: image.height() as f32,
                confidence: 0.99,
                landmarks: None,
            },
        }])
    }
}

/// An extractor whose every call fails.
pub struct BrokenExtractor;

impl DescriptorExtractor for BrokenExtractor {
    fn dimension(&self) -> usize {
        2
    }

    fn extract(&mut self, _image: &RgbImage) -> Result<Vec<DetectedFace>, ExtractError> {
        Err(ExtractError::Other("backend unavailable".into()))
    }
}

pub fn store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path().join("facecard.db"));
    store.init_schema().unwrap();
    (dir, store)
}

/// Register `name` with the descriptor a [`solid_image`] of `rg` would yield.
pub fn register(store: &Store, name: &str, rg: [f64; 2]) -> i64 {
    store
        .insert_identity(&NewIdentity {
            name: name.to_string(),
            age: 30,
            email: Some(format!("{}@example.com", name.to_lowercase())),
            phone: None,
            image_path: None,
            descriptor: Descriptor::new(rg.to_vec()),
        })
        .unwrap()
}

pub fn solid_image(rg: [f64; 2]) -> RgbImage {
    let channel = |v: f64| (v * 255.0).round() as u8;
    RgbImage::from_pixel(8, 8, Rgb([channel(rg[0]), channel(rg[1]), u8::MAX]))
}

pub fn faceless_image() -> RgbImage {
    RgbImage::from_pixel(8, 8, Rgb([40, 40, 40]))
}

/// `image` as a PNG data URL, the way browsers post it.
pub fn data_url(image: &RgbImage) -> String {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
