//! Probe identification against a [`Gallery`].

use crate::extractor::{DescriptorExtractor, ExtractError};
use crate::gallery::{Gallery, GalleryError, GalleryMatch};
use crate::matcher::Matcher;
use crate::types::BoundingBox;
use image::RgbImage;
use thiserror::Error;

/// Default maximum descriptor distance for two faces to be the same identity.
pub const DEFAULT_TOLERANCE: f64 = 0.6;

#[derive(Error, Debug)]
pub enum IdentifyError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
}

/// Identification outcome for one detected face.
#[derive(Debug)]
pub struct FaceIdentification<'g, M> {
    pub bbox: BoundingBox,
    pub matched: Option<GalleryMatch<'g, M>>,
}

/// Identify every face in `image`, in detection order.
///
/// Faces without a match are reported with `matched: None`.
pub fn identify_all<'g, M, E>(
    extractor: &mut E,
    matcher: &dyn Matcher,
    gallery: &'g Gallery<M>,
    image: &RgbImage,
    tolerance: f64,
) -> Result<Vec<FaceIdentification<'g, M>>, IdentifyError>
where
    E: DescriptorExtractor + ?Sized,
{
    let faces = extractor.extract(image)?;
    tracing::debug!(faces = faces.len(), gallery = gallery.len(), "identify: extracted");

    faces
        .into_iter()
        .map(|face| {
            let matched = gallery.find(matcher, &face.descriptor, tolerance)?;
            Ok(FaceIdentification {
                bbox: face.bbox,
                matched,
            })
        })
        .collect()
}

/// Identify a single person in `image`.
///
/// Probes are tried in detection order; the first probe that matches any
/// gallery entry decides the result. No detected face is `Ok(None)`.
pub fn identify<'g, M, E>(
    extractor: &mut E,
    matcher: &dyn Matcher,
    gallery: &'g Gallery<M>,
    image: &RgbImage,
    tolerance: f64,
) -> Result<Option<GalleryMatch<'g, M>>, IdentifyError>
where
    E: DescriptorExtractor + ?Sized,
{
    let faces = extractor.extract(image)?;
    if faces.is_empty() {
        tracing::debug!("identify: no face detected");
        return Ok(None);
    }

    for face in &faces {
        if let Some(hit) = gallery.find(matcher, &face.descriptor, tolerance)? {
            return Ok(Some(hit));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::FirstMatchMatcher;
    use crate::types::{Descriptor, DetectedFace};

    /// Returns a canned list of descriptors regardless of the image.
    struct CannedExtractor {
        probes: Vec<Vec<f64>>,
    }

    impl DescriptorExtractor for CannedExtractor {
        fn dimension(&self) -> usize {
            2
        }

        fn extract(&mut self, _image: &RgbImage) -> Result<Vec<DetectedFace>, ExtractError> {
            Ok(self
                .probes
                .iter()
                .enumerate()
                .map(|(i, values)| DetectedFace {
                    descriptor: Descriptor::new(values.clone()),
                    bbox: BoundingBox {
                        x: i as f32 * 10.0,
                        y: 0.0,
                        width: 10.0,
                        height: 10.0,
                        confidence: 0.9,
                        landmarks: None,
                    },
                })
                .collect())
        }
    }

    struct FailingExtractor;

    impl DescriptorExtractor for FailingExtractor {
        fn dimension(&self) -> usize {
            2
        }

        fn extract(&mut self, _image: &RgbImage) -> Result<Vec<DetectedFace>, ExtractError> {
            Err(ExtractError::Other("boom".into()))
        }
    }

    fn gallery() -> Gallery<&'static str> {
        let mut g = Gallery::new(2);
        g.push(Descriptor::new(vec![0.0, 0.0]), "id-1").unwrap();
        g.push(Descriptor::new(vec![0.1, 0.1]), "id-2").unwrap();
        g
    }

    fn image() -> RgbImage {
        RgbImage::new(4, 4)
    }

    #[test]
    fn test_identify_first_match_wins() {
        let g = gallery();
        let mut ex = CannedExtractor {
            probes: vec![vec![0.05, 0.05]],
        };

        let hit = identify(&mut ex, &FirstMatchMatcher, &g, &image(), DEFAULT_TOLERANCE)
            .unwrap()
            .unwrap();
        assert_eq!(*hit.metadata, "id-1");
    }

    #[test]
    fn test_identify_no_face_is_no_match() {
        let g = gallery();
        let mut ex = CannedExtractor { probes: vec![] };
        let result = identify(&mut ex, &FirstMatchMatcher, &g, &image(), DEFAULT_TOLERANCE).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_identify_uses_first_matching_probe() {
        let g = gallery();
        let mut ex = CannedExtractor {
            probes: vec![vec![9.0, 9.0], vec![0.1, 0.1]],
        };

        let hit = identify(&mut ex, &FirstMatchMatcher, &g, &image(), DEFAULT_TOLERANCE)
            .unwrap()
            .unwrap();
        assert_eq!(*hit.metadata, "id-1");
    }

    #[test]
    fn test_identify_empty_gallery() {
        let g: Gallery<&str> = Gallery::new(2);
        let mut ex = CannedExtractor {
            probes: vec![vec![0.0, 0.0]],
        };
        assert!(identify(&mut ex, &FirstMatchMatcher, &g, &image(), DEFAULT_TOLERANCE)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_identify_propagates_extractor_failure() {
        let g = gallery();
        let err = identify(&mut FailingExtractor, &FirstMatchMatcher, &g, &image(), DEFAULT_TOLERANCE)
            .unwrap_err();
        assert!(matches!(err, IdentifyError::Extract(_)));
    }

    #[test]
    fn test_identify_all_reports_every_face() {
        let g = gallery();
        let mut ex = CannedExtractor {
            probes: vec![vec![9.0, 9.0], vec![0.1, 0.1]],
        };

        let results =
            identify_all(&mut ex, &FirstMatchMatcher, &g, &image(), DEFAULT_TOLERANCE).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].matched.is_none());
        assert_eq!(results[0].bbox.x, 0.0);
        assert_eq!(results[1].matched.as_ref().map(|m| *m.metadata), Some("id-1"));
        assert_eq!(results[1].bbox.x, 10.0);
    }
}
