//! In-memory gallery of known identities.
//!
//! Descriptors and metadata are kept as two index-aligned sequences: the i-th
//! descriptor belongs to the i-th metadata record. Load order is significant,
//! because [`FirstMatchMatcher`](crate::FirstMatchMatcher) resolves ties by
//! returning the earliest matching entry.

use crate::matcher::{MatchResult, Matcher};
use crate::types::Descriptor;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum GalleryError {
    #[error("descriptor has {actual} components, gallery expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A gallery entry selected by a matcher.
#[derive(Debug, PartialEq)]
pub struct GalleryMatch<'g, M> {
    pub index: usize,
    pub distance: f64,
    pub metadata: &'g M,
}

/// Ordered, explicitly owned collection of (descriptor, metadata) pairs.
#[derive(Debug, Clone)]
pub struct Gallery<M> {
    dimension: usize,
    descriptors: Vec<Descriptor>,
    metadata: Vec<M>,
}

impl<M> Gallery<M> {
    /// Create an empty gallery for descriptors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            descriptors: Vec::new(),
            metadata: Vec::new(),
        }
    }

    /// Append an entry at the end of the load order.
    pub fn push(&mut self, descriptor: Descriptor, metadata: M) -> Result<(), GalleryError> {
        self.check_dimension(&descriptor)?;
        self.descriptors.push(descriptor);
        self.metadata.push(metadata);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn metadata(&self) -> &[M] {
        &self.metadata
    }

    /// Iterate entries in load order.
    pub fn iter(&self) -> impl Iterator<Item = (&Descriptor, &M)> {
        self.descriptors.iter().zip(self.metadata.iter())
    }

    /// Match a probe descriptor against every entry using `matcher`.
    pub fn find<'g>(
        &'g self,
        matcher: &dyn Matcher,
        probe: &Descriptor,
        tolerance: f64,
    ) -> Result<Option<GalleryMatch<'g, M>>, GalleryError> {
        self.check_dimension(probe)?;

        let MatchResult {
            matched,
            distance,
            index,
        } = matcher.compare(probe, &self.descriptors, tolerance);

        Ok(match index {
            Some(index) if matched => Some(GalleryMatch {
                index,
                distance,
                metadata: &self.metadata[index],
            }),
            _ => None,
        })
    }

    fn check_dimension(&self, descriptor: &Descriptor) -> Result<(), GalleryError> {
        if descriptor.dimension() != self.dimension {
            return Err(GalleryError::DimensionMismatch {
                expected: self.dimension,
                actual: descriptor.dimension(),
            });
        }
        Ok(())
    }
}
