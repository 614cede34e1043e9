//! Probe-versus-gallery matching.
//!
//! All policies report a score where higher is better and treat the
//! threshold as a lower bound. The Euclidean policy scores `1 - distance`,
//! so its default threshold of 0.4 means "distance <= 0.6". Acceptance is
//! decided on the raw distance so that bound stays inclusive in f32.

use crate::gallery::Identity;
use crate::types::{Descriptor, ExtractorKind, MatchResult};
use std::sync::atomic::{AtomicU32, Ordering};

/// Cosine similarity a histogram descriptor must reach.
pub const DEFAULT_COSINE_THRESHOLD: f32 = 0.75;
/// `1 - 0.6`: an embedding must lie within Euclidean distance 0.6.
pub const DEFAULT_EUCLIDEAN_THRESHOLD: f32 = 0.4;

/// Strategy for comparing a probe descriptor against a gallery.
pub trait Matcher: Send + Sync {
    /// Score of `candidate` for `probe`; higher = more similar.
    fn score(&self, probe: &Descriptor, candidate: &Descriptor) -> f32;

    /// Whether `candidate` clears `threshold` for `probe`.
    fn accepts(&self, probe: &Descriptor, candidate: &Descriptor, threshold: f32) -> bool {
        self.score(probe, candidate) >= threshold
    }

    /// Best gallery entry for `probe` if its score is at least `threshold`.
    ///
    /// Ties keep the earliest entry in gallery order. Entries whose length
    /// differs from the probe are skipped.
    fn compare(&self, probe: &Descriptor, gallery: &[Identity], threshold: f32) -> MatchResult {
        let mut best: Option<(usize, f32)> = None;

        for (i, identity) in gallery.iter().enumerate() {
            if identity.descriptor.len() != probe.len() {
                continue;
            }
            let score = self.score(probe, &identity.descriptor);
            if score.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        match best {
            Some((idx, score)) if self.accepts(probe, &gallery[idx].descriptor, threshold) => {
                MatchResult::granted(gallery[idx].name.clone(), score)
            }
            _ => MatchResult::unknown(),
        }
    }
}

/// Cosine similarity, for histogram descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn score(&self, probe: &Descriptor, candidate: &Descriptor) -> f32 {
        probe.similarity(candidate)
    }
}

/// `1 - euclidean_distance`, for embedding descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn score(&self, probe: &Descriptor, candidate: &Descriptor) -> f32 {
        1.0 - probe.euclidean_distance(candidate)
    }

    fn accepts(&self, probe: &Descriptor, candidate: &Descriptor, threshold: f32) -> bool {
        probe.euclidean_distance(candidate) <= 1.0 - threshold
    }
}

/// The matching policy paired with an extractor family.
pub fn matcher_for(kind: ExtractorKind) -> Box<dyn Matcher> {
    match kind {
        ExtractorKind::Histogram => Box::new(CosineMatcher),
        ExtractorKind::Embedding => Box::new(EuclideanMatcher),
    }
}

/// Runtime-adjustable match threshold, shared between threads.
///
/// Readers see a new value on their next comparison.
#[derive(Debug)]
pub struct Tolerance(AtomicU32);

impl Tolerance {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}
