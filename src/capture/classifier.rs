// src/capture/classifier.rs
//! Body placement classification
//!
//! The capture pipeline decides where a body lives by looking only at its
//! first bytes. The production rule is a magic-prefix probe: bodies starting
//! with the internal `LARES=` form field (injected by the filter itself and
//! needed in memory for programmatic access) stay memory-resident, everything
//! else spills to storage. The rule is deliberately not content-type based
//! and applies to every request the pipeline sees.

/// Where a captured body is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPlacement {
    /// Growable in-memory buffer.
    Memory,

    /// Temporary storage entry.
    File,
}

/// Strategy mapping the first bytes of a body to a placement.
pub trait BodyClassifier {
    /// Leading bytes the pipeline should accumulate before asking for a
    /// decision. The stream may end earlier; `classify` is then consulted
    /// with whatever accumulated.
    fn sniff_len(&self) -> usize;

    /// Decide placement from the accumulated prefix.
    fn classify(&self, prefix: &[u8]) -> BodyPlacement;
}

/// Magic-prefix classifier: an exact marker match keeps the body in memory.
#[derive(Debug, Clone)]
pub struct MarkerClassifier {
    marker: &'static [u8],
}

impl MarkerClassifier {
    /// The internal form field marker used by the access-control filter.
    pub const LARES_MARKER: &'static [u8] = b"LARES=";

    pub fn new(marker: &'static [u8]) -> Self {
        Self { marker }
    }
}

impl Default for MarkerClassifier {
    fn default() -> Self {
        Self::new(Self::LARES_MARKER)
    }
}

impl BodyClassifier for MarkerClassifier {
    fn sniff_len(&self) -> usize {
        self.marker.len()
    }

    fn classify(&self, prefix: &[u8]) -> BodyPlacement {
        if prefix.len() >= self.marker.len() && &prefix[..self.marker.len()] == self.marker {
            BodyPlacement::Memory
        } else {
            BodyPlacement::File
        }
    }
}
