//! Domain-separated seed derivation.
//!
//! Components are tagged hashes of each source's raw bytes, concatenated in
//! ascending lexicographic tag order (a `BTreeMap` gives us that for free,
//! independent of insertion order) and fed through HKDF-SHA256. The salt
//! binds the seed to its draw id; the info string is a fixed protocol
//! constant. Identical (tag set, per-tag bytes, draw_id) always yields an
//! identical seed — this is what makes cross-implementation replay work.

use std::collections::BTreeMap;

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{BeaconError, Result};
use crate::hashing::{SEED_INFO, domain_hash, draw_salt};

/// Tagged, pre-hashed entropy components for one derivation.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    components: BTreeMap<String, [u8; 32]>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash `raw` under `tag` and store the component. Returns the
    /// component so callers can record it in the trace.
    pub fn insert_raw(&mut self, tag: &str, raw: &[u8]) -> [u8; 32] {
        let component = domain_hash(tag.as_bytes(), raw);
        self.components.insert(tag.to_string(), component);
        component
    }

    /// Tags in derivation (ascending lexicographic) order.
    pub fn tags(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    fn ikm(&self) -> Vec<u8> {
        let mut ikm = Vec::with_capacity(self.components.len() * 32);
        for component in self.components.values() {
            ikm.extend_from_slice(component);
        }
        ikm
    }
}

/// Derive the 32-byte seed for `(draw_id, sources)`.
///
/// HKDF-SHA256 extract-then-expand over the canonicalized component
/// concatenation, salted with [`draw_salt`].
pub fn derive_seed(draw_id: &str, sources: &SourceSet) -> Result<[u8; 32]> {
    if sources.is_empty() {
        return Err(BeaconError::InvalidInput("empty source set".into()));
    }
    let salt = draw_salt(draw_id);
    let hk = Hkdf::<Sha256>::new(Some(&salt), &sources.ikm());
    let mut seed = [0u8; 32];
    hk.expand(SEED_INFO, &mut seed)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    Ok(seed)
}
