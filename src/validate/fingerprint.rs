//! Freshness fingerprints for source units.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::artifact::ArtifactStore;

/// SHA-256 hex digest of raw bytes.
#[must_use]
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fingerprint of a file's current contents; `None` if it cannot be read.
#[must_use]
pub fn file_fingerprint(store: &ArtifactStore<'_>, path: &str) -> Option<String> {
    let bytes = store.context().fs.read_bytes(&store.source_file(path)).ok()?;
    Some(digest(&bytes))
}

/// Fingerprint of a directory: its sorted child names, one per line.
#[must_use]
pub fn directory_fingerprint(children: &BTreeSet<String>) -> String {
    let listing = children.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
    digest(listing.as_bytes())
}
