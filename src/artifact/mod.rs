//! Artifact documents: the structured notes kept for each source unit.
//!
//! An artifact is a YAML mapping. Known fields are typed; anything else the
//! worker writes is preserved untouched in [`ArtifactDocument::extra`].

pub mod schema;
pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::PortError;

pub use schema::{classify, required_fields, FileRole, RequiredField};
pub use store::{ArtifactRead, ArtifactStore, WriteOutcome};

/// Freshness metadata nested under `meta`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Fingerprint of the source unit when the artifact was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
    /// When the artifact was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Parsed artifact document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDocument {
    /// Architectural layer tag of a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    /// One-paragraph summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Why a file exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Core logic of service and utility files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_logic: Option<String>,
    /// What a directory is responsible for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsibility: Option<String>,
    /// Names of the direct children of a directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<String>>,
    /// Architecture overview, required on the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    /// Other units this artifact links to, in source or artifact form.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// Freshness metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ArtifactMeta>,
    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ArtifactDocument {
    /// Parses an artifact from YAML text. Blank text is an empty document.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Parse`] if the text is not a valid artifact mapping.
    pub fn parse(text: &str) -> Result<Self, ArtifactError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Serializes the document to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Parse`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ArtifactError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Recorded source fingerprint, if any.
    #[must_use]
    pub fn source_hash(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.source_hash.as_deref())
    }
}

/// Errors raised by artifact parsing and storage.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The document is not a valid artifact.
    #[error("malformed artifact document: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// Writing or removing the artifact failed.
    #[error("failed to {action} artifact {path}: {source}")]
    Io {
        /// What was being attempted.
        action: &'static str,
        /// Artifact path relative to the root.
        path: String,
        /// Underlying port error.
        #[source]
        source: PortError,
    },
}
