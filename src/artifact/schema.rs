//! Required-field schema per unit kind, and the file role heuristic.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ArtifactDocument;
use crate::mapping;
use crate::scan::UnitKind;

/// A field an artifact must carry to be complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    /// `layer`
    Layer,
    /// `summary`
    Summary,
    /// `purpose`
    Purpose,
    /// `key_logic`
    KeyLogic,
    /// `responsibility`
    Responsibility,
    /// `contents`
    Contents,
    /// `architecture`
    Architecture,
}

impl RequiredField {
    /// Field name as written in the artifact.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Layer => "layer",
            Self::Summary => "summary",
            Self::Purpose => "purpose",
            Self::KeyLogic => "key_logic",
            Self::Responsibility => "responsibility",
            Self::Contents => "contents",
            Self::Architecture => "architecture",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a source file, inferred from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    /// Services, controllers, handlers, repositories.
    Service,
    /// Shared helpers and utilities.
    Utility,
    /// Tests and fixtures.
    Test,
    /// Configuration and data files.
    Config,
    /// Entry points and module roots.
    Entry,
    /// Anything else.
    Other,
}

impl FileRole {
    /// Service and utility files must document their key logic.
    #[must_use]
    pub fn requires_key_logic(self) -> bool {
        matches!(self, Self::Service | Self::Utility)
    }
}

const SERVICE_MARKERS: &[&str] = &["service", "controller", "handler", "repository", "gateway"];
const UTILITY_MARKERS: &[&str] = &["util", "helper"];
const ENTRY_STEMS: &[&str] = &["main", "index", "lib", "mod", "app"];
const CONFIG_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml", "ini", "env", "lock"];

/// Classifies a normalized file path into a [`FileRole`].
#[must_use]
pub fn classify(path: &str) -> FileRole {
    let lower = path.to_ascii_lowercase();
    let name = mapping::file_name(&lower);
    let (stem, extension) = match name.split_once('.') {
        Some((stem, rest)) => (stem, rest.rsplit('.').next().unwrap_or(rest)),
        None => (name, ""),
    };
    let dirs: Vec<&str> = lower.split('/').rev().skip(1).collect();

    let is_test = dirs.iter().any(|d| matches!(*d, "test" | "tests" | "__tests__" | "spec"))
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || name.contains(".test.")
        || name.contains(".spec.");
    if is_test {
        return FileRole::Test;
    }
    if CONFIG_EXTENSIONS.contains(&extension) || name.contains(".config.") || stem == "config" {
        return FileRole::Config;
    }
    let marks = |markers: &[&str]| {
        markers.iter().any(|m| stem.contains(m) || dirs.iter().any(|d| d.contains(m)))
    };
    if marks(SERVICE_MARKERS) {
        return FileRole::Service;
    }
    if marks(UTILITY_MARKERS) {
        return FileRole::Utility;
    }
    if ENTRY_STEMS.contains(&stem) {
        return FileRole::Entry;
    }
    FileRole::Other
}

/// Fields an artifact for a unit of `kind` at `path` must carry.
#[must_use]
pub fn required_fields(kind: UnitKind, path: &str) -> Vec<RequiredField> {
    use RequiredField::{
        Architecture, Contents, KeyLogic, Layer, Purpose, Responsibility, Summary,
    };
    match kind {
        UnitKind::File => {
            let mut fields = vec![Layer, Summary, Purpose];
            if classify(path).requires_key_logic() {
                fields.push(KeyLogic);
            }
            fields
        }
        UnitKind::Directory => vec![Summary, Responsibility, Contents],
        UnitKind::Root => vec![Summary, Responsibility, Contents, Architecture],
    }
}

fn filled(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

impl ArtifactDocument {
    /// Returns `true` if the document carries a usable value for `field`.
    #[must_use]
    pub fn has(&self, field: RequiredField) -> bool {
        match field {
            RequiredField::Layer => filled(self.layer.as_ref()),
            RequiredField::Summary => filled(self.summary.as_ref()),
            RequiredField::Purpose => filled(self.purpose.as_ref()),
            RequiredField::KeyLogic => filled(self.key_logic.as_ref()),
            RequiredField::Responsibility => filled(self.responsibility.as_ref()),
            RequiredField::Contents => self.contents.is_some(),
            RequiredField::Architecture => filled(self.architecture.as_ref()),
        }
    }

    /// Required fields for `kind`/`path` that this document lacks.
    #[must_use]
    pub fn missing_fields(&self, kind: UnitKind, path: &str) -> Vec<RequiredField> {
        required_fields(kind, path).into_iter().filter(|f| !self.has(*f)).collect()
    }
}
