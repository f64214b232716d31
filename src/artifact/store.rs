//! Artifact store: reads and writes single artifact documents.
//!
//! All I/O goes through `ctx.fs` so the store works against the live disk
//! and the in-memory filesystem alike. Artifacts are addressed by their
//! [`SourceUnit`], whose kind decides the artifact location.

use std::path::{Path, PathBuf};

use super::{ArtifactDocument, ArtifactError, ArtifactMeta};
use crate::context::ServiceContext;
use crate::mapping;
use crate::scan::SourceUnit;

/// Outcome of reading one artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactRead {
    /// No artifact file, or it could not be read.
    Missing,
    /// The file exists but is not a valid document.
    Unparsable(String),
    /// The parsed document.
    Parsed(ArtifactDocument),
}

impl ArtifactRead {
    /// `true` when the artifact exists and parses.
    #[must_use]
    pub fn is_documented(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}

/// What a write changed, reported to the progress tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// The artifact did not exist before.
    pub is_new: bool,
    /// Size change in bytes (new size minus old size).
    pub byte_delta: i64,
}

/// Persistence layer for artifacts under one source root.
pub struct ArtifactStore<'a> {
    ctx: &'a ServiceContext,
    root: PathBuf,
}

impl<'a> ArtifactStore<'a> {
    /// Creates a store for the source tree rooted at `root`.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, root: &Path) -> Self {
        Self { ctx, root: root.to_path_buf() }
    }

    /// Source root this store is bound to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Service context the store performs I/O through.
    #[must_use]
    pub fn context(&self) -> &'a ServiceContext {
        self.ctx
    }

    /// Absolute location of the artifact for `unit`.
    #[must_use]
    pub fn artifact_file(&self, unit: &SourceUnit) -> PathBuf {
        self.root.join(unit.artifact_path())
    }

    /// Absolute location of the source unit itself.
    #[must_use]
    pub fn source_file(&self, source: &str) -> PathBuf {
        if mapping::is_root(source) {
            self.root.clone()
        } else {
            self.root.join(source)
        }
    }

    /// Returns `true` if an artifact file exists for `unit`.
    #[must_use]
    pub fn exists(&self, unit: &SourceUnit) -> bool {
        self.ctx.fs.exists(&self.artifact_file(unit))
    }

    /// Raw artifact bytes, or `None` when absent or unreadable.
    #[must_use]
    pub fn raw(&self, unit: &SourceUnit) -> Option<Vec<u8>> {
        self.ctx.fs.read_bytes(&self.artifact_file(unit)).ok()
    }

    /// Artifact size in bytes, or `None` when absent.
    #[must_use]
    pub fn size(&self, unit: &SourceUnit) -> Option<u64> {
        self.raw(unit).map(|bytes| bytes.len() as u64)
    }

    /// Reads and parses the artifact for `unit`.
    ///
    /// Read failures are reported as [`ArtifactRead::Missing`]: a file that
    /// vanished or cannot be opened counts as not documented.
    #[must_use]
    pub fn read(&self, unit: &SourceUnit) -> ArtifactRead {
        let Ok(text) = self.ctx.fs.read_to_string(&self.artifact_file(unit)) else {
            return ArtifactRead::Missing;
        };
        match ArtifactDocument::parse(&text) {
            Ok(doc) => ArtifactRead::Parsed(doc),
            Err(err) => ArtifactRead::Unparsable(err.to_string()),
        }
    }

    /// Writes `doc` as the artifact for `unit`, stamping `meta.updated_at`.
    ///
    /// When `source_hash` is given it replaces the recorded fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(
        &self,
        unit: &SourceUnit,
        doc: &ArtifactDocument,
        source_hash: Option<String>,
    ) -> Result<WriteOutcome, ArtifactError> {
        let previous = self.size(unit);
        let mut doc = doc.clone();
        let meta = doc.meta.get_or_insert_with(ArtifactMeta::default);
        meta.updated_at = Some(self.ctx.clock.now());
        if source_hash.is_some() {
            meta.source_hash = source_hash;
        }
        let yaml = doc.to_yaml()?;
        let path = self.artifact_file(unit);
        self.ctx.fs.write(&path, &yaml).map_err(|err| ArtifactError::Io {
            action: "write",
            path: path.display().to_string(),
            source: err,
        })?;
        Ok(outcome(previous, yaml.len() as u64))
    }

    /// Deletes the artifact at the given artifact-relative path.
    ///
    /// Returns the size of the removed file, or `None` when there was
    /// nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing artifact cannot be removed.
    pub fn remove(&self, artifact_path: &str) -> Result<Option<u64>, ArtifactError> {
        let path = self.root.join(artifact_path);
        let Ok(bytes) = self.ctx.fs.read_bytes(&path) else {
            return Ok(None);
        };
        self.ctx.fs.remove_file(&path).map_err(|err| ArtifactError::Io {
            action: "remove",
            path: artifact_path.to_string(),
            source: err,
        })?;
        Ok(Some(bytes.len() as u64))
    }
}

/// Builds a [`WriteOutcome`] from the sizes before and after a write.
#[must_use]
pub fn outcome(previous: Option<u64>, current: u64) -> WriteOutcome {
    let before = previous.unwrap_or(0);
    let delta =
        i64::try_from(current).unwrap_or(i64::MAX) - i64::try_from(before).unwrap_or(i64::MAX);
    WriteOutcome { is_new: previous.is_none(), byte_delta: delta }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryFileSystem;
    use chrono::{DateTime, Utc};

    fn ctx(fs: MemoryFileSystem) -> ServiceContext {
        let now = DateTime::parse_from_rfc3339("2025-06-15T10:00:00Z").unwrap().with_timezone(&Utc);
        ServiceContext::with_fs(fs, now)
    }

    #[test]
    fn read_distinguishes_missing_unparsable_and_parsed() {
        let ctx = ctx(MemoryFileSystem::new()
            .with_file("/p/a.ts.au", "summary: A\n")
            .with_file("/p/b.ts.au", "summary: [oops"));
        let store = ArtifactStore::new(&ctx, Path::new("/p"));

        assert!(matches!(store.read(&SourceUnit::file("a.ts")), ArtifactRead::Parsed(doc) if doc.summary.as_deref() == Some("A")));
        assert!(matches!(store.read(&SourceUnit::file("b.ts")), ArtifactRead::Unparsable(_)));
        assert_eq!(store.read(&SourceUnit::file("c.ts")), ArtifactRead::Missing);
    }

    #[test]
    fn directory_and_root_artifacts_use_nested_marker() {
        let ctx = ctx(MemoryFileSystem::new());
        let store = ArtifactStore::new(&ctx, Path::new("/p"));
        assert_eq!(store.artifact_file(&SourceUnit::directory("src")), PathBuf::from("/p/src/.au"));
        assert_eq!(store.artifact_file(&SourceUnit::root()), PathBuf::from("/p/.au"));
        assert_eq!(store.source_file("."), PathBuf::from("/p"));
    }

    #[test]
    fn extensionless_files_get_a_sibling_artifact() {
        let ctx = ctx(MemoryFileSystem::new());
        let store = ArtifactStore::new(&ctx, Path::new("/p"));
        let makefile = SourceUnit::file("Makefile");
        assert_eq!(store.artifact_file(&makefile), PathBuf::from("/p/Makefile.au"));

        let doc = ArtifactDocument { summary: Some("build rules".into()), ..ArtifactDocument::default() };
        assert!(store.write(&makefile, &doc, None).unwrap().is_new);
        assert!(ctx.fs.exists(Path::new("/p/Makefile.au")));
        assert!(store.read(&makefile).is_documented());
    }

    #[test]
    fn write_reports_new_then_delta() {
        let ctx = ctx(MemoryFileSystem::new());
        let store = ArtifactStore::new(&ctx, Path::new("/p"));
        let doc = ArtifactDocument { summary: Some("short".into()), ..ArtifactDocument::default() };

        let unit = SourceUnit::file("a.ts");
        let first = store.write(&unit, &doc, Some("h1".into())).unwrap();
        assert!(first.is_new);
        assert_eq!(first.byte_delta, i64::try_from(store.size(&unit).unwrap()).unwrap());

        let longer = ArtifactDocument {
            summary: Some("a considerably longer summary".into()),
            ..ArtifactDocument::default()
        };
        let second = store.write(&unit, &longer, None).unwrap();
        assert!(!second.is_new);
        assert!(second.byte_delta > 0);

        let ArtifactRead::Parsed(saved) = store.read(&unit) else { panic!("expected parsed") };
        assert_eq!(saved.source_hash(), Some("h1"));
        assert_eq!(
            saved.meta.unwrap().updated_at.unwrap().to_rfc3339(),
            "2025-06-15T10:00:00+00:00"
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let ctx = ctx(MemoryFileSystem::new().with_file("/p/b.ts.au", "summary: B\n"));
        let store = ArtifactStore::new(&ctx, Path::new("/p"));
        assert_eq!(store.remove("b.ts.au").unwrap(), Some(11));
        assert_eq!(store.remove("b.ts.au").unwrap(), None);
        assert!(!store.exists(&SourceUnit::file("b.ts")));
    }

    #[test]
    fn outcome_handles_shrinking() {
        let o = outcome(Some(100), 40);
        assert!(!o.is_new);
        assert_eq!(o.byte_delta, -60);
    }
}
