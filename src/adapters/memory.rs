//! In-memory filesystem adapter.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::ports::filesystem::{FileSystem, PortError};

/// Filesystem held entirely in memory, keyed by path.
///
/// Directories are implicit: a path "exists" if a file lives at or under it.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryFileSystem {
    /// Creates an empty in-memory filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper that seeds a file.
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.lock().insert(path.into(), contents.as_bytes().to_vec());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        // A poisoned map is still structurally valid.
        self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn not_found(path: &Path) -> PortError {
    format!("File not found: {}", path.display()).into()
}

impl FileSystem for MemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        let bytes = self.read_bytes(path)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, PortError> {
        self.lock().get(path).cloned().ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        self.lock().insert(path.to_path_buf(), contents.as_bytes().to_vec());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), PortError> {
        let mut files = self.lock();
        let contents = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_path_buf(), contents);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), PortError> {
        self.lock().remove(path).map(|_| ()).ok_or_else(|| not_found(path))
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.lock();
        files.contains_key(path) || files.keys().any(|k| k.starts_with(path) && k != path)
    }
}
