//! Filesystem port for artifact and state I/O.

use std::path::Path;

/// Boxed error returned by port implementations.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// Provides filesystem access for reading and writing artifacts and state.
///
/// Abstracting the filesystem lets the validator and the stores run against
/// an in-memory tree in tests. The trait is `Send + Sync` so a shared
/// reference can be handed to parallel per-unit reads.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or is not valid UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String, PortError>;

    /// Reads the raw bytes of a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be read.
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, PortError>;

    /// Writes the given contents to a file, creating parents and overwriting.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails (permissions, disk full, etc.).
    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError>;

    /// Moves `from` over `to`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is missing or the rename fails.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), PortError>;

    /// Removes a single file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be removed.
    fn remove_file(&self, path: &Path) -> Result<(), PortError>;

    /// Returns `true` if the path exists on the filesystem.
    fn exists(&self, path: &Path) -> bool;
}

impl<T: FileSystem + ?Sized> FileSystem for std::sync::Arc<T> {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        (**self).read_to_string(path)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, PortError> {
        (**self).read_bytes(path)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        (**self).write(path, contents)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), PortError> {
        (**self).rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> Result<(), PortError> {
        (**self).remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}
