//! Layered configuration.
//!
//! Later layers win: built-in defaults, then `mirrordoc.yaml` at the source
//! root, then `MIRRORDOC_STATE_DIR`, then command-line flags (applied by the
//! command layer).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::ServiceContext;
use crate::run::DEFAULT_BATCH_SIZE;

/// Config file looked up at the source root.
pub const CONFIG_FILE: &str = "mirrordoc.yaml";

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "MIRRORDOC_STATE_DIR";

/// State directory used when nothing else is configured.
pub const DEFAULT_STATE_DIR: &str = ".mirrordoc";

/// Effective settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Include glob patterns; empty means every file.
    pub include: Vec<String>,
    /// State directory, relative to the source root unless absolute.
    pub state_dir: Option<PathBuf>,
    /// Items per worker turn.
    pub batch_size: usize,
    /// Worker turn cap for `run`.
    pub max_iterations: Option<usize>,
    /// Shell command template for the worker.
    pub worker_cmd: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            state_dir: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_iterations: None,
            worker_cmd: None,
        }
    }
}

impl Config {
    /// Defaults overlaid with `mirrordoc.yaml` under `root` and the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error string if the config file exists but is invalid.
    pub fn load(ctx: &ServiceContext, root: &Path) -> Result<Self, String> {
        Ok(Self::from_file(ctx, root)?.with_env(|key| std::env::var(key).ok()))
    }

    /// Defaults overlaid with `mirrordoc.yaml` under `root`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error string if the file cannot be read or parsed.
    pub fn from_file(ctx: &ServiceContext, root: &Path) -> Result<Self, String> {
        let path = root.join(CONFIG_FILE);
        if !ctx.fs.exists(&path) {
            return Ok(Self::default());
        }
        let text = ctx
            .fs
            .read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|e| format!("invalid config {}: {e}", path.display()))
    }

    /// Applies environment overrides read through `lookup`.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(STATE_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.state_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// Resolved state directory for the tree at `root`.
    #[must_use]
    pub fn state_dir(&self, root: &Path) -> PathBuf {
        match &self.state_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => root.join(DEFAULT_STATE_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryFileSystem;
    use chrono::Utc;

    fn ctx(fs: MemoryFileSystem) -> ServiceContext {
        ServiceContext::with_fs(fs, Utc::now())
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::from_file(&ctx(MemoryFileSystem::new()), Path::new("/p")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.state_dir(Path::new("/p")), PathBuf::from("/p/.mirrordoc"));
    }

    #[test]
    fn file_overrides_defaults() {
        let fs = MemoryFileSystem::new().with_file(
            "/p/mirrordoc.yaml",
            "include: [\"src/**\"]\nbatch_size: 3\nworker_cmd: gen {path}\n",
        );
        let config = Config::from_file(&ctx(fs), Path::new("/p")).unwrap();
        assert_eq!(config.include, vec!["src/**"]);
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.worker_cmd.as_deref(), Some("gen {path}"));
        assert_eq!(config.max_iterations, None);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let fs = MemoryFileSystem::new().with_file("/p/mirrordoc.yaml", "batch_size: [x");
        let err = Config::from_file(&ctx(fs), Path::new("/p")).unwrap_err();
        assert!(err.contains("invalid config"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let fs = MemoryFileSystem::new().with_file("/p/mirrordoc.yaml", "batchsize: 3\n");
        assert!(Config::from_file(&ctx(fs), Path::new("/p")).is_err());
    }

    #[test]
    fn env_overrides_file_state_dir() {
        let fs = MemoryFileSystem::new().with_file("/p/mirrordoc.yaml", "state_dir: from-file\n");
        let config = Config::from_file(&ctx(fs), Path::new("/p")).unwrap();
        assert_eq!(config.state_dir(Path::new("/p")), PathBuf::from("/p/from-file"));

        let config = config.with_env(|key| (key == STATE_DIR_ENV).then(|| "/abs/state".to_string()));
        assert_eq!(config.state_dir(Path::new("/p")), PathBuf::from("/abs/state"));
    }

    #[test]
    fn blank_env_value_is_ignored() {
        let config = Config::default().with_env(|_| Some("  ".to_string()));
        assert_eq!(config.state_dir, None);
    }
}
