//! Live shell executor using `std::process::Command`.

use std::path::PathBuf;
use std::process::Command;

use crate::ports::filesystem::PortError;
use crate::ports::shell::{ShellExecutor, ShellOutput};

/// Live shell executor that runs commands via the system shell.
///
/// Commands run in `cwd` when set, otherwise in the process working directory.
#[derive(Debug, Default)]
pub struct LiveShellExecutor {
    cwd: Option<PathBuf>,
}

impl LiveShellExecutor {
    /// Creates an executor whose commands run inside `dir`.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { cwd: Some(dir.into()) }
    }
}

impl ShellExecutor for LiveShellExecutor {
    fn run(&self, command: &str) -> Result<ShellOutput, PortError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        let output = cmd.output()?;
        Ok(ShellOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_echo_command() {
        let shell = LiveShellExecutor::default();
        let result = shell.run("echo hello").unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.stderr.is_empty());
    }

    #[test]
    fn captures_exit_code() {
        let shell = LiveShellExecutor::default();
        let result = shell.run("exit 42").unwrap();

        assert_eq!(result.exit_code, 42);
    }

    #[test]
    fn runs_inside_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let shell = LiveShellExecutor::in_dir(dir.path());
        let result = shell.run("ls").unwrap();
        assert!(result.stdout.contains("marker.txt"));
    }
}
