//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the coverage engine and an
//! external system (time, filesystem, shell). Implementations live in
//! `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod shell;

pub use clock::Clock;
pub use filesystem::{FileSystem, PortError};
pub use shell::{ShellExecutor, ShellOutput};
