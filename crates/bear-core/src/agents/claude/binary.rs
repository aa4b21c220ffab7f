//! Locating the `claude` executable.
//!
//! Search order, first hit wins:
//! 1. `claude` on `PATH`
//! 2. install locations under the user's home directory, in the order of
//!    [`HOME_RELATIVE_FALLBACKS`]
//! 3. system-wide install locations in [`ABSOLUTE_FALLBACKS`]
//!
//! A missing home directory only skips step 2.

use std::path::{Path, PathBuf};

use crate::error::AgentError;
use crate::paths;

pub const BINARY_NAME: &str = "claude";

/// Order matters: earlier entries shadow later ones.
pub const HOME_RELATIVE_FALLBACKS: &[&str] = &[
    ".local/bin/claude",
    ".npm-global/bin/claude",
    "node_modules/.bin/claude",
    ".yarn/bin/claude",
    ".claude/local/claude",
];

pub const ABSOLUTE_FALLBACKS: &[&str] = &["/usr/local/bin/claude", "/usr/bin/claude"];

/// Read-only filesystem queries used by the resolver.
pub trait BinaryProbe {
    /// Resolve `name` against the executable search path.
    fn look_path(&self, name: &str) -> Option<PathBuf>;
    fn home_dir(&self) -> Result<PathBuf, String>;
    fn file_exists(&self, path: &Path) -> bool;
}

/// Probe backed by the real environment and filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl BinaryProbe for SystemProbe {
    fn look_path(&self, name: &str) -> Option<PathBuf> {
        let path_var = std::env::var_os("PATH")?;
        std::env::split_paths(&path_var)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }

    fn home_dir(&self) -> Result<PathBuf, String> {
        paths::home_dir()
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Find the Claude CLI using `probe`.
pub fn find_claude_binary(probe: &impl BinaryProbe) -> Result<PathBuf, AgentError> {
    if let Some(path) = probe.look_path(BINARY_NAME) {
        return Ok(path);
    }

    match probe.home_dir() {
        Ok(home) => {
            if let Some(found) = HOME_RELATIVE_FALLBACKS
                .iter()
                .map(|rel| home.join(rel))
                .find(|candidate| probe.file_exists(candidate))
            {
                return Ok(found);
            }
        }
        Err(e) => log::debug!("skipping home fallbacks for claude binary: {}", e),
    }

    ABSOLUTE_FALLBACKS
        .iter()
        .map(PathBuf::from)
        .find(|candidate| probe.file_exists(candidate))
        .ok_or(AgentError::BinaryNotFound)
}

/// Find the Claude CLI on this machine.
pub fn resolve_claude_binary() -> Result<PathBuf, AgentError> {
    find_claude_binary(&SystemProbe)
}
