//! Workspace path validation.

use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("path must be absolute; relative paths are not allowed")]
    RelativePath,
    #[error("path does not exist")]
    NotFound,
    #[error("path is not a directory; please enter a directory path")]
    NotDirectory,
    #[error("failed to stat path: {0}")]
    Stat(#[source] io::Error),
}

/// Check that `path` is an absolute path to an existing directory.
pub fn validate_workspace_path(path: impl AsRef<Path>) -> Result<(), WorkspaceError> {
    let path = path.as_ref();
    if !path.is_absolute() {
        return Err(WorkspaceError::RelativePath);
    }

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(WorkspaceError::NotFound),
        Err(e) => return Err(WorkspaceError::Stat(e)),
    };

    if !metadata.is_dir() {
        return Err(WorkspaceError::NotDirectory);
    }

    Ok(())
}
