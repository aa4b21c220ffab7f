use std::env;
use std::path::PathBuf;

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn home_dir() -> Result<PathBuf, String> {
    home_dir_from(|key| env::var(key).ok())
}

/// Same as [`home_dir`], reading variables through `lookup`.
pub fn home_dir_from<F>(lookup: F) -> Result<PathBuf, String>
where
    F: Fn(&str) -> Option<String>,
{
    ["HOME", "USERPROFILE"]
        .iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| "Home directory not set".to_string())
}
