//! Local directory helpers for mailrag
//!
//! Resolves the shared data directory (~/.local/share/mailrag/ on Linux),
//! creates it with owner-only permissions, and reads/writes JSON files in it.
//!
//! Call [`init`] at application startup to bootstrap the data directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the default data directory
pub const DATA_DIR_ENV: &str = "MAILRAG_DATA_DIR";

/// Initialize the data directory: `dir` when given, else the platform default.
///
/// Creates it with owner-only permissions if it doesn't exist.
pub fn init(dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match dir {
        Some(dir) => dir,
        None => data_dir().context("Could not determine data directory")?,
    };
    ensure_private_dir(&dir)?;
    Ok(dir)
}

/// Platform data directory for mailrag
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("mailrag"))
}

/// Create `dir` (and parents) restricted to the current user
///
/// A directory that already exists is left as is; only directories created
/// here are tightened.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("Failed to restrict data directory: {}", dir.display()))?;
    }

    Ok(())
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse file: {}", path.display()))
}

/// Save a value as pretty JSON, readable only by the current user
pub fn save_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_private_dir(parent)?;
    }

    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}
