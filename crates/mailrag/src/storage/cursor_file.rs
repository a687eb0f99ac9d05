//! Persistent sync cursor
//!
//! A single JSON file `{"year": .., "month": .., "day": ..}` in the data
//! directory. Writes go to a temp file in the same directory which then
//! replaces the cursor, so a reader never sees a half-written file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::models::SyncCursor;

#[derive(Debug, Clone)]
pub struct CursorFile {
    path: PathBuf,
}

impl CursorFile {
    pub const FILE_NAME: &'static str = "sync_cursor.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cursor file inside `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted cursor
    pub fn load(&self) -> Result<SyncCursor> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::CacheMissing(self.path.clone()));
            }
            Err(e) => return Err(Error::CacheCorrupt(format!("unreadable cursor file: {}", e))),
        };

        if content.trim().is_empty() {
            return Err(Error::CacheCorrupt("cursor file is empty".to_string()));
        }

        let cursor: SyncCursor = serde_json::from_str(&content)
            .map_err(|e| Error::CacheCorrupt(format!("invalid cursor JSON: {}", e)))?;
        cursor.validate()?;
        Ok(cursor)
    }

    /// Validate and atomically replace the persisted cursor
    pub fn store(&self, cursor: &SyncCursor) -> Result<()> {
        cursor.validate()?;

        // Only a directory created here is tightened
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config::ensure_private_dir(dir)
                .map_err(|e| Error::Io(std::io::Error::other(format!("{:#}", e))))?;
        }

        let content = serde_json::to_string_pretty(cursor)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(content.as_bytes())?;
            tmp.sync_all()?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp_path, &self.path)?;
        debug!("Sync cursor advanced to {}", cursor);
        Ok(())
    }
}
