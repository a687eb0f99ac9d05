//! On-disk credential persistence
//!
//! Only the token half of a [`Credential`] is written; the client id and
//! secret come from configuration on every run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::gmail::Credential;

/// Stored token data
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub const FILE_NAME: &'static str = "credentials.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Credential file inside `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored tokens and attach the configured client identity
    pub fn load(&self, client_id: &str, client_secret: &str) -> Result<Credential> {
        let stored: StoredToken = config::load_json_file(&self.path).map_err(|e| {
            Error::Auth(format!("no usable stored credential ({:#}); run `mailrag auth`", e))
        })?;

        Ok(Credential {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_at: stored.expires_at,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        let stored = StoredToken {
            access_token: credential.access_token.clone(),
            refresh_token: credential.refresh_token.clone(),
            expires_at: credential.expires_at,
        };

        config::save_json_file(&self.path, &stored)
            .map_err(|e| Error::Io(std::io::Error::other(format!("{:#}", e))))
    }
}
