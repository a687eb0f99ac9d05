//! Runtime settings for mailrag
//!
//! Settings are resolved once at startup and handed to constructors by
//! reference. Sources, in order of priority:
//! 1. `settings.json` in the data directory
//! 2. Environment variables, then a `.env` file in the working directory
//! 3. Built-in defaults
//!
//! OAuth client id/secret may also come from a Google Cloud Console
//! credential file (`google-credentials.json`, `installed` or `web` section),
//! consulted after `settings.json` and before the environment.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::{CredentialFile, CursorFile};

/// Settings filename in the data directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Google Cloud Console credentials filename in the data directory
pub const GOOGLE_CREDENTIALS_FILE: &str = "google-credentials.json";

/// Dotenv file read from the working directory
pub const DOTENV_FILE: &str = ".env";

/// Vector store filename in the data directory
pub const STORE_FILE: &str = "vectors.sqlite";

pub const DEFAULT_REDIRECT_PORT: u16 = 8080;
pub const DEFAULT_EMBEDDING_HOST: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;
pub const DEFAULT_SEARCH_THRESHOLD: f32 = 0.75;

/// OAuth client for the mail provider
#[derive(Clone, PartialEq)]
pub struct GmailSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_port: u16,
}

impl std::fmt::Debug for GmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_port", &self.redirect_port)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSettings {
    /// Base URL, or a bare port on localhost
    pub host: String,
    pub model: String,
    pub context_length: Option<u32>,
}

impl EmbeddingSettings {
    /// Base URL of the embedding service; a bare port means localhost
    pub fn base_url(&self) -> String {
        let host = self.host.trim();
        if !host.is_empty() && host.chars().all(|c| c.is_ascii_digit()) {
            format!("http://localhost:{}", host)
        } else {
            host.trim_end_matches('/').to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub gmail: GmailSettings,
    pub embedding: EmbeddingSettings,
    pub data_dir: PathBuf,
    pub store_path: PathBuf,
    pub refresh_margin_secs: u64,
    pub search_threshold: f32,
}

/// `settings.json`; every field optional so env vars can fill the rest
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SettingsFile {
    gmail: GmailSection,
    embedding: EmbeddingSection,
    store_path: Option<PathBuf>,
    refresh_margin_secs: Option<u64>,
    search_threshold: Option<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct GmailSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_port: Option<u16>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct EmbeddingSection {
    host: Option<String>,
    model: Option<String>,
    context_length: Option<u32>,
}

/// Google Cloud Console credential file format (installed app)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

/// Source of environment values, so resolution can be tested without
/// touching the process environment
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl<K: AsRef<str>, V: AsRef<str>, const N: usize> EnvSource for [(K, V); N] {
    fn var(&self, key: &str) -> Option<String> {
        self.iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_ref().to_string())
    }
}

/// `primary` first, then values from a dotenv file
pub struct DotenvEnv<E> {
    primary: E,
    file: HashMap<String, String>,
}

impl<E: EnvSource> DotenvEnv<E> {
    /// Layer the dotenv file at `path` under `primary`; a missing file is empty
    pub fn load(primary: E, path: &Path) -> Result<Self> {
        let mut file = HashMap::new();
        if path.is_file() {
            for entry in dotenv::from_path_iter(path)
                .with_context(|| format!("Failed to read {}", path.display()))?
            {
                let (key, value) =
                    entry.with_context(|| format!("Failed to parse {}", path.display()))?;
                file.insert(key, value);
            }
        }
        Ok(Self { primary, file })
    }
}

impl<E: EnvSource> EnvSource for DotenvEnv<E> {
    fn var(&self, key: &str) -> Option<String> {
        self.primary
            .var(key)
            .or_else(|| self.file.get(key).filter(|v| !v.is_empty()).cloned())
    }
}

impl Settings {
    /// Process environment layered over `./.env`
    pub fn environment() -> Result<DotenvEnv<ProcessEnv>> {
        DotenvEnv::load(ProcessEnv, Path::new(DOTENV_FILE))
    }

    /// Create and return the data directory (`MAILRAG_DATA_DIR` or the default)
    pub fn data_dir(env: &dyn EnvSource) -> Result<PathBuf> {
        config::init(env.var(config::DATA_DIR_ENV).map(PathBuf::from))
    }

    /// Resolve settings from the process environment and `./.env`
    pub fn load() -> Result<Self> {
        let env = Self::environment()?;
        let data_dir = Self::data_dir(&env)?;
        Self::resolve(&data_dir, &env)
    }

    /// Resolve settings rooted at `data_dir`
    pub fn resolve(data_dir: &Path, env: &dyn EnvSource) -> Result<Self> {
        let settings_path = data_dir.join(SETTINGS_FILE);
        let file: SettingsFile = if settings_path.exists() {
            config::load_json_file(&settings_path)?
        } else {
            SettingsFile::default()
        };

        let google = load_google_credentials(&data_dir.join(GOOGLE_CREDENTIALS_FILE))?;

        let client_id = file
            .gmail
            .client_id
            .or_else(|| google.as_ref().map(|g| g.client_id.clone()))
            .or_else(|| env.var("GMAIL_CLIENT_ID"))
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = file
            .gmail
            .client_secret
            .or_else(|| google.as_ref().map(|g| g.client_secret.clone()))
            .or_else(|| env.var("GMAIL_CLIENT_SECRET"))
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;
        let redirect_port = match file.gmail.redirect_port {
            Some(port) => port,
            None => parse_env(env, "GMAIL_REDIRECT_PORT")?.unwrap_or(DEFAULT_REDIRECT_PORT),
        };

        let embedding = EmbeddingSettings {
            host: file
                .embedding
                .host
                .or_else(|| env.var("OLLAMA_HOST"))
                .unwrap_or_else(|| DEFAULT_EMBEDDING_HOST.to_string()),
            model: file
                .embedding
                .model
                .or_else(|| env.var("OLLAMA_MODEL"))
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            context_length: match file.embedding.context_length {
                Some(n) => Some(n),
                None => parse_env(env, "OLLAMA_CONTEXT_LENGTH")?,
            },
        };

        let store_path = file
            .store_path
            .or_else(|| env.var("MAILRAG_STORE").map(PathBuf::from))
            .unwrap_or_else(|| data_dir.join(STORE_FILE));

        let search_threshold = file.search_threshold.unwrap_or(DEFAULT_SEARCH_THRESHOLD);
        if !(-1.0..=1.0).contains(&search_threshold) {
            bail!("search_threshold must be within [-1, 1], got {}", search_threshold);
        }

        Ok(Self {
            gmail: GmailSettings {
                client_id,
                client_secret,
                redirect_port,
            },
            embedding,
            data_dir: data_dir.to_path_buf(),
            store_path,
            refresh_margin_secs: file.refresh_margin_secs.unwrap_or(DEFAULT_REFRESH_MARGIN_SECS),
            search_threshold,
        })
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    pub fn cursor_file(&self) -> CursorFile {
        CursorFile::in_dir(&self.data_dir)
    }

    pub fn credential_file(&self) -> CredentialFile {
        CredentialFile::in_dir(&self.data_dir)
    }
}

fn load_google_credentials(path: &Path) -> Result<Option<InstalledCredentials>> {
    if !path.exists() {
        return Ok(None);
    }
    let creds: GoogleCredentialFile = config::load_json_file(path)?;
    // Support both "installed" (desktop) and "web" credential types
    let installed = creds
        .installed
        .or(creds.web)
        .context("Credentials file missing 'installed' or 'web' section")?;
    Ok(Some(installed))
}

fn parse_env<T>(env: &dyn EnvSource, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env.var(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("{} has an invalid value: {}", key, raw))
        })
        .transpose()
}
