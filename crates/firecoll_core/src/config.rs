//! Client configuration resolved from the process environment.
//!
//! # Responsibility
//! - Locate and parse the service-account credentials file.
//! - Resolve the project id and optional local store/logging settings.
//!
//! # Invariants
//! - `PROJECT_ID` (or `GOOGLE_CLOUD_PROJECT`) wins over the credentials file.
//! - A configured credentials path must point to a readable JSON object
//!   with a `type` field; a broken file is an error, never silently skipped.
//! - Empty variables are treated as unset.

use crate::model::secret::SecretString;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const PROJECT_ID_ENV: &str = "PROJECT_ID";
pub const PROJECT_ID_FALLBACK_ENV: &str = "GOOGLE_CLOUD_PROJECT";
pub const DATABASE_PATH_ENV: &str = "FIRECOLL_DATABASE_PATH";
pub const LOG_LEVEL_ENV: &str = "FIRECOLL_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "FIRECOLL_LOG_DIR";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    CredentialsUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    CredentialsInvalid {
        path: PathBuf,
        source: serde_json::Error,
    },
    MissingProjectId,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CredentialsUnreadable { path, source } => write!(
                f,
                "cannot read credentials file `{}`: {source}",
                path.display()
            ),
            Self::CredentialsInvalid { path, source } => write!(
                f,
                "credentials file `{}` is not valid: {source}",
                path.display()
            ),
            Self::MissingProjectId => write!(
                f,
                "no project id configured; set `{PROJECT_ID_ENV}` or provide a credentials file with `project_id`"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CredentialsUnreadable { source, .. } => Some(source),
            Self::CredentialsInvalid { source, .. } => Some(source),
            Self::MissingProjectId => None,
        }
    }
}

/// Parsed service-account (or authorized-user) credentials file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub private_key: Option<SecretString>,
}

impl Credentials {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::CredentialsUnreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::CredentialsInvalid {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolved settings for opening a document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub project_id: String,
    pub credentials_path: Option<PathBuf>,
    pub credentials: Option<Credentials>,
    /// Local SQLite store location; `None` means in-memory.
    pub database_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Configuration for a known project without credentials.
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            credentials_path: None,
            credentials: None,
            database_path: None,
            log_level: None,
            log_dir: None,
        }
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Reads configuration from process environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let credentials_path = get(CREDENTIALS_ENV).map(PathBuf::from);
        let credentials = credentials_path
            .as_deref()
            .map(Credentials::from_file)
            .transpose()?;

        let project_id = get(PROJECT_ID_ENV)
            .or_else(|| get(PROJECT_ID_FALLBACK_ENV))
            .or_else(|| {
                credentials
                    .as_ref()
                    .and_then(|credentials| credentials.project_id.clone())
                    .filter(|value| !value.trim().is_empty())
            })
            .ok_or(ConfigError::MissingProjectId)?;

        Ok(Self {
            project_id,
            credentials_path,
            credentials,
            database_path: get(DATABASE_PATH_ENV).map(PathBuf::from),
            log_level: get(LOG_LEVEL_ENV),
            log_dir: get(LOG_DIR_ENV).map(PathBuf::from),
        })
    }
}
