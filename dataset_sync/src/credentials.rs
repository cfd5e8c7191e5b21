//! Registry credential resolution.
//!
//! Credentials come from the environment first (`KAGGLE_USERNAME` plus
//! `KAGGLE_KEY`, with `KAGGLE_API_TOKEN` accepted as the key's newer alias),
//! then from a `kaggle.json` in the user's config directories. When only the
//! environment is set, [`RegistryCredentials::materialize`] can write the
//! file so sibling tooling authenticates the same way.

use std::fs;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from credential resolution.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// Nothing usable was found in the environment or on disk.
    #[error(
        "no registry credentials: set KAGGLE_USERNAME and KAGGLE_KEY (or KAGGLE_API_TOKEN), \
         or provide a kaggle.json"
    )]
    Missing,

    /// A credentials file exists but cannot be parsed.
    #[error("malformed credentials file {path}")]
    Malformed {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A generic I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Serialization failed.
    #[error("cannot serialize credentials")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct CredentialsFile {
    username: String,
    key: String,
}

/// Username + API key pair for the dataset registry.
pub struct RegistryCredentials {
    /// Account name the uploads run as.
    pub username: String,
    /// API key; kept out of Debug output and logs.
    pub key: SecretString,
}

impl RegistryCredentials {
    /// Resolves credentials from the environment, falling back to
    /// `kaggle.json` in the known config locations.
    pub fn resolve() -> Result<Self, CredentialsError> {
        if let (Ok(username), Ok(key)) = (
            shared_utils::env::get_env_var("KAGGLE_USERNAME"),
            shared_utils::env::get_env_var_any(&["KAGGLE_KEY", "KAGGLE_API_TOKEN"]),
        ) {
            return Ok(Self {
                username,
                key: SecretString::new(key.into()),
            });
        }

        for path in Self::config_paths() {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(&path)?;
            let file: CredentialsFile =
                serde_json::from_str(&raw).map_err(|source| CredentialsError::Malformed {
                    path: path.clone(),
                    source,
                })?;
            info!(path = %path.display(), "using credentials file");
            return Ok(Self {
                username: file.username,
                key: SecretString::new(file.key.into()),
            });
        }

        Err(CredentialsError::Missing)
    }

    /// Writes `kaggle.json` (mode 0600) into the primary config location
    /// when no credentials file exists yet.
    ///
    /// Returns the path written, or `None` when a file was already present
    /// or no home directory could be determined.
    pub fn materialize(&self) -> Result<Option<PathBuf>, CredentialsError> {
        let paths = Self::config_paths();
        if paths.iter().any(|p| p.exists()) {
            return Ok(None);
        }
        let Some(target) = paths.first().cloned() else {
            warn!("no home directory; skipping credentials file");
            return Ok(None);
        };

        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = CredentialsFile {
            username: self.username.clone(),
            key: self.key.expose_secret().to_string(),
        };
        fs::write(&target, serde_json::to_string(&file)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(0o600))?;
        }

        info!(path = %target.display(), "materialized credentials file");
        Ok(Some(target))
    }

    /// Known `kaggle.json` locations, preferred first.
    fn config_paths() -> Vec<PathBuf> {
        let Some(home) = std::env::var_os("HOME").map(PathBuf::from) else {
            return Vec::new();
        };
        vec![
            home.join(".config").join("kaggle").join("kaggle.json"),
            home.join(".kaggle").join("kaggle.json"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_file_shape_parses() {
        let file: CredentialsFile =
            serde_json::from_str(r#"{"username": "someone", "key": "abc123"}"#).unwrap();
        assert_eq!(file.username, "someone");
        assert_eq!(file.key, "abc123");
    }

    #[test]
    fn credentials_file_round_trips() {
        let file = CredentialsFile {
            username: "someone".to_string(),
            key: "abc123".to_string(),
        };
        let json = serde_json::to_string(&file).unwrap();
        assert!(json.contains("\"username\""));
        let back: CredentialsFile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.username, file.username);
    }
}
