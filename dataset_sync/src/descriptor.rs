//! Dataset descriptor handling (`dataset-metadata.json`).
//!
//! The registry refuses a version upload unless the folder carries a
//! descriptor whose `id` matches the target collection. Descriptors usually
//! arrive alongside the downloaded baseline; when none does, a minimal one
//! is synthesized. Registry-side fields this pipeline does not understand
//! are preserved verbatim on the round trip.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// File name the registry expects next to the dataset files.
pub const DESCRIPTOR_FILE: &str = "dataset-metadata.json";

/// Errors from descriptor loading, validation, or writing.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The descriptor file exists but is not valid JSON of the right shape.
    #[error("malformed descriptor at {path}")]
    Malformed {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A collection identifier was not of the `owner/slug` form.
    #[error("invalid dataset slug {0:?}: expected \"owner/slug\"")]
    InvalidSlug(String),

    /// A generic I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Serialization failed.
    #[error("cannot serialize descriptor")]
    Serialize(#[from] serde_json::Error),
}

/// A validated `owner/slug` collection identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSlug {
    owner: String,
    slug: String,
}

impl DatasetSlug {
    /// The owner half.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The slug half.
    pub fn slug(&self) -> &str {
        &self.slug
    }
}

impl FromStr for DatasetSlug {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, slug)) if !owner.is_empty() && !slug.is_empty() && !slug.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    slug: slug.to_string(),
                })
            }
            _ => Err(DescriptorError::InvalidSlug(s.to_string())),
        }
    }
}

impl fmt::Display for DatasetSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.slug)
    }
}

/// One license entry in a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    /// Registry license identifier, e.g. "CC0-1.0".
    pub name: String,
}

/// Metadata record identifying and licensing a published dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Collection identifier, `owner/slug`.
    pub id: String,
    /// Human-readable dataset title.
    pub title: String,
    /// Licenses attached to the dataset.
    #[serde(default)]
    pub licenses: Vec<License>,
    /// Any registry fields this pipeline does not model, kept for the
    /// round trip.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DatasetDescriptor {
    /// Synthesizes a minimal descriptor for `slug`.
    pub fn for_slug(slug: &DatasetSlug, title: Option<&str>) -> Self {
        Self {
            id: slug.to_string(),
            title: title.unwrap_or("XAUUSD Gold Price Historical Data").to_string(),
            licenses: vec![License {
                name: "CC0-1.0".to_string(),
            }],
            extra: serde_json::Map::new(),
        }
    }

    /// Loads the descriptor colocated with the dataset files in `dir`, or
    /// `None` when there is none.
    pub fn load(dir: &Path) -> Result<Option<Self>, DescriptorError> {
        let path = dir.join(DESCRIPTOR_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        let descriptor =
            serde_json::from_str(&raw).map_err(|source| DescriptorError::Malformed {
                path: path.clone(),
                source,
            })?;
        Ok(Some(descriptor))
    }

    /// Forces `id` to match `slug`. Returns true when a repair was needed.
    pub fn ensure_id(&mut self, slug: &DatasetSlug) -> bool {
        let want = slug.to_string();
        if self.id != want {
            info!(from = %self.id, to = %want, "repairing descriptor id");
            self.id = want;
            return true;
        }
        false
    }

    /// Writes the descriptor into `dir` as pretty-printed JSON and returns
    /// the file path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, DescriptorError> {
        let path = dir.join(DESCRIPTOR_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}
