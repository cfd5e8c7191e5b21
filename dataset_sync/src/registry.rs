//! Dataset registry client (Kaggle API v1).
//!
//! Two operations matter to the pipeline: downloading the currently
//! published snapshot file (the merge baseline) and creating a new dataset
//! version from a prepared folder. Version creation is wrapped in a bounded
//! retry with linearly increasing backoff; only transport-class failures are
//! retried. Authentication problems and a missing or mismatched descriptor
//! are precondition failures and fail immediately.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::credentials::RegistryCredentials;
use crate::descriptor::{DatasetDescriptor, DatasetSlug, DESCRIPTOR_FILE};

const BASE_URL: &str = "https://www.kaggle.com/api/v1";

/// Errors that can occur while talking to the dataset registry.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The registry could not be reached (network failure, timeout).
    #[error("cannot reach dataset registry: {0}")]
    Connection(#[from] reqwest::Error),

    /// The registry answered with an error status.
    #[error("registry API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it was readable.
        message: String,
    },

    /// A publish precondition failed; retrying cannot help.
    #[error("publish precondition failed: {0}")]
    Precondition(String),

    /// A generic I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::Connection(_) => true,
            PublishError::Api { status, .. } => *status >= 500,
            PublishError::Precondition(_) | PublishError::Io(_) => false,
        }
    }
}

/// Bounded retry with linearly increasing backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff after the first failure; attempt `n` waits `n * base_delay`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to sleep after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Runs `op` under `policy`, retrying retryable failures with linear backoff.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, PublishError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PublishError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e,
                    "registry call failed; backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionFile {
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewVersionRequest<'a> {
    version_notes: &'a str,
    files: Vec<VersionFile>,
}

/// HTTP client for the dataset registry.
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
    credentials: RegistryCredentials,
    retry: RetryPolicy,
}

impl RegistryClient {
    /// Creates a client with the production registry endpoint.
    pub fn new(credentials: RegistryCredentials, retry: RetryPolicy) -> Result<Self, PublishError> {
        Self::with_base_url(credentials, retry, BASE_URL)
    }

    /// Creates a client against an alternate endpoint.
    pub fn with_base_url(
        credentials: RegistryCredentials,
        retry: RetryPolicy,
        base_url: impl Into<String>,
    ) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            credentials,
            retry,
        })
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(
            &self.credentials.username,
            Some(self.credentials.key.expose_secret()),
        )
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, PublishError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown registry error".to_string());
        if status.as_u16() == 401 || status.as_u16() == 403 {
            // Mismatched key or a collection someone else owns.
            return Err(PublishError::Precondition(format!(
                "registry refused credentials ({status}): check KAGGLE_USERNAME and KAGGLE_KEY \
                 and that the dataset slug belongs to this account: {message}"
            )));
        }
        Err(PublishError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Downloads the published `file_name` of `slug` into `dest_dir`.
    ///
    /// Returns the local path written.
    pub async fn download_file(
        &self,
        slug: &DatasetSlug,
        file_name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, PublishError> {
        let url = format!("{}/datasets/download/{}/{}", self.base_url, slug, file_name);
        let response = self.authed(self.http.get(&url)).send().await?;
        let response = self.check(response).await?;
        let bytes = response.bytes().await?;

        std::fs::create_dir_all(dest_dir)?;
        let dest = dest_dir.join(file_name);
        std::fs::write(&dest, &bytes)?;
        info!(file = file_name, bytes = bytes.len(), "downloaded baseline");
        Ok(dest)
    }

    async fn upload_file(&self, path: &Path) -> Result<String, PublishError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PublishError::Precondition(format!("unusable file name: {}", path.display())))?
            .to_string();
        let bytes = std::fs::read(path)?;

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}/datasets/upload/file", self.base_url);
        let response = self.authed(self.http.post(&url)).multipart(form).send().await?;
        let response = self.check(response).await?;
        let upload: UploadResponse = response.json().await?;
        info!(file = %file_name, "uploaded dataset file");
        Ok(upload.token)
    }

    /// Creates a new dataset version from the files in `folder`.
    ///
    /// Every file except the descriptor is uploaded; the descriptor rides
    /// along in the version request itself.
    pub async fn create_version(
        &self,
        slug: &DatasetSlug,
        folder: &Path,
        version_notes: &str,
    ) -> Result<(), PublishError> {
        let mut files = Vec::new();
        let mut entries: Vec<PathBuf> = std::fs::read_dir(folder)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.file_name().is_some_and(|n| n != DESCRIPTOR_FILE))
            .collect();
        entries.sort();

        if entries.is_empty() {
            return Err(PublishError::Precondition(format!(
                "nothing to publish in {}",
                folder.display()
            )));
        }

        for path in &entries {
            let token = self.upload_file(path).await?;
            files.push(VersionFile { token });
        }

        let url = format!(
            "{}/datasets/create/version/{}/{}",
            self.base_url,
            slug.owner(),
            slug.slug()
        );
        let body = NewVersionRequest {
            version_notes,
            files,
        };
        let response = self.authed(self.http.post(&url)).json(&body).send().await?;
        self.check(response).await?;
        info!(%slug, notes = version_notes, "created dataset version");
        Ok(())
    }

    /// Publishes `folder` as a new version of `slug`, retrying per the
    /// client's policy.
    ///
    /// Precondition: `folder` must contain a descriptor whose id matches
    /// `slug`; this is validated before the first network call and never
    /// retried.
    pub async fn publish(
        &self,
        slug: &DatasetSlug,
        folder: &Path,
        version_notes: &str,
    ) -> Result<(), PublishError> {
        validate_descriptor(folder, slug)?;
        with_retry(&self.retry, || {
            self.create_version(slug, folder, version_notes)
        })
        .await
    }
}

/// Checks that `folder` carries a well-formed descriptor matching `slug`.
fn validate_descriptor(folder: &Path, slug: &DatasetSlug) -> Result<(), PublishError> {
    let descriptor = DatasetDescriptor::load(folder)
        .map_err(|e| PublishError::Precondition(e.to_string()))?
        .ok_or_else(|| {
            PublishError::Precondition(format!(
                "missing {DESCRIPTOR_FILE} in {}",
                folder.display()
            ))
        })?;
    if descriptor.id != slug.to_string() {
        return Err(PublishError::Precondition(format!(
            "descriptor id {:?} does not match target collection {}",
            descriptor.id, slug
        )));
    }
    Ok(())
}
