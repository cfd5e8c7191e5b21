//! Run configuration: parsing and validation.
//!
//! The refresh run is described by a small TOML file. Secrets never live in
//! it: the database URL is named by environment variable, and registry
//! credentials come from [`crate::credentials`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::descriptor::DatasetSlug;
use crate::registry::RetryPolicy;

/// Top-level run configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshConfig {
    /// Target dataset on the registry.
    pub dataset: DatasetConfig,
    /// Where new bars come from.
    pub source: SourceConfig,
    /// Publish retry knobs.
    #[serde(default)]
    pub publish: PublishConfig,
    /// Working directories and log file.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// The registry collection this run refreshes.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Collection identifier, `owner/slug`.
    pub slug: String,
    /// Title used when a descriptor has to be synthesized.
    pub title: Option<String>,
    /// Snapshot file within the collection.
    #[serde(default = "default_target_file")]
    pub target_file: String,
}

/// Which source implementation a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Query the operational PostgreSQL schema.
    #[default]
    Db,
    /// Trigger and read a trading-terminal export file.
    Export,
}

/// Source configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Default source implementation; the CLI can override.
    #[serde(default)]
    pub kind: SourceKind,
    /// Instrument symbol to fetch, e.g. "XAUUSD".
    pub symbol: String,
    /// Name of the environment variable holding the database URL.
    #[serde(default = "default_database_url_env")]
    pub database_url_env: String,
    /// Terminal-export settings; required when `kind = "export"`.
    pub export: Option<ExportConfig>,
}

/// Terminal-export settings.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Path where the external application drops its export.
    pub file: PathBuf,
    /// Program plus arguments that poke the external application.
    pub trigger_command: Vec<String>,
    /// How long to wait for the export file, in seconds.
    #[serde(default = "default_export_timeout_secs")]
    pub timeout_secs: u64,
    /// Poll interval while waiting, in seconds.
    #[serde(default = "default_export_poll_secs")]
    pub poll_interval_secs: u64,
}

/// Publish retry knobs.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    /// Total upload attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff in milliseconds; attempt `n` waits `n` times this.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl From<&PublishConfig> for RetryPolicy {
    fn from(cfg: &PublishConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.base_delay_ms),
        }
    }
}

/// Working directories and log file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Where the downloaded baseline lands.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Where the merged output and descriptor are staged for upload.
    /// Cleared and recreated at the start of every run.
    #[serde(default = "default_merged_dir")]
    pub merged_dir: PathBuf,
    /// Log file, appended to across runs.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            merged_dir: default_merged_dir(),
            log_file: default_log_file(),
        }
    }
}

fn default_target_file() -> String {
    "XAU_1m_data.csv".to_string()
}

fn default_database_url_env() -> String {
    "DATABASE_URL".to_string()
}

fn default_export_timeout_secs() -> u64 {
    120
}

fn default_export_poll_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_merged_dir() -> PathBuf {
    PathBuf::from("merged_data")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("dataset_sync.log")
}

/// Reads and validates a [`RefreshConfig`] from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<RefreshConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let cfg: RefreshConfig = toml::from_str(&text).context("failed to parse config TOML")?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &RefreshConfig) -> anyhow::Result<()> {
    cfg.dataset
        .slug
        .parse::<DatasetSlug>()
        .context("dataset.slug")?;
    anyhow::ensure!(
        !cfg.dataset.target_file.trim().is_empty(),
        "dataset.target_file cannot be empty"
    );
    anyhow::ensure!(
        !cfg.source.symbol.trim().is_empty(),
        "source.symbol cannot be empty"
    );
    if cfg.source.kind == SourceKind::Export {
        let export = cfg
            .source
            .export
            .as_ref()
            .context("source.export section required when source.kind = \"export\"")?;
        anyhow::ensure!(
            !export.trigger_command.is_empty(),
            "source.export.trigger_command cannot be empty"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [dataset]
        slug = "novandraanugrah/xauusd-gold-price-historical-data-2004present"

        [source]
        symbol = "XAUUSD"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg: RefreshConfig = toml::from_str(MINIMAL).unwrap();
        validate(&cfg).unwrap();

        assert_eq!(cfg.dataset.target_file, "XAU_1m_data.csv");
        assert_eq!(cfg.source.kind, SourceKind::Db);
        assert_eq!(cfg.source.database_url_env, "DATABASE_URL");
        assert_eq!(cfg.publish.max_attempts, 3);
        assert_eq!(cfg.paths.merged_dir, PathBuf::from("merged_data"));

        let retry = RetryPolicy::from(&cfg.publish);
        assert_eq!(retry.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn export_kind_requires_export_section() {
        let cfg: RefreshConfig = toml::from_str(
            r#"
            [dataset]
            slug = "owner/name"

            [source]
            kind = "export"
            symbol = "XAUUSD"
            "#,
        )
        .unwrap();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn export_section_parses() {
        let cfg: RefreshConfig = toml::from_str(
            r#"
            [dataset]
            slug = "owner/name"

            [source]
            kind = "export"
            symbol = "XAUUSD"

            [source.export]
            file = "/var/terminal/export/XAUUSD_M1.csv"
            trigger_command = ["xdotool", "key", "ctrl+shift+e"]
            "#,
        )
        .unwrap();
        validate(&cfg).unwrap();
        let export = cfg.source.export.unwrap();
        assert_eq!(export.timeout_secs, 120);
        assert_eq!(export.trigger_command[0], "xdotool");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = toml::from_str::<RefreshConfig>(
            r#"
            [dataset]
            slug = "owner/name"
            surprise = true

            [source]
            symbol = "XAUUSD"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("surprise"));
    }

    #[test]
    fn bad_slug_fails_validation() {
        let cfg: RefreshConfig = toml::from_str(
            r#"
            [dataset]
            slug = "not-a-slug"

            [source]
            symbol = "XAUUSD"
            "#,
        )
        .unwrap();
        assert!(validate(&cfg).is_err());
    }
}
