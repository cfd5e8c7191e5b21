//! The refresh run: a linear state machine with no back-edges.
//!
//! `PREPARE → FETCH_BASELINE → ACQUIRE_INCREMENT → MERGE → ATTACH_DESCRIPTOR
//! → PUBLISH → DONE`, aborting on unrecoverable failure. Two steps can
//! downgrade instead of aborting: a failed baseline download falls back to a
//! snapshot left by an earlier run (stale-baseline mode), and a source with
//! nothing new short-circuits straight to DONE without publishing.

use std::fs;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Local;
use market_snapshot::bar::Snapshot;
use market_snapshot::merge::merge;
use market_snapshot::reader::read_snapshot;
use market_snapshot::timestamp::OffsetPolicy;
use market_snapshot::writer::write_snapshot;
use tracing::{info, warn};

use crate::config::{PathsConfig, RefreshConfig, SourceKind};
use crate::credentials::RegistryCredentials;
use crate::descriptor::{DatasetDescriptor, DatasetSlug};
use crate::registry::{RegistryClient, RetryPolicy};
use crate::source::export::{CommandTrigger, ExportFileSource};
use crate::source::postgres::PostgresSource;
use crate::source::BarSource;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A new version was uploaded with this many appended rows.
    Published {
        /// Count of rows newly appended to the snapshot.
        appended: usize,
    },
    /// The source had nothing new; no version was created.
    NoNewData,
    /// Dry-run: the merge happened locally, publishing was skipped.
    DryRun {
        /// Count of rows that would be appended.
        appended: usize,
    },
}

/// Options controlling a single run.
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Stop after the merge; report instead of publish.
    pub dry_run: bool,
    /// Override the configured source kind.
    pub source_override: Option<SourceKind>,
}

/// Executes one refresh run.
pub async fn run(cfg: &RefreshConfig, opts: RunOptions) -> anyhow::Result<RunOutcome> {
    let slug = cfg
        .dataset
        .slug
        .parse::<DatasetSlug>()
        .context("dataset.slug")?;

    // PREPARE: the working dirs belong exclusively to this run.
    prepare_dirs(&cfg.paths)?;

    let credentials = RegistryCredentials::resolve().context("registry credentials")?;
    if let Err(e) = credentials.materialize() {
        warn!(error = %e, "could not materialize credentials file; continuing");
    }
    let client = RegistryClient::new(credentials, RetryPolicy::from(&cfg.publish))?;

    // FETCH_BASELINE: non-fatal when a local snapshot from an earlier run
    // can stand in.
    let baseline_fresh = match client
        .download_file(&slug, &cfg.dataset.target_file, &cfg.paths.data_dir)
        .await
    {
        Ok(path) => {
            info!(path = %path.display(), "baseline downloaded");
            true
        }
        Err(e) => {
            warn!(error = %e, "baseline download failed; trying local snapshot");
            false
        }
    };

    let target_file = resolve_target_file(&cfg.paths, &cfg.dataset.target_file);
    let local_path = cfg.paths.data_dir.join(&target_file);

    let existing = match read_snapshot(&local_path, OffsetPolicy::Strip)
        .with_context(|| format!("read snapshot {}", local_path.display()))?
    {
        Some(snapshot) => {
            if !baseline_fresh {
                info!("running in stale-baseline mode");
            }
            info!(
                rows = snapshot.len(),
                high_water_mark = ?snapshot.high_water_mark(),
                "loaded existing snapshot"
            );
            snapshot
        }
        None if baseline_fresh => {
            // Download succeeded but produced nothing usable at this name.
            bail!(
                "baseline download left no snapshot at {}",
                local_path.display()
            );
        }
        None => {
            bail!(
                "no usable local data: baseline download failed and {} does not exist",
                local_path.display()
            );
        }
    };
    let high_water_mark = existing.high_water_mark();

    // ACQUIRE_INCREMENT: nothing new is a normal, quiet end.
    let source = build_source(cfg, opts.source_override)?;
    let incoming = source
        .fetch_since(high_water_mark)
        .await
        .context("acquire increment")?;
    if incoming.is_empty() {
        info!("source returned nothing new; skipping publish");
        return Ok(RunOutcome::NoNewData);
    }
    info!(rows = incoming.len(), "acquired candidate rows");

    // MERGE: parse or schema trouble in either input aborts the run before
    // anything is written.
    let outcome = merge(&existing.bars, &incoming);
    if outcome.is_noop() {
        info!("merge appended nothing; skipping publish");
        return Ok(RunOutcome::NoNewData);
    }

    let merged = Snapshot::new(outcome.bars, existing.dialect);
    let merged_path = cfg.paths.merged_dir.join(&target_file);
    write_snapshot(&merged, &merged_path)
        .with_context(|| format!("write merged snapshot {}", merged_path.display()))?;
    info!(
        appended = outcome.appended,
        total = merged.len(),
        path = %merged_path.display(),
        "merged snapshot written"
    );

    if opts.dry_run {
        info!("dry-run: stopping before descriptor and publish");
        return Ok(RunOutcome::DryRun {
            appended: outcome.appended,
        });
    }

    // ATTACH_DESCRIPTOR: reuse the published one when the baseline carried
    // it, otherwise synthesize.
    let mut descriptor = DatasetDescriptor::load(&cfg.paths.data_dir)
        .context("load descriptor")?
        .unwrap_or_else(|| DatasetDescriptor::for_slug(&slug, cfg.dataset.title.as_deref()));
    descriptor.ensure_id(&slug);
    descriptor
        .write(&cfg.paths.merged_dir)
        .context("write descriptor")?;

    // PUBLISH
    let version_notes = format!("Auto-update: {}", Local::now().format("%Y-%m-%d %H:%M"));
    client
        .publish(&slug, &cfg.paths.merged_dir, &version_notes)
        .await
        .context("publish new version")?;
    info!(appended = outcome.appended, "refresh complete");

    Ok(RunOutcome::Published {
        appended: outcome.appended,
    })
}

/// Clears and recreates the merged dir; ensures the data dir exists.
fn prepare_dirs(paths: &PathsConfig) -> anyhow::Result<()> {
    if paths.merged_dir.exists() {
        fs::remove_dir_all(&paths.merged_dir)
            .with_context(|| format!("clear {}", paths.merged_dir.display()))?;
    }
    fs::create_dir_all(&paths.merged_dir)
        .with_context(|| format!("create {}", paths.merged_dir.display()))?;
    fs::create_dir_all(&paths.data_dir)
        .with_context(|| format!("create {}", paths.data_dir.display()))?;
    Ok(())
}

/// Picks the snapshot file to work on.
///
/// Normally the configured name; when that file is absent, falls back to
/// whatever CSV the baseline brought, preferring a `1m` match.
fn resolve_target_file(paths: &PathsConfig, configured: &str) -> String {
    if paths.data_dir.join(configured).exists() {
        return configured.to_string();
    }

    let mut csvs: Vec<String> = fs::read_dir(&paths.data_dir)
        .ok()
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.ends_with(".csv"))
        .collect();
    csvs.sort();

    let fallback = csvs
        .iter()
        .find(|name| name.contains("1m"))
        .or_else(|| csvs.first());

    match fallback {
        Some(name) => {
            warn!(
                configured,
                using = %name,
                "configured snapshot file not found; falling back"
            );
            name.clone()
        }
        None => configured.to_string(),
    }
}

fn build_source(
    cfg: &RefreshConfig,
    source_override: Option<SourceKind>,
) -> anyhow::Result<Box<dyn BarSource + Send + Sync>> {
    let kind = source_override.unwrap_or(cfg.source.kind);
    match kind {
        SourceKind::Db => {
            let database_url = shared_utils::env::get_env_var(&cfg.source.database_url_env)?;
            Ok(Box::new(PostgresSource::new(
                database_url,
                cfg.source.symbol.clone(),
            )))
        }
        SourceKind::Export => {
            let export = cfg
                .source
                .export
                .as_ref()
                .context("source.export section required for the export source")?;
            let trigger = CommandTrigger::new(
                export.trigger_command.clone(),
                export.file.clone(),
                Duration::from_secs(export.poll_interval_secs),
            );
            Ok(Box::new(ExportFileSource::new(
                trigger,
                export.file.clone(),
                Duration::from_secs(export.timeout_secs),
            )))
        }
    }
}
