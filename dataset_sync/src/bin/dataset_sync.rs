use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use dataset_sync::config::{self, SourceKind};
use dataset_sync::run::{self, RunOptions, RunOutcome};

#[derive(Parser)]
#[command(version, about = "Dataset refresh CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Fetch new bars, merge them into the published snapshot, and upload
    /// a new dataset version.
    Refresh {
        /// Path to the run configuration (TOML).
        #[arg(long, value_name = "FILE")]
        config: String,

        /// Stop after the merge and report what would be published.
        #[arg(long)]
        dry_run: bool,

        /// Override the configured source.
        #[arg(long, value_enum)]
        source: Option<SourceKind>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Refresh {
            config,
            dry_run,
            source,
        } => {
            let cfg = config::load_config(&config)?;
            shared_utils::logging::init(Some(&cfg.paths.log_file))?;

            info!("=== starting dataset refresh ===");
            let outcome = run::run(
                &cfg,
                RunOptions {
                    dry_run,
                    source_override: source,
                },
            )
            .await?;

            match outcome {
                RunOutcome::Published { appended } => {
                    info!(appended, "new dataset version published");
                }
                RunOutcome::NoNewData => {
                    info!("nothing new; no version published");
                }
                RunOutcome::DryRun { appended } => {
                    info!(appended, "dry-run finished; would publish");
                }
            }
        }
    }

    Ok(())
}
