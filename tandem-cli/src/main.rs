use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use tandem_engine::{Reconciler, RunConfig, RunOutcome};
use tandem_transfer::{CommandProvider, RemoteSpec};

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Bidirectional tree reconciliation over an external transfer engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Remote tree root, as `name:` or `name:path`
    remote: String,

    /// Local tree root
    local_path: PathBuf,

    /// First run: establish the baseline from the union of both trees.
    /// Local files may overwrite remote versions. Asserts --verbose.
    #[arg(short = '1', long)]
    first_sync: bool,

    /// Require the access marker file on both sides before trusting
    /// deletions
    #[arg(long)]
    check_access: bool,

    /// Bypass the deletion-volume safety check. Asserts --verbose.
    #[arg(short, long)]
    force: bool,

    /// File of exclusion patterns applied to both trees
    #[arg(short, long)]
    exclude_list_file: Option<PathBuf>,

    /// Walk the full pipeline without copying or deleting anything.
    /// Asserts --verbose.
    #[arg(long)]
    dry_run: bool,

    /// Never delete local files
    #[arg(short, long)]
    no_local_delete: bool,

    /// Abort when inferred deletions exceed this percentage of the
    /// baseline
    #[arg(long, default_value_t = 10.0)]
    max_delete: f64,

    /// Log per-file detail
    #[arg(short, long)]
    verbose: bool,

    /// Transfer engine verbosity (repeatable). Asserts --verbose.
    #[arg(long = "tv", action = clap::ArgAction::Count)]
    transfer_verbose: u8,

    /// Directory for baseline listings and the run lock
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Transfer engine binary to invoke
    #[arg(long, default_value = "rclone")]
    transfer_bin: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose =
        cli.verbose || cli.first_sync || cli.force || cli.dry_run || cli.transfer_verbose > 0;
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match run(cli).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<RunOutcome> {
    // Configuration problems are fatal here, before any lock or tree is
    // touched
    let remote = RemoteSpec::parse(&cli.remote)
        .with_context(|| format!("cannot parse remote {:?}", cli.remote))?;
    if !cli.local_path.is_dir() {
        bail!("local path {} cannot be accessed", cli.local_path.display());
    }
    let local_root = cli
        .local_path
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", cli.local_path.display()))?;

    let exclude_patterns = match &cli.exclude_list_file {
        Some(path) => load_patterns(path)
            .with_context(|| format!("cannot read exclude list {}", path.display()))?,
        None => Vec::new(),
    };

    info!("reconciling {remote} with {}", local_root.display());

    let provider = CommandProvider::new(
        cli.transfer_bin,
        cli.transfer_verbose,
        cli.exclude_list_file.clone(),
    );

    let mut config = RunConfig::new(remote, local_root);
    config.exclude_patterns = exclude_patterns;
    config.dry_run = cli.dry_run;
    config.first_run = cli.first_sync;
    config.check_access = cli.check_access;
    config.force = cli.force;
    config.max_delete_percent = cli.max_delete;
    config.no_local_delete = cli.no_local_delete;
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }

    let reconciler = Reconciler::new(config, Arc::new(provider));
    let report = reconciler.run().await;

    match report.outcome {
        RunOutcome::Success => info!("all done"),
        RunOutcome::SkippedLocked => info!("skipped: another run owns this pair"),
        RunOutcome::Abort => error!("aborted; rerun when the cause is fixed"),
        RunOutcome::Critical => {
            error!("critical abort; baseline quarantined, rerun with --first-sync to recover")
        }
    }
    Ok(report.outcome)
}

/// Read exclusion patterns, one per line; blank lines and `#` comments
/// are skipped
fn load_patterns(path: &PathBuf) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
