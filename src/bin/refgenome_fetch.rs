use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use refgenome_fetch::config::ConfigLoader;
use refgenome_fetch::domain::Selection;
use refgenome_fetch::error::GenomeError;
use refgenome_fetch::orchestrator::GenomeOrchestrator;
use refgenome_fetch::output::{HumanOutput, JsonOutput, OutputMode};
use refgenome_fetch::progress::{ConsoleProgress, NoProgress, ProgressSink};
use refgenome_fetch::transport::HttpTransport;

#[derive(Parser)]
#[command(name = "refgenome-fetch")]
#[command(about = "Download and lay out reference genome assets for a genome build")]
#[command(version, author)]
struct Cli {
    /// Genome build (mm9, mm10, hg19, hg38) or `dependencies`.
    data: Selection,

    /// Output root, created if absent.
    #[arg(default_value = ".")]
    path: Utf8PathBuf,

    /// Re-download assets whose destination already exists.
    #[arg(long)]
    overwrite: bool,

    #[arg(long)]
    config: Option<String>,

    /// Number of assets acquired concurrently.
    #[arg(long)]
    jobs: Option<usize>,

    /// Keep transfers whose length differs from the declared Content-Length.
    #[arg(long)]
    lenient_transfers: bool,

    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Print the build report as JSON.
    #[arg(long)]
    json: bool,
}

/// Raised after printing the report when any asset failed.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{failed} asset(s) failed")]
struct FailedAssets {
    failed: usize,
    transfer_only: bool,
}

impl FailedAssets {
    fn exit_code(&self) -> u8 {
        if self.transfer_only { 3 } else { 4 }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(genome) = report.downcast_ref::<GenomeError>() {
            return ExitCode::from(map_exit_code(genome));
        }
        if let Some(failed) = report.downcast_ref::<FailedAssets>() {
            return ExitCode::from(failed.exit_code());
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GenomeError) -> u8 {
    match error {
        GenomeError::InvalidBuild(_)
        | GenomeError::MissingConfig(_)
        | GenomeError::ConfigRead(_)
        | GenomeError::ConfigParse(_) => 2,
        err if err.is_transfer() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(jobs) = cli.jobs {
        if jobs == 0 {
            return Err(GenomeError::ConfigParse("--jobs must be at least 1".to_string()).into());
        }
        config.jobs = jobs;
    }
    if cli.lenient_transfers {
        config.strict_transfers = false;
    }
    if let Some(dir) = cli.staging_dir {
        config.staging_dir = dir;
    }

    let transport = HttpTransport::new(Duration::from_secs(config.connect_timeout_secs))?;
    let orchestrator = GenomeOrchestrator::new(transport, config);

    let progress: Box<dyn ProgressSink> = match output_mode {
        OutputMode::Json => Box::new(NoProgress),
        OutputMode::Human => Box::new(ConsoleProgress::new()),
    };
    let report =
        orchestrator.acquire_genome(cli.data, &cli.path, cli.overwrite, progress.as_ref())?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_report(&report).into_diagnostic()?,
    }

    if !report.is_success() {
        return Err(FailedAssets {
            failed: report.failed(),
            transfer_only: report.failed_on_transfer_only(),
        }
        .into());
    }
    Ok(())
}
