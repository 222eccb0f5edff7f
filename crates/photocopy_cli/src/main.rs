use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use photocopy_io_fs::{EnumRunStatus, ReportRun, run_pipeline};

mod cli;

use cli::Cli;

const EXIT_FATAL: u8 = 1;
const EXIT_PARTIAL: u8 = 3;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = photocopy_log::init_logging(&cli.to_log_config()) {
        eprintln!("warning: logging disabled: {err}");
    }

    match run(&cli) {
        Ok(EnumRunStatus::Complete) => ExitCode::SUCCESS,
        Ok(EnumRunStatus::Partial) => ExitCode::from(EXIT_PARTIAL),
        Ok(EnumRunStatus::Failed) => ExitCode::from(EXIT_FATAL),
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: &Cli) -> Result<EnumRunStatus> {
    tracing::info!(
        "Sorting {} into {} destination(s)",
        cli.source.display(),
        cli.destinations.len()
    );
    let report_run = run_pipeline(&cli.source, &cli.destinations, cli.to_run_options())
        .with_context(|| format!("photocopy run on {} failed", cli.source.display()))?;
    print_summary(&report_run);

    let status = report_run.status();
    match status {
        EnumRunStatus::Complete => tracing::info!("All destinations processed"),
        EnumRunStatus::Partial => tracing::warn!("Some destinations were abandoned"),
        EnumRunStatus::Failed => tracing::error!("No destination could be written"),
    }
    Ok(status)
}

fn print_summary(report_run: &ReportRun) {
    println!("{report_run}");
    if let Some(report_stage) = &report_run.report_stage {
        println!("{}", report_stage.format("[BUFFER]"));
    }
    for report_destination in &report_run.reports_destination {
        println!("{}", report_destination.format("[DEST]"));
    }
    for path_file in &report_run.paths_unclassifiable {
        tracing::debug!("Not sorted (no capture date): {}", path_file.display());
    }
}
