mod display;

use anyhow::{Context, Result};
use clap::Parser;
use prtscan_core::{
    CancelFlag, ScanError, ScanOptions, ScanRequest, ScanSummary, Scanner, TriggerMatch,
};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(
    name = "prtscan",
    version,
    about = "Discover all pull_request_target workflows in a repository.",
    long_about = "Pull Request Target Scan (prtscan) finds every GitHub Actions workflow that uses the \
pull_request_target event, on every branch of a repository.\n\nWorkflows triggered by this event run \
with write permissions and secrets while being triggerable from forks, which makes them a common \
privilege-escalation target."
)]
struct Cli {
    /// Repository URL, e.g. https://github.com/owner/repo
    repository: String,

    /// GitHub token, sent as a basic-auth password (empty means anonymous)
    #[arg(short, long, default_value = "", hide_default_value = true)]
    token: String,

    /// Report identical files in different branches
    #[arg(short, long)]
    complete: bool,

    /// Suppress progress and error output; findings are still printed
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show debug output, such as skipped duplicates
    #[arg(short, long)]
    verbose: bool,

    /// Require an exact pull_request_target event name instead of a substring match
    #[arg(long)]
    strict: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

const EXIT_OK: u8 = 0;
const EXIT_FATAL: u8 = 1;
/// Exit status for a scan stopped by an interrupt.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let level = if quiet {
        LevelFilter::OFF
    } else if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let quiet = cli.quiet;
    let format = cli.format;
    let request = ScanRequest::new(cli.repository)
        .with_token(cli.token)
        .exhaustive(cli.complete)
        .quiet(quiet);
    let options = ScanOptions {
        trigger_match: if cli.strict {
            TriggerMatch::Exact
        } else {
            TriggerMatch::Substring
        },
        ..Default::default()
    };

    let cancel = CancelFlag::new();
    watch_for_interrupt(cancel.clone());

    let scanner = Scanner::with_options(request, options);
    let (result, write_error) = tokio::task::spawn_blocking(move || {
        let mut stdout = std::io::stdout().lock();
        let mut write_error = None;
        let result = scanner.scan(&cancel, |finding| {
            if write_error.is_some() {
                return;
            }
            if let Err(e) = display::write_finding(&mut stdout, finding, &format) {
                // stdout is gone (closed pipe); nothing left to report to
                cancel.cancel();
                write_error = Some(e);
            }
        });
        (result, write_error)
    })
    .await
    .context("Scan worker failed")?;

    if let Some(e) = write_error {
        return Err(e.context("Failed to write finding"));
    }

    if !quiet {
        match &result {
            Ok(summary) => display::print_summary(summary),
            Err(ScanError::Cancelled) => display::print_cancelled(),
            // Already narrated by the scanner
            Err(_) => {}
        }
    }
    Ok(ExitCode::from(exit_status(&result)))
}

/// Process exit status for a finished scan. Findings never affect it.
fn exit_status(result: &prtscan_core::Result<ScanSummary>) -> u8 {
    match result {
        Ok(_) => EXIT_OK,
        Err(ScanError::Cancelled) => EXIT_INTERRUPTED,
        Err(_) => EXIT_FATAL,
    }
}

/// First Ctrl-C stops the scan at the next branch or file; a second one exits.
fn watch_for_interrupt(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(EXIT_INTERRUPTED.into());
        }
    });
}
