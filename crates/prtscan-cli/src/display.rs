use anyhow::Result;
use colored::*;
use prtscan_core::{Finding, ScanSummary};
use std::io::Write;

/// Write one finding to `out` as a single line.
pub fn write_finding(out: &mut impl Write, finding: &Finding, format: &str) -> Result<()> {
    match format {
        "json" => {
            serde_json::to_writer(&mut *out, finding)?;
            writeln!(out)?;
        }
        _ => writeln!(out, "{}", finding.url)?,
    }
    Ok(())
}

/// Print the end-of-scan summary to stderr.
pub fn print_summary(summary: &ScanSummary) {
    eprintln!();
    let headline = summary.to_string();
    if summary.findings > 0 {
        eprintln!(" {}", headline.yellow().bold());
    } else {
        eprintln!(" {}", headline.green().bold());
    }

    eprintln!(
        " {} Branches: {} scanned, {} without workflows, {} failed",
        "|-".dimmed(),
        summary.branches_scanned,
        summary.branches_without_workflows,
        summary.branches_failed
    );
    eprintln!(
        " {} Files: {} checked, {} skipped ({} duplicate, {} unreadable, {} malformed)",
        "|-".dimmed(),
        summary.files_checked,
        summary.files_skipped(),
        summary.duplicates_skipped,
        summary.files_unreadable,
        summary.malformed_documents
    );
    eprintln!(
        " {} Took {:.1}s",
        "|-".dimmed(),
        summary.elapsed_secs
    );
}

pub fn print_cancelled() {
    eprintln!(" {} Scan cancelled", "!!".red().bold());
}
