use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A workflow file that declares the target trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// `<repository>/blob/<branch>/<path>`
    pub url: String,
    pub branch: String,
    pub path: String,
}

/// Counters collected over one scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub repository: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub branches_total: usize,
    pub branches_scanned: usize,
    pub branches_without_workflows: usize,
    pub branches_failed: usize,
    pub files_checked: usize,
    pub duplicates_skipped: usize,
    pub files_unreadable: usize,
    pub malformed_documents: usize,
    pub findings: usize,
}

impl ScanSummary {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Files that were skipped without a trigger check.
    pub fn files_skipped(&self) -> usize {
        self.duplicates_skipped + self.files_unreadable + self.malformed_documents
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scan completed successfully: {} finding(s) in {} file(s) across {}/{} branch(es)",
            self.findings, self.files_checked, self.branches_scanned, self.branches_total
        )
    }
}
