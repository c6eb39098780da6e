use crate::cancel::CancelFlag;
use crate::error::{Result, ScanError};
use crate::hasher::fingerprint;
use crate::report::{Finding, ScanSummary};
use crate::repository::{BranchRef, CloneOptions, RemoteRepository, CREDENTIAL_USERNAME};
use crate::trigger::{TriggerExtractor, TriggerMatch, TARGET_EVENT};
use crate::workflows::{WorkflowCandidate, WorkflowEnumerator, WORKFLOW_DIR};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What to scan and how to report it. Built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub repository_url: String,
    pub token: Option<String>,
    /// Report identical files on every branch instead of only the first.
    pub exhaustive: bool,
    /// Suppress progress and error narration. Findings are still emitted.
    pub quiet: bool,
}

impl ScanRequest {
    pub fn new(repository_url: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            token: None,
            exhaustive: false,
            quiet: false,
        }
    }

    /// An empty token means unauthenticated.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = if token.is_empty() { None } else { Some(token) };
        self
    }

    pub fn exhaustive(mut self, exhaustive: bool) -> Self {
        self.exhaustive = exhaustive;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

/// Tunables with defaults matching GitHub's layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub workflow_dir: String,
    pub target_event: String,
    pub trigger_match: TriggerMatch,
    pub username: String,
    pub clone_depth: Option<u32>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workflow_dir: WORKFLOW_DIR.to_string(),
            target_event: TARGET_EVENT.to_string(),
            trigger_match: TriggerMatch::Substring,
            username: CREDENTIAL_USERNAME.to_string(),
            clone_depth: Some(1),
        }
    }
}

/// Finds every workflow on every branch that declares the target trigger.
///
/// Branches are processed one at a time: each branch gets its own view of
/// the workflow directory, which is dropped before the next one is opened. Content already
/// seen on an earlier branch is skipped unless the request is exhaustive.
pub struct Scanner {
    request: ScanRequest,
    options: ScanOptions,
    extractor: TriggerExtractor,
}

impl Scanner {
    pub fn new(request: ScanRequest) -> Self {
        Self::with_options(request, ScanOptions::default())
    }

    pub fn with_options(request: ScanRequest, options: ScanOptions) -> Self {
        let extractor = TriggerExtractor::new(options.target_event.clone(), options.trigger_match);
        Self {
            request,
            options,
            extractor,
        }
    }

    /// Run the scan, handing each finding to `on_finding` as soon as it is found.
    ///
    /// Only clone, HEAD, branch-listing, directory-listing failures and
    /// cancellation end the scan early; everything else is narrated and skipped.
    pub fn scan<F>(&self, cancel: &CancelFlag, mut on_finding: F) -> Result<ScanSummary>
    where
        F: FnMut(&Finding),
    {
        let started = Instant::now();
        let mut summary = ScanSummary::new(&self.request.repository_url);

        self.narrate(|| info!("Started analyzing {}", self.request.repository_url));

        let repo = RemoteRepository::acquire(&self.request.repository_url, &self.clone_options())
            .map_err(|e| self.fatal("Error cloning repository", e))?;
        let default_branch = repo
            .default_branch()
            .map_err(|e| self.fatal("Error getting the repository HEAD", e))?;
        let branches = repo
            .list_branches(&default_branch)
            .map_err(|e| self.fatal("Error listing repository branches", e))?;
        summary.branches_total = branches.len();

        self.scan_branches(&repo, &branches, cancel, &mut summary, &mut on_finding)?;

        summary.elapsed_secs = started.elapsed().as_secs_f64();
        Ok(summary)
    }

    /// Visit `branches` in order, sharing one seen-content set across them.
    fn scan_branches<F>(
        &self,
        repo: &RemoteRepository,
        branches: &[BranchRef],
        cancel: &CancelFlag,
        summary: &mut ScanSummary,
        on_finding: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&Finding),
    {
        let enumerator = WorkflowEnumerator::new(
            &self.request.repository_url,
            &self.options.workflow_dir,
            self.request.quiet,
        );
        let mut seen = HashSet::new();

        for branch in branches {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            self.scan_branch(repo, branch, &enumerator, &mut seen, cancel, summary, on_finding)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_branch<F>(
        &self,
        repo: &RemoteRepository,
        branch: &BranchRef,
        enumerator: &WorkflowEnumerator<'_>,
        seen: &mut HashSet<String>,
        cancel: &CancelFlag,
        summary: &mut ScanSummary,
        on_finding: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&Finding),
    {
        self.narrate(|| info!("Scanning {}/tree/{}", self.request.repository_url, branch.name));

        let view = match repo.checkout_dir(branch, &self.options.workflow_dir) {
            Ok(view) => view,
            Err(ScanError::MissingWorkflowDirectory { .. }) => {
                self.narrate(|| debug!("No workflows on {}", branch.name));
                summary.branches_without_workflows += 1;
                return Ok(());
            }
            Err(e) => {
                self.narrate(|| warn!("Error checking out branch {}: {}", branch.name, e.detail()));
                summary.branches_failed += 1;
                return Ok(());
            }
        };

        let listing = enumerator
            .list_candidates(&view)
            .map_err(|e| self.fatal("Error reading workflow directory", e))?;
        summary.branches_scanned += 1;
        summary.files_unreadable += listing.unreadable;

        for candidate in &listing.candidates {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            self.check_candidate(candidate, seen, summary, on_finding);
        }

        Ok(())
    }

    fn check_candidate<F>(
        &self,
        candidate: &WorkflowCandidate,
        seen: &mut HashSet<String>,
        summary: &mut ScanSummary,
        on_finding: &mut F,
    ) where
        F: FnMut(&Finding),
    {
        summary.files_checked += 1;

        let first_seen = seen.insert(fingerprint(&candidate.content));
        if !first_seen && !self.request.exhaustive {
            self.narrate(|| debug!("Already scanned identical content, skipping {}", candidate.url));
            summary.duplicates_skipped += 1;
            return;
        }

        match self.extractor.has_target_trigger(&candidate.content) {
            Ok(true) => {
                summary.findings += 1;
                on_finding(&Finding {
                    url: candidate.url.clone(),
                    branch: candidate.branch.clone(),
                    path: candidate.path.clone(),
                });
            }
            Ok(false) => {}
            Err(e) => {
                summary.malformed_documents += 1;
                self.narrate(|| warn!("Malformed YAML for file {}: {}", candidate.url, e.detail()));
            }
        }
    }

    fn clone_options(&self) -> CloneOptions<'_> {
        CloneOptions {
            token: self.request.token.as_deref(),
            username: &self.options.username,
            depth: self.options.clone_depth,
        }
    }

    fn fatal(&self, context: &str, err: ScanError) -> ScanError {
        self.narrate(|| warn!("{}: {}: {}", context, err, err.detail()));
        err
    }

    fn narrate(&self, emit: impl FnOnce()) {
        if !self.request.quiet {
            emit();
        }
    }
}
