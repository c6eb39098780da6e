use crate::error::{Result, ScanError};
use crate::repository::{BranchView, EntryKind, ViewEntry};
use tracing::{debug, warn};

/// Directory that holds GitHub Actions workflow definitions.
pub const WORKFLOW_DIR: &str = ".github/workflows";

/// A workflow file read from one branch.
#[derive(Debug, Clone)]
pub struct WorkflowCandidate {
    pub branch: String,
    /// Path relative to the repository root.
    pub path: String,
    pub url: String,
    pub content: Vec<u8>,
}

/// Workflow files found on one branch.
#[derive(Debug, Clone, Default)]
pub struct WorkflowListing {
    pub candidates: Vec<WorkflowCandidate>,
    /// Files that matched the extension filter but could not be read.
    pub unreadable: usize,
}

/// Lists workflow files in a branch view.
pub struct WorkflowEnumerator<'a> {
    repository_url: &'a str,
    workflow_dir: &'a str,
    quiet: bool,
}

impl<'a> WorkflowEnumerator<'a> {
    pub fn new(repository_url: &'a str, workflow_dir: &'a str, quiet: bool) -> Self {
        Self {
            repository_url,
            workflow_dir,
            quiet,
        }
    }

    /// Display URL of a workflow file on `branch`.
    pub fn file_url(&self, branch: &str, file_name: &str) -> String {
        format!(
            "{}/blob/{}/{}/{}",
            self.repository_url, branch, self.workflow_dir, file_name
        )
    }

    /// Read every `.yml`/`.yaml` regular file directly inside the view's
    /// directory, in file-name order.
    ///
    /// Entries that cannot be read, including symlinks and submodules that
    /// carry a workflow name, are reported and skipped. Failing to list the
    /// directory itself is fatal.
    pub fn list_candidates(&self, view: &BranchView<'_>) -> Result<WorkflowListing> {
        let branch = view.branch();
        let mut entries: Vec<ViewEntry> = view
            .entries()?
            .into_iter()
            .filter(|e| e.kind != EntryKind::Directory)
            // Not a workflow, probably a README or similar
            .filter(|e| is_workflow_file(&e.name))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let mut listing = WorkflowListing::default();
        listing.candidates.reserve(entries.len());
        for entry in &entries {
            match view.read(entry) {
                Ok(content) => listing.candidates.push(WorkflowCandidate {
                    branch: branch.to_string(),
                    path: format!("{}/{}", self.workflow_dir, entry.name),
                    url: self.file_url(branch, &entry.name),
                    content,
                }),
                Err(err) => {
                    self.report(&err);
                    listing.unreadable += 1;
                }
            }
        }
        if !self.quiet && listing.candidates.is_empty() {
            debug!("No workflow files in {} on {}", self.workflow_dir, branch);
        }

        Ok(listing)
    }

    fn report(&self, err: &ScanError) {
        if !self.quiet {
            warn!("{}: {}", err, err.detail());
        }
    }
}

/// Workflow files end in `.yml` or `.yaml`, matched case-sensitively.
pub fn is_workflow_file(name: &str) -> bool {
    name.ends_with(".yml") || name.ends_with(".yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{write_tree, FILE_MODE, SYMLINK_MODE};
    use git2::{Oid, Repository};

    const REPO: &str = "https://github.com/octo/repo";

    fn enumerator() -> WorkflowEnumerator<'static> {
        WorkflowEnumerator::new(REPO, WORKFLOW_DIR, true)
    }

    fn bare_repo() -> (tempfile::TempDir, Repository) {
        let tmp = tempfile::tempdir().unwrap();
        let repo = Repository::init_bare(tmp.path()).unwrap();
        (tmp, repo)
    }

    #[test]
    fn test_lists_yaml_files_in_name_order() {
        let (_tmp, repo) = bare_repo();
        let dir = write_tree(
            &repo,
            &[
                ("release.yaml", "on: push", FILE_MODE),
                ("ci.yml", "on: pull_request_target", FILE_MODE),
                ("README.md", "# workflows", FILE_MODE),
                ("LEGACY.YML", "on: push", FILE_MODE),
                ("nested/inner.yml", "on: push", FILE_MODE),
            ],
        );
        let view = BranchView::new(&repo, "dev", WORKFLOW_DIR, dir);

        let listing = enumerator().list_candidates(&view).unwrap();
        let paths: Vec<&str> = listing.candidates.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![".github/workflows/ci.yml", ".github/workflows/release.yaml"]
        );
        assert_eq!(listing.unreadable, 0);

        let first = &listing.candidates[0];
        assert_eq!(first.branch, "dev");
        assert_eq!(first.content, b"on: pull_request_target");
        assert_eq!(
            first.url,
            "https://github.com/octo/repo/blob/dev/.github/workflows/ci.yml"
        );
    }

    #[test]
    fn test_symlinked_workflow_is_unreadable() {
        let (_tmp, repo) = bare_repo();
        let dir = write_tree(
            &repo,
            &[
                ("evil.yml", "/etc/passwd", SYMLINK_MODE),
                ("ci.yml", "on: push", FILE_MODE),
            ],
        );
        let view = BranchView::new(&repo, "main", WORKFLOW_DIR, dir);

        let listing = enumerator().list_candidates(&view).unwrap();
        assert_eq!(listing.candidates.len(), 1);
        assert_eq!(listing.candidates[0].path, ".github/workflows/ci.yml");
        assert_eq!(listing.unreadable, 1);
    }

    #[test]
    fn test_directory_that_cannot_be_listed_is_fatal() {
        let (_tmp, repo) = bare_repo();
        let gone = Oid::from_str("89abcdef0123456789abcdef0123456789abcdef").unwrap();
        let view = BranchView::new(&repo, "main", WORKFLOW_DIR, gone);

        let err = enumerator().list_candidates(&view).unwrap_err();
        assert!(matches!(err, ScanError::DirectoryRead { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_is_workflow_file() {
        assert!(is_workflow_file("ci.yml"));
        assert!(is_workflow_file("deploy.yaml"));
        assert!(!is_workflow_file("ci.YML"));
        assert!(!is_workflow_file("ci.yml.bak"));
        assert!(!is_workflow_file("README.md"));
    }
}
