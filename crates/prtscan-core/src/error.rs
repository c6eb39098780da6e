use thiserror::Error;

/// Everything that can go wrong while scanning a repository.
///
/// Only [`ScanError::is_fatal`] variants ever escape [`crate::scan::Scanner::scan`];
/// the rest are narrated and the scan moves on to the next branch or file.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to clone {url}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("failed to create local storage for the clone")]
    Storage(#[source] std::io::Error),

    #[error("failed to resolve the default branch")]
    HeadResolution(#[source] git2::Error),

    #[error("failed to list repository branches")]
    BranchList(#[source] git2::Error),

    #[error("failed to read workflow directory {path}")]
    DirectoryRead {
        path: String,
        #[source]
        source: git2::Error,
    },

    #[error("failed to check out branch {branch}")]
    Checkout {
        branch: String,
        #[source]
        source: git2::Error,
    },

    #[error("branch {branch} has no {dir} directory")]
    MissingWorkflowDirectory { branch: String, dir: String },

    #[error("failed to read workflow file {path}")]
    FileRead {
        path: String,
        #[source]
        source: ReadFailure,
    },

    #[error("malformed YAML")]
    MalformedDocument(#[source] serde_yaml::Error),

    #[error("scan cancelled")]
    Cancelled,
}

/// Why a workflow file's content could not be read from the branch tree.
#[derive(Debug, Error)]
pub enum ReadFailure {
    #[error(transparent)]
    Git(#[from] git2::Error),

    /// Symlinks and submodules have no content of their own to scan.
    #[error("not a regular file (mode {mode:o})")]
    NotRegularFile { mode: i32 },
}

impl ScanError {
    /// Whether this error aborts the whole scan.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::Clone { .. }
                | ScanError::Storage(_)
                | ScanError::HeadResolution(_)
                | ScanError::BranchList(_)
                | ScanError::DirectoryRead { .. }
                | ScanError::Cancelled
        )
    }

    /// The innermost cause, for narration next to the error itself.
    pub fn detail(&self) -> String {
        let mut source = std::error::Error::source(self);
        let mut detail = None;
        while let Some(cause) = source {
            detail = Some(cause.to_string());
            source = cause.source();
        }
        detail.unwrap_or_else(|| "no further detail".to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
