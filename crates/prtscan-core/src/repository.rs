use crate::error::{ReadFailure, Result, ScanError};
use git2::{
    BranchType, Cred, Direction, ErrorCode, FetchOptions, ObjectType, Oid, Reference,
    RemoteCallbacks, Repository,
};
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

/// Username sent alongside a token; GitHub only looks at the password.
pub const CREDENTIAL_USERNAME: &str = "prtscan";

/// Copy remote branches onto local branch names, as a mirror clone does.
const MIRROR_REFSPEC: &str = "+refs/heads/*:refs/heads/*";

const REMOTE_NAME: &str = "origin";

const BRANCH_PREFIX: &str = "refs/heads/";

/// A branch of the cloned repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    /// Short name, e.g. `main` or `feature/login`.
    pub name: String,
    /// Fully-qualified name, e.g. `refs/heads/main`.
    pub refname: String,
}

impl BranchRef {
    pub fn from_refname(refname: &str) -> Option<Self> {
        let name = refname.strip_prefix(BRANCH_PREFIX)?;
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            refname: refname.to_string(),
        })
    }

    fn from_reference(reference: &Reference<'_>) -> Option<Self> {
        reference.name().and_then(Self::from_refname)
    }
}

/// Authentication for one connection to the remote.
///
/// The token is offered at most once; libgit2 asks again after a rejection,
/// and a second ask means the token is bad.
fn remote_callbacks<'a>(options: &CloneOptions<'a>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(token) = options.token {
        let username = options.username;
        let mut offered = false;
        callbacks.credentials(move |_url, _username, _allowed| {
            if offered {
                return Err(git2::Error::from_str("credentials rejected by remote"));
            }
            offered = true;
            Cred::userpass_plaintext(username, token)
        });
    }
    callbacks
}

/// How to reach the remote.
#[derive(Debug, Clone)]
pub struct CloneOptions<'a> {
    /// Sent as the password of a basic-auth credential.
    pub token: Option<&'a str>,
    pub username: &'a str,
    /// History depth to fetch; `None` fetches everything.
    pub depth: Option<u32>,
}

impl Default for CloneOptions<'_> {
    fn default() -> Self {
        Self {
            token: None,
            username: CREDENTIAL_USERNAME,
            depth: Some(1),
        }
    }
}

/// A bare, shallow mirror of a remote repository.
///
/// Object storage lives in a private temporary directory that is removed when
/// the handle is dropped. Nothing is ever pushed back to the remote.
pub struct RemoteRepository {
    repo: Repository,
    // Declared after `repo` so the repository closes before its storage goes.
    _storage: TempDir,
}

impl RemoteRepository {
    /// Clone `url` without materializing a working tree.
    ///
    /// HEAD is pointed at whatever branch the remote advertises as its HEAD.
    pub fn acquire(url: &str, options: &CloneOptions<'_>) -> Result<Self> {
        let clone_err = |source: git2::Error| ScanError::Clone {
            url: url.to_string(),
            source,
        };

        let storage = tempfile::Builder::new()
            .prefix("prtscan-")
            .tempdir()
            .map_err(ScanError::Storage)?;
        debug!("Cloning {} into {}", url, storage.path().display());

        let repo = Repository::init_bare(storage.path()).map_err(clone_err)?;
        {
            let mut remote = repo
                .remote_with_fetch(REMOTE_NAME, url, MIRROR_REFSPEC)
                .map_err(clone_err)?;

            let remote_head = {
                let connection = remote
                    .connect_auth(Direction::Fetch, Some(remote_callbacks(options)), None)
                    .map_err(clone_err)?;
                // An empty remote advertises no HEAD; resolution fails later
                connection
                    .default_branch()
                    .ok()
                    .and_then(|buf| buf.as_str().map(String::from))
            };

            let mut fetch = FetchOptions::new();
            fetch.remote_callbacks(remote_callbacks(options));
            if let Some(depth) = options.depth {
                fetch.depth(i32::try_from(depth).unwrap_or(i32::MAX));
            }
            remote
                .fetch(&[] as &[&str], Some(&mut fetch), None)
                .map_err(clone_err)?;

            if let Some(head) = remote_head {
                repo.set_head(&head).map_err(ScanError::HeadResolution)?;
            }
        }

        Ok(Self {
            repo,
            _storage: storage,
        })
    }

    /// The branch the remote's HEAD points to.
    pub fn default_branch(&self) -> Result<BranchRef> {
        let head = self.repo.head().map_err(ScanError::HeadResolution)?;
        BranchRef::from_reference(&head).ok_or_else(|| {
            ScanError::HeadResolution(git2::Error::from_str("HEAD does not point to a branch"))
        })
    }

    /// All branches, `default` first and then the rest in ref-store order.
    pub fn list_branches(&self, default: &BranchRef) -> Result<Vec<BranchRef>> {
        let mut branches = vec![default.clone()];

        let iter = self
            .repo
            .branches(Some(BranchType::Local))
            .map_err(ScanError::BranchList)?;
        for entry in iter {
            let (branch, _) = entry.map_err(ScanError::BranchList)?;
            match BranchRef::from_reference(branch.get()) {
                Some(b) if b.refname != default.refname => branches.push(b),
                Some(_) => {}
                None => debug!("Skipping branch with a non UTF-8 name"),
            }
        }

        Ok(branches)
    }

    /// Open a read-only view of `dir` as it exists on `branch`.
    ///
    /// Nothing is written to disk: the view reads entries and blobs straight
    /// from the object store. Returns [`ScanError::MissingWorkflowDirectory`]
    /// when the branch has no such directory and [`ScanError::Checkout`] when
    /// the branch tip cannot be resolved.
    pub fn checkout_dir(&self, branch: &BranchRef, dir: &str) -> Result<BranchView<'_>> {
        let checkout_err = |source: git2::Error| ScanError::Checkout {
            branch: branch.name.clone(),
            source,
        };
        let dir = dir.trim_end_matches('/');

        let tree = self
            .repo
            .find_reference(&branch.refname)
            .and_then(|r| r.peel_to_tree())
            .map_err(checkout_err)?;

        let dir_id = match tree.get_path(Path::new(dir)) {
            Ok(entry) if entry.kind() == Some(ObjectType::Tree) => entry.id(),
            Ok(_) => return Err(missing_dir(branch, dir)),
            Err(e) if e.code() == ErrorCode::NotFound => return Err(missing_dir(branch, dir)),
            Err(e) => return Err(checkout_err(e)),
        };

        Ok(BranchView::new(&self.repo, &branch.name, dir, dir_id))
    }
}

fn missing_dir(branch: &BranchRef, dir: &str) -> ScanError {
    ScanError::MissingWorkflowDirectory {
        branch: branch.name.clone(),
        dir: dir.to_string(),
    }
}

/// What a directory entry is, going by its git file mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, submodules and anything else without blob content to scan.
    Other(i32),
}

impl EntryKind {
    fn from_filemode(mode: i32) -> Self {
        match mode {
            0o100644 | 0o100755 => EntryKind::File,
            0o040000 => EntryKind::Directory,
            other => EntryKind::Other(other),
        }
    }
}

/// One entry directly inside a [`BranchView`]'s directory.
#[derive(Debug, Clone)]
pub struct ViewEntry {
    pub name: String,
    pub kind: EntryKind,
    id: Oid,
}

/// The workflow directory of one branch, read from the object store.
///
/// Views borrow the repository and hold no files of their own, so dropping
/// one before opening the next costs nothing and leaves nothing behind.
pub struct BranchView<'r> {
    repo: &'r Repository,
    branch: String,
    dir: String,
    dir_id: Oid,
}

impl<'r> BranchView<'r> {
    pub(crate) fn new(repo: &'r Repository, branch: &str, dir: &str, dir_id: Oid) -> Self {
        Self {
            repo,
            branch: branch.to_string(),
            dir: dir.to_string(),
            dir_id,
        }
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Entries directly inside the directory, in tree order.
    pub fn entries(&self) -> Result<Vec<ViewEntry>> {
        let tree = self
            .repo
            .find_tree(self.dir_id)
            .map_err(|source| ScanError::DirectoryRead {
                path: self.dir.clone(),
                source,
            })?;

        Ok(tree
            .iter()
            .map(|entry| ViewEntry {
                name: String::from_utf8_lossy(entry.name_bytes()).into_owned(),
                kind: EntryKind::from_filemode(entry.filemode()),
                id: entry.id(),
            })
            .collect())
    }

    /// Content of a regular file entry. Anything else is refused rather than
    /// followed.
    pub fn read(&self, entry: &ViewEntry) -> Result<Vec<u8>> {
        let file_err = |source: ReadFailure| ScanError::FileRead {
            path: format!("{}/{}", self.dir, entry.name),
            source,
        };

        match entry.kind {
            EntryKind::File => {}
            EntryKind::Directory => {
                return Err(file_err(ReadFailure::NotRegularFile { mode: 0o040000 }))
            }
            EntryKind::Other(mode) => return Err(file_err(ReadFailure::NotRegularFile { mode })),
        }

        let blob = self
            .repo
            .find_blob(entry.id)
            .map_err(|e| file_err(e.into()))?;
        Ok(blob.content().to_vec())
    }
}
