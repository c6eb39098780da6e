use crate::repository::{CloneOptions, RemoteRepository};
use git2::{Oid, Repository, Signature};
use std::collections::BTreeMap;
use tempfile::TempDir;

pub const FILE_MODE: i32 = 0o100644;
pub const SYMLINK_MODE: i32 = 0o120000;

/// Write a tree holding `files` (slash-separated paths) and return its id.
pub fn write_tree(repo: &Repository, files: &[(&str, &str, i32)]) -> Oid {
    let mut builder = repo.treebuilder(None).unwrap();
    let mut subdirs: BTreeMap<&str, Vec<(&str, &str, i32)>> = BTreeMap::new();

    for (path, content, mode) in files {
        match path.split_once('/') {
            Some((dir, rest)) => subdirs.entry(dir).or_default().push((rest, *content, *mode)),
            None => {
                let blob = repo.blob(content.as_bytes()).unwrap();
                builder.insert(*path, blob, *mode).unwrap();
            }
        }
    }
    for (dir, entries) in subdirs {
        let subtree = write_tree(repo, &entries);
        builder.insert(dir, subtree, 0o040000).unwrap();
    }

    builder.write().unwrap()
}

/// Commit `files` as the only commit of `refs/heads/<branch>`.
pub fn commit_branch(repo: &Repository, branch: &str, files: &[(&str, &str, i32)]) {
    let tree = repo.find_tree(write_tree(repo, files)).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    repo.commit(Some(&format!("refs/heads/{branch}")), &sig, &sig, "init", &tree, &[])
        .unwrap();
}

/// A bare remote with a single `main` branch holding `files`, plus its clone.
pub fn cloned_remote(files: &[(&str, &str, i32)]) -> (TempDir, RemoteRepository) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init_bare(dir.path()).unwrap();
    commit_branch(&repo, "main", files);
    repo.set_head("refs/heads/main").unwrap();

    let clone = RemoteRepository::acquire(
        dir.path().to_str().unwrap(),
        &CloneOptions {
            // the local transport does not negotiate shallow fetches
            depth: None,
            ..Default::default()
        },
    )
    .unwrap();
    (dir, clone)
}
