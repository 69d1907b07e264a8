/*
File: forma-aio/src/git.rs
Purpose: Git checkouts for head builds using git2.
*/
use std::path::{Path, PathBuf};

use forma_common::error::{FormaError, Result};
use git2::build::RepoBuilder;
use git2::FetchOptions;
use tracing::{debug, error};

/// Clones `branch` of `url` into `dest` and returns the checked-out commit id.
/// Contains blocking network and filesystem I/O.
pub fn clone_branch(url: &str, branch: &str, dest: &Path) -> Result<String> {
    debug!("Cloning {} (branch {}) into {}", url, branch, dest.display());

    let mut fetch_options = FetchOptions::new();
    // libgit2's local transport cannot do shallow fetches
    if !is_local_url(url) {
        fetch_options.depth(1);
    }

    let repo = RepoBuilder::new()
        .branch(branch)
        .fetch_options(fetch_options)
        .clone(url, dest)
        .map_err(|e| {
            error!("Failed clone {} ({}): {}", url, branch, e);
            FormaError::FetchUnavailable(
                dest.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                url.to_string(),
                format!("git clone of branch '{branch}' failed: {e}"),
            )
        })?;

    let head = repo.head()?;
    let commit = head.peel_to_commit()?;
    let id = commit.id().to_string();
    debug!("Checked out {} at {}", branch, id);
    Ok(id)
}

fn is_local_url(url: &str) -> bool {
    url.starts_with("file://") || Path::new(url).is_absolute()
}

pub async fn clone_branch_async(url: &str, branch: &str, dest: &Path) -> Result<String> {
    let url = url.to_string();
    let branch = branch.to_string();
    let dest: PathBuf = dest.to_path_buf();
    tokio::task::spawn_blocking(move || clone_branch(&url, &branch, &dest))
        .await
        .map_err(|e| FormaError::Generic(format!("JoinError in git clone: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_a_local_branch() {
        let upstream = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(upstream.path()).unwrap();
        std::fs::write(upstream.path().join("CMakeLists.txt"), "project(x)").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("CMakeLists.txt")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("forma", "forma@example.com").unwrap();
        let commit = repo
            .commit(Some("refs/heads/main"), &sig, &sig, "init", &tree, &[])
            .unwrap();

        let dest = tempfile::tempdir().unwrap();
        let checkout = dest.path().join("ccap");
        let url = format!("file://{}", upstream.path().display());
        let id = clone_branch(&url, "main", &checkout).unwrap();
        assert_eq!(id, commit.to_string());
        assert!(checkout.join("CMakeLists.txt").is_file());
    }

    #[test]
    fn missing_branch_is_fetch_unavailable() {
        let upstream = tempfile::tempdir().unwrap();
        git2::Repository::init(upstream.path()).unwrap();
        let dest = tempfile::tempdir().unwrap();
        let url = format!("file://{}", upstream.path().display());
        let err = clone_branch(&url, "nope", &dest.path().join("x")).unwrap_err();
        assert!(matches!(err, FormaError::FetchUnavailable(..)));
    }
}
