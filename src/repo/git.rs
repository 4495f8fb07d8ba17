//! Release commit and annotated tag, via libgit2.
//!
//! Pushing is left to the surrounding workflow.

use crate::error::ReleaseError;
use git2::{Oid, Repository, Signature};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identity used when the repository has no `user.name`/`user.email`.
#[derive(Debug, Clone)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Default for Author {
    fn default() -> Self {
        Self {
            name: "github-actions[bot]".to_string(),
            email: "github-actions[bot]@users.noreply.github.com".to_string(),
        }
    }
}

/// Open the repository containing `path`.
pub fn open_repository(path: &Path) -> Result<Repository, ReleaseError> {
    let repo = Repository::discover(path)?;
    debug!(
        "Using git repository at {}",
        repo.workdir().unwrap_or(repo.path()).display()
    );
    Ok(repo)
}

/// Whether a tag with this name already exists.
pub fn tag_exists(repo: &Repository, tag_name: &str) -> Result<bool, ReleaseError> {
    Ok(repo.find_reference(&format!("refs/tags/{}", tag_name)).is_ok())
}

fn signature(repo: &Repository, fallback: &Author) -> Result<Signature<'static>, ReleaseError> {
    match repo.signature() {
        Ok(sig) => Ok(sig.to_owned()),
        Err(_) => Ok(Signature::now(&fallback.name, &fallback.email)?),
    }
}

/// Path relative to the work tree, as the index expects.
fn relative_to_workdir(repo: &Repository, path: &Path) -> Result<PathBuf, ReleaseError> {
    let workdir = repo
        .workdir()
        .ok_or_else(|| git2::Error::from_str("repository has no work tree"))?;

    if path.is_relative() {
        return Ok(path.to_path_buf());
    }

    let canonical = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    let absolute = canonical(path);
    let root = canonical(workdir);

    absolute
        .strip_prefix(&root)
        .map(Path::to_path_buf)
        .map_err(|_| {
            ReleaseError::Git(git2::Error::from_str(&format!(
                "{} is outside the repository",
                path.display()
            )))
        })
}

/// Commit `paths` on top of HEAD and create an annotated tag on that commit.
///
/// Paths are relative to the work tree root (or absolute inside it).
pub fn commit_and_tag(
    repo: &Repository,
    paths: &[PathBuf],
    message: &str,
    tag_name: &str,
    tag_message: &str,
    author: &Author,
) -> Result<Oid, ReleaseError> {
    if tag_exists(repo, tag_name)? {
        return Err(ReleaseError::TagExists(tag_name.to_string()));
    }

    let mut index = repo.index()?;
    for path in paths {
        let relative = relative_to_workdir(repo, path)?;
        debug!("Staging {}", relative.display());
        index.add_path(&relative)?;
    }
    index.write()?;

    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let sig = signature(repo, author)?;

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
        Err(e) => return Err(e.into()),
    };
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    let commit_id = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
    info!("Created commit {}: {}", &commit_id.to_string()[..8], message);

    let target = repo.find_object(commit_id, Some(git2::ObjectType::Commit))?;
    repo.tag(tag_name, &target, &sig, tag_message, false)?;
    info!("Created tag {}", tag_name);

    Ok(commit_id)
}
