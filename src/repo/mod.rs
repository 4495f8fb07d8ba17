//! Downstream repository operations: package version bump and release
//! commit/tag.

pub mod git;
pub mod pyproject;

pub use git::{commit_and_tag, open_repository, tag_exists, Author};
