//! Upstream release sources.
//!
//! The detector only sees an [`UpstreamSnapshot`]; where the versions come
//! from is behind the [`VersionSource`] trait.

pub mod github;

pub use github::{GitHubReleases, GitHubSettings};

use crate::error::FetchError;
use crate::models::{TrackedLibrary, UpstreamRelease, UpstreamSnapshot};
use async_trait::async_trait;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Something that can report the latest release of a library.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn latest_release(&self, library: &TrackedLibrary) -> Result<UpstreamRelease, FetchError>;
}

/// Query every library concurrently and wait for all of them.
///
/// A failure for one library never aborts the others; it lands in
/// `failures` instead.
pub async fn fetch_all<S>(
    source: &S,
    libraries: &[TrackedLibrary],
    show_progress: bool,
) -> UpstreamSnapshot
where
    S: VersionSource + ?Sized,
{
    let spinner = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!(
            "Querying upstream releases for {} libraries...",
            libraries.len()
        ));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let results = join_all(libraries.iter().map(|library| async move {
        debug!("Fetching latest release of {}", library.repository);
        (library, source.latest_release(library).await)
    }))
    .await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let mut snapshot = UpstreamSnapshot::default();
    for (library, result) in results {
        match result {
            Ok(release) => {
                info!("Upstream {} is at {}", library.name, release.version);
                snapshot.releases.insert(library.name.clone(), release);
            }
            Err(e) => {
                warn!("Failed to fetch upstream release for {}: {}", library.name, e);
                snapshot.failures.insert(library.name.clone(), e.to_string());
            }
        }
    }

    snapshot
}
