//! Marker-delimited document rendering.
//!
//! The badge block in the README lives between a start and an end marker.
//! Rendering replaces exactly that span and nothing else.

use crate::error::ReleaseError;

/// The pair of sentinels that delimit the generated block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub start: String,
    pub end: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            start: "<!-- CDK_VERSIONS_START -->".to_string(),
            end: "<!-- CDK_VERSIONS_END -->".to_string(),
        }
    }
}

/// Byte offset of the single occurrence of `marker`.
fn find_once(document: &str, marker: &str) -> Result<usize, ReleaseError> {
    let mut matches = document.match_indices(marker);
    let first = matches
        .next()
        .map(|(idx, _)| idx)
        .ok_or_else(|| ReleaseError::MarkerMissing(marker.to_string()))?;

    let extra = matches.count();
    if extra > 0 {
        return Err(ReleaseError::MarkerDuplicated {
            marker: marker.to_string(),
            count: extra + 1,
        });
    }

    Ok(first)
}

/// Replace the content between the markers with `block`.
///
/// Everything before the start marker and after the end marker is kept
/// byte-for-byte. Fails when either marker is missing, repeated, or the
/// markers are in the wrong order.
pub fn render(document: &str, block: &str, markers: &Markers) -> Result<String, ReleaseError> {
    let start = find_once(document, &markers.start)?;
    let end = find_once(document, &markers.end)?;

    let content_start = start + markers.start.len();
    if end < content_start {
        return Err(ReleaseError::MarkersOutOfOrder);
    }

    let mut output = String::with_capacity(document.len() + block.len());
    output.push_str(&document[..content_start]);
    output.push('\n');
    if !block.is_empty() {
        output.push_str(block);
        output.push('\n');
    }
    output.push_str(&document[end..]);

    Ok(output)
}
