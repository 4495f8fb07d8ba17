//! Release text generation.
//!
//! Everything here is derived from the version store and must be
//! byte-identical for identical store contents, since the summary ends up
//! in an immutable tag annotation.

use crate::error::ReleaseError;
use crate::models::{LibraryVersionRecord, ReleaseMetadata};
use crate::version::{strip_v_prefix, LibraryVersion};

/// Records sorted by library name, whatever the input order.
fn ordered<'a, I>(records: I) -> Vec<&'a LibraryVersionRecord>
where
    I: IntoIterator<Item = &'a LibraryVersionRecord>,
{
    let mut sorted: Vec<_> = records.into_iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));
    sorted
}

/// `"{name} v{version}"` for one record.
pub fn version_entry(record: &LibraryVersionRecord) -> String {
    format!("{} v{}", record.name, strip_v_prefix(record.version.trim()))
}

/// Entries for every record, sorted by name.
pub fn version_entries<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a LibraryVersionRecord>,
{
    ordered(records).into_iter().map(version_entry).collect()
}

/// `"a v1.0.0, b v2.0.0"`; used as the tag annotation.
pub fn build_version_summary<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a LibraryVersionRecord>,
{
    version_entries(records).join(", ")
}

/// Escape a shields.io static badge path segment.
fn shields_escape(s: &str) -> String {
    s.replace('-', "--").replace('_', "__").replace(' ', "_")
}

/// One shields.io badge for a record.
pub fn badge_line(record: &LibraryVersionRecord, color: &str) -> String {
    let version = strip_v_prefix(record.version.trim());
    format!(
        "![{} v{}](https://img.shields.io/badge/{}-v{}-{})",
        record.name,
        version,
        shields_escape(&record.name),
        shields_escape(version),
        color
    )
}

/// One badge per record, newline-separated, in summary order.
pub fn build_badge_block<'a, I>(records: I, color: &str) -> String
where
    I: IntoIterator<Item = &'a LibraryVersionRecord>,
{
    ordered(records)
        .into_iter()
        .map(|r| badge_line(r, color))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Options that shape the generated release texts.
#[derive(Debug, Clone)]
pub struct ReleaseTextOptions {
    pub badge_color: String,
    pub tag_prefix: String,
}

impl Default for ReleaseTextOptions {
    fn default() -> Self {
        Self {
            badge_color: "blue".to_string(),
            tag_prefix: "v".to_string(),
        }
    }
}

/// Compute every release text from the store contents and the current
/// downstream package version. The downstream version always gets a minor
/// bump.
pub fn build_release_metadata<'a, I>(
    records: I,
    current_version: &str,
    options: &ReleaseTextOptions,
) -> Result<ReleaseMetadata, ReleaseError>
where
    I: IntoIterator<Item = &'a LibraryVersionRecord>,
{
    let sorted = ordered(records);
    if sorted.is_empty() {
        return Err(ReleaseError::EmptyStore);
    }

    let current = LibraryVersion::parse(current_version)?;
    let next = current.bump_minor();

    let entries = version_entries(sorted.iter().copied());
    let summary = entries.join(", ");
    let badge_block = build_badge_block(sorted.iter().copied(), &options.badge_color);

    Ok(ReleaseMetadata {
        entries,
        summary,
        badge_block,
        current_version: current.to_string(),
        next_version: next.to_string(),
        tag_name: format!("{}{}", options.tag_prefix, next),
        commit_message: format!("Bump version to {}", next),
    })
}

/// Plain-text rendering of the metadata for terminal output.
pub fn generate_text_summary(metadata: &ReleaseMetadata) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Version: {} -> {}\n",
        metadata.current_version, metadata.next_version
    ));
    output.push_str(&format!("Tag: {}\n", metadata.tag_name));
    output.push_str(&format!("Commit: {}\n", metadata.commit_message));
    output.push_str(&format!("Bundled: {}\n", metadata.summary));

    output
}

/// Pretty JSON rendering of the metadata.
pub fn generate_json_report(metadata: &ReleaseMetadata) -> serde_json::Result<String> {
    serde_json::to_string_pretty(metadata)
}
