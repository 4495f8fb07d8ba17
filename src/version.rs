//! Semantic version handling for upstream and downstream versions.
//!
//! Upstream tags are not always clean semver (`v2.199.0`, `2.1`,
//! `1.2.3.4`), so parsing normalises them before handing off to `semver`.

use crate::error::VersionError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A library or package version with a total ordering.
///
/// Equality and ordering follow `semver::Version` (build metadata included,
/// so the ordering is total). Use [`LibraryVersion::is_equivalent`] to
/// decide whether two versions denote the same release.
#[derive(Debug, Clone)]
pub struct LibraryVersion {
    version: semver::Version,
}

impl LibraryVersion {
    /// Parse and normalise a version string.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let raw = input.trim();
        let stripped = strip_v_prefix(raw);

        if stripped.is_empty() {
            return Err(VersionError {
                input: input.to_string(),
                reason: "empty version".to_string(),
            });
        }

        let version = match semver::Version::parse(stripped) {
            Ok(v) => v,
            Err(first) => normalize_core(stripped)
                .and_then(|candidate| semver::Version::parse(&candidate).ok())
                .ok_or_else(|| VersionError {
                    input: input.to_string(),
                    reason: first.to_string(),
                })?,
        };

        Ok(Self { version })
    }

    /// Whether both versions denote the same release.
    ///
    /// Build metadata is ignored, pre-release identifiers are not.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.version.cmp_precedence(&other.version) == Ordering::Equal
    }

    /// Next minor release: `1.4.2-rc.1` becomes `1.5.0`.
    pub fn bump_minor(&self) -> Self {
        Self {
            version: semver::Version::new(self.version.major, self.version.minor + 1, 0),
        }
    }
}

impl PartialEq for LibraryVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for LibraryVersion {}

impl PartialOrd for LibraryVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LibraryVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

impl FromStr for LibraryVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Normalised form, without any `v` prefix.
impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}

/// Strip a single leading `v`/`V` from a tag-style version.
pub fn strip_v_prefix(s: &str) -> &str {
    s.strip_prefix('v')
        .or_else(|| s.strip_prefix('V'))
        .unwrap_or(s)
}

/// Normalise the version for storage: `v2.1` -> `2.1.0`.
///
/// Falls back to the prefix-stripped input when it cannot be parsed, so the
/// detector can still report it as a version error later.
pub fn normalize_for_storage(input: &str) -> Result<String, String> {
    match LibraryVersion::parse(input) {
        Ok(v) => Ok(v.to_string()),
        Err(_) => Err(strip_v_prefix(input.trim()).to_string()),
    }
}

/// Pad or truncate a numeric `MAJOR[.MINOR[.PATCH[.X...]]]` core to three parts.
fn normalize_core(input: &str) -> Option<String> {
    let split_at = input.find(['-', '+']).unwrap_or(input.len());
    let (core, suffix) = input.split_at(split_at);

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    parts.truncate(3);
    while parts.len() < 3 {
        parts.push("0");
    }

    Some(format!("{}{}", parts.join("."), suffix))
}
