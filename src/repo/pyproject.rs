//! Downstream package version in `pyproject.toml`.
//!
//! The version is read through `toml` but written back by editing only the
//! value on the `version = "..."` line, so formatting and comments survive.

use crate::error::ReleaseError;

/// Tables that may carry the package version, in lookup order.
const VERSION_TABLES: &[&[&str]] = &[&["project"], &["tool", "poetry"]];

fn lookup<'a>(doc: &'a toml::Table, path: &[&str]) -> Option<&'a toml::Table> {
    let mut table = doc;
    for key in path {
        table = table.get(*key)?.as_table()?;
    }
    Some(table)
}

/// Locate the package version, returning it and its table's header name.
fn locate_version(content: &str) -> Result<(String, String), ReleaseError> {
    let doc: toml::Table = content
        .parse()
        .map_err(|e: toml::de::Error| ReleaseError::Manifest(e.message().to_string()))?;

    for path in VERSION_TABLES {
        let Some(table) = lookup(&doc, path) else {
            continue;
        };

        if let Some(version) = table.get("version").and_then(|v| v.as_str()) {
            return Ok((version.to_string(), path.join(".")));
        }

        let dynamic = table
            .get("dynamic")
            .and_then(|d| d.as_array())
            .is_some_and(|items| items.iter().any(|i| i.as_str() == Some("version")));
        if dynamic {
            return Err(ReleaseError::Manifest(format!(
                "[{}] declares a dynamic version",
                path.join(".")
            )));
        }
    }

    Err(ReleaseError::Manifest(
        "no version in [project] or [tool.poetry]".to_string(),
    ))
}

/// Read the package version.
pub fn read_version(content: &str) -> Result<String, ReleaseError> {
    locate_version(content).map(|(version, _)| version)
}

/// Header name of a `[table]` line, if this is one.
fn table_header(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('[')?;
    if inner.starts_with('[') {
        // Array of tables; never holds the package version.
        return Some("");
    }
    let end = inner.find(']')?;
    Some(inner[..end].trim())
}

/// Rewrite the package version, keeping the rest of the file intact.
pub fn set_version(content: &str, new_version: &str) -> Result<String, ReleaseError> {
    let (current, table) = locate_version(content)?;

    let mut in_table = false;
    let mut replaced = false;
    let mut output = String::with_capacity(content.len() + 8);

    for line in content.split_inclusive('\n') {
        if let Some(header) = table_header(line) {
            in_table = header == table;
        } else if in_table && !replaced {
            let key = line.split('=').next().unwrap_or("").trim();
            if key == "version" {
                let old_literal = format!("\"{}\"", current);
                let old_single = format!("'{}'", current);
                let rewritten = if line.contains(&old_literal) {
                    line.replacen(&old_literal, &format!("\"{}\"", new_version), 1)
                } else if line.contains(&old_single) {
                    line.replacen(&old_single, &format!("'{}'", new_version), 1)
                } else {
                    return Err(ReleaseError::Manifest(format!(
                        "cannot rewrite version line in [{}]: {}",
                        table,
                        line.trim_end()
                    )));
                };
                output.push_str(&rewritten);
                replaced = true;
                continue;
            }
        }
        output.push_str(line);
    }

    if !replaced {
        return Err(ReleaseError::Manifest(format!(
            "version key for [{}] is not on its own line",
            table
        )));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYPROJECT: &str = r#"[build-system]
requires = ["hatchling"]
build-backend = "hatchling.build"

[project]
name = "konokenj.cdk-api-mcp-server"
# bumped by the release workflow
version = "0.4.2"
requires-python = ">=3.10"

[tool.ruff]
target-version = "py310"
"#;

    #[test]
    fn test_read_project_version() {
        assert_eq!(read_version(PYPROJECT).unwrap(), "0.4.2");
    }

    #[test]
    fn test_read_poetry_version() {
        let content = "[tool.poetry]\nname = \"x\"\nversion = '1.2.3'\n";
        assert_eq!(read_version(content).unwrap(), "1.2.3");
    }

    #[test]
    fn test_set_version_only_touches_version_line() {
        let updated = set_version(PYPROJECT, "0.5.0").unwrap();
        assert_eq!(updated, PYPROJECT.replace("version = \"0.4.2\"", "version = \"0.5.0\""));
        // target-version in another table is untouched
        assert!(updated.contains("target-version = \"py310\""));
        assert_eq!(read_version(&updated).unwrap(), "0.5.0");
    }

    #[test]
    fn test_set_poetry_version_single_quotes() {
        let content = "[tool.poetry]\nname = \"x\"\nversion = '1.2.3'  # pinned\n";
        let updated = set_version(content, "1.3.0").unwrap();
        assert_eq!(updated, "[tool.poetry]\nname = \"x\"\nversion = '1.3.0'  # pinned\n");
    }

    #[test]
    fn test_dynamic_version_is_an_error() {
        let content = "[project]\nname = \"x\"\ndynamic = [\"version\"]\n";
        assert!(matches!(read_version(content), Err(ReleaseError::Manifest(_))));
    }

    #[test]
    fn test_missing_version_is_an_error() {
        assert!(read_version("[project]\nname = \"x\"\n").is_err());
        assert!(read_version("not = [valid").is_err());
    }

    #[test]
    fn test_inline_table_version_cannot_be_rewritten() {
        let content = "project = { name = \"x\", version = \"1.0.0\" }\n";
        assert_eq!(read_version(content).unwrap(), "1.0.0");
        assert!(set_version(content, "1.1.0").is_err());
    }
}
