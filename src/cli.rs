//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cdkwatch - release gate for packages that bundle AWS CDK
///
/// Tracks the latest upstream release of each configured library, tells the
/// scheduled workflow whether a new downstream release is needed, and
/// produces the release texts (badges, summary, version bump, tag).
///
/// Examples:
///   cdkwatch check
///   cdkwatch check --github-output "$GITHUB_OUTPUT"
///   cdkwatch record
///   cdkwatch release --dry-run
///   cdkwatch summary --json
///   cdkwatch init
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .cdkwatch.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress spinner)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding the version records
    #[arg(long, value_name = "DIR", env = "CDKWATCH_STORE_DIR", global = true)]
    pub store_dir: Option<PathBuf>,

    /// GitHub token for API requests (raises the rate limit)
    #[arg(
        long,
        value_name = "TOKEN",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        global = true
    )]
    pub github_token: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Compare recorded versions with upstream and print the gate JSON
    ///
    /// Always exits 0 once a decision is made; exits 1 only when no
    /// decision could be made at all.
    Check {
        /// Only check these libraries (comma-separated)
        #[arg(long, value_name = "NAMES", value_delimiter = ',')]
        libraries: Option<Vec<String>>,

        /// Append `update-required=<bool>` to this file (GitHub Actions output)
        #[arg(long, value_name = "FILE")]
        github_output: Option<PathBuf>,
    },

    /// Fetch upstream releases and persist them to the store
    Record {
        /// Only record these libraries (comma-separated)
        #[arg(long, value_name = "NAMES", value_delimiter = ',')]
        libraries: Option<Vec<String>>,

        /// Fetch but do not write; print the resulting summary
        #[arg(long)]
        dry_run: bool,
    },

    /// Render badges, bump the package version, commit and tag
    Release {
        /// Compute and print everything, change nothing
        #[arg(long)]
        dry_run: bool,

        /// Print the release metadata as JSON
        #[arg(long)]
        json: bool,

        /// Write files but skip the git commit and tag
        #[arg(long)]
        no_git: bool,
    },

    /// Print the bundled-versions summary from the store
    Summary {
        /// Print entries as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Generate a default .cdkwatch.toml configuration file
    Init,
}

/// Global options that consume the following argument as their value.
const VALUE_OPTIONS: &[&str] = &["-c", "--config", "--store-dir", "--github-token"];

/// Subcommand named on a raw command line, whether or not it parses.
///
/// `raw` includes the program name, as in `std::env::args()`.
pub fn raw_subcommand<I, S>(raw: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = raw.into_iter().skip(1);
    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        if VALUE_OPTIONS.contains(&arg) {
            iter.next();
        } else if !arg.starts_with('-') {
            return Some(arg.to_string());
        }
    }
    None
}

impl Args {
    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        let selection = match &self.command {
            Command::Check { libraries, .. } | Command::Record { libraries, .. } => {
                libraries.as_deref()
            }
            _ => None,
        };
        if let Some(names) = selection {
            if names.is_empty() || names.iter().any(|n| n.trim().is_empty()) {
                return Err("--libraries must list at least one non-empty name".to_string());
            }
        }

        if let Some(ref token) = self.github_token {
            if token.trim().is_empty() {
                return Err("GitHub token must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            command,
            config: None,
            verbose: false,
            quiet: false,
            store_dir: None,
            github_token: None,
        }
    }

    #[test]
    fn test_parse_check_with_libraries() {
        let args = Args::try_parse_from([
            "cdkwatch",
            "check",
            "--libraries",
            "aws-cdk,cdk-pipelines",
            "--github-output",
            "out.txt",
        ])
        .unwrap();

        assert_eq!(
            args.command,
            Command::Check {
                libraries: Some(vec!["aws-cdk".to_string(), "cdk-pipelines".to_string()]),
                github_output: Some(PathBuf::from("out.txt")),
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["cdkwatch", "release", "--dry-run", "-v", "--store-dir", "s"])
                .unwrap();
        assert!(args.verbose);
        assert_eq!(args.store_dir, Some(PathBuf::from("s")));
        assert!(matches!(
            args.command,
            Command::Release {
                dry_run: true,
                json: false,
                no_git: false
            }
        ));
    }

    #[test]
    fn test_raw_subcommand_skips_global_options() {
        assert_eq!(
            raw_subcommand(["cdkwatch", "check", "--bogus"]).as_deref(),
            Some("check")
        );
        assert_eq!(
            raw_subcommand(["cdkwatch", "-c", "check.toml", "-v", "check", "-q"]).as_deref(),
            Some("check")
        );
        assert_eq!(
            raw_subcommand(["cdkwatch", "--store-dir=state", "record"]).as_deref(),
            Some("record")
        );
        assert_eq!(raw_subcommand(["cdkwatch", "--bogus"]), None);
    }

    #[test]
    fn test_invalid_check_invocations_are_still_checks() {
        for argv in [
            vec!["cdkwatch", "check", "-v", "-q"],
            vec!["cdkwatch", "check", "--libraries", ","],
            vec!["cdkwatch", "check", "--bogus"],
        ] {
            let invalid = match Args::try_parse_from(&argv) {
                Ok(args) => args.validate().is_err(),
                Err(e) => e.use_stderr(),
            };
            assert!(invalid, "{:?} should be rejected", argv);
            assert_eq!(raw_subcommand(&argv).as_deref(), Some("check"));
        }
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Args::try_parse_from(["cdkwatch"]).is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Command::Init);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_empty_library_name() {
        let args = make_args(Command::Record {
            libraries: Some(vec!["aws-cdk".to_string(), " ".to_string()]),
            dry_run: false,
        });
        assert!(args.validate().is_err());

        let args = make_args(Command::Check {
            libraries: None,
            github_output: None,
        });
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::Summary { json: false });
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
