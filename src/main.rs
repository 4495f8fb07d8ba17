//! cdkwatch - upstream release tracking for packages that bundle AWS CDK
//!
//! A CLI tool run by a scheduled workflow: it records the latest upstream
//! release of each tracked library, decides whether a downstream release
//! is needed, and prepares that release (badges, version bump, tag).
//!
//! Exit codes:
//!   0 - Success (for `check`: a decision was made, even with fetch failures)
//!   1 - Runtime error (corrupt store, config, marker/tag problems, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod repo;
mod store;
mod upstream;
mod version;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Command};
use config::{Config, DEFAULT_CONFIG_FILE};
use models::{LibraryVersionRecord, UpdateCheckResult};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use error::ReleaseError;
use store::{FileVersionStore, MemoryVersionStore, VersionStore};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use upstream::{GitHubReleases, VersionSource};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let raw: Vec<String> = std::env::args_os()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    let args = match Args::try_parse_from(&raw) {
        Ok(args) => args,
        Err(e) => {
            // The gate parses stdout even when the invocation itself is wrong.
            if e.use_stderr() && cli::raw_subcommand(&raw).as_deref() == Some("check") {
                let rendered = e.render().to_string();
                let message = rendered.lines().next().unwrap_or("invalid arguments");
                print_check_result(&UpdateCheckResult::failed(message));
                let _ = e.print();
                std::process::exit(1);
            }
            e.exit();
        }
    };

    // Validate arguments
    if let Err(e) = args.validate() {
        if matches!(args.command, Command::Check { .. }) {
            print_check_result(&UpdateCheckResult::failed(e.clone()));
        }
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init early (no config or logging needed)
    if args.command == Command::Init {
        return handle_init();
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            if matches!(args.command, Command::Check { .. }) {
                print_check_result(&UpdateCheckResult::failed(format!("{:#}", e)));
            }
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&args, &config);

    debug!("cdkwatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args.command);
    debug!("Store directory: {}", config.general.store_dir.display());

    let exit_code = match args.command.clone() {
        Command::Check {
            libraries,
            github_output,
        } => handle_check(&config, &args, libraries.as_deref(), github_output.as_deref()).await,
        command => match run_command(command, &config, &args).await {
            Ok(code) => code,
            Err(e) => {
                error!("{:#}", e);
                eprintln!("\nError: {:#}", e);
                1
            }
        },
    };

    std::process::exit(exit_code);
}

/// Handle `init`: generate a default .cdkwatch.toml.
fn handle_init() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to add tracked libraries and release settings.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr; stdout is reserved for command output.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref config_path) => Config::load(config_path)?,
        None => Config::load_default()?.unwrap_or_default(),
    };

    config.merge_with_args(args);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run_command(command: Command, config: &Config, args: &Args) -> Result<i32> {
    match command {
        Command::Record { libraries, dry_run } => {
            let source = GitHubReleases::new(config.github_settings(args.github_token.clone()))?;
            run_record(config, &source, libraries.as_deref(), dry_run, !args.quiet).await
        }
        Command::Release {
            dry_run,
            json,
            no_git,
        } => run_release(config, dry_run, json, no_git),
        Command::Summary { json } => run_summary(config, json),
        other @ (Command::Check { .. } | Command::Init) => {
            bail!("{:?} is dispatched separately", other)
        }
    }
}

fn print_check_result(result: &UpdateCheckResult) {
    match result.to_json_line() {
        Ok(line) => println!("{}", line),
        Err(e) => {
            error!("Failed to serialize check result: {}", e);
            println!(r#"{{"update-required":false,"error":"serialization failed"}}"#);
        }
    }
}

/// Run the update check and always print exactly one JSON line.
async fn handle_check(
    config: &Config,
    args: &Args,
    libraries: Option<&[String]>,
    github_output: Option<&Path>,
) -> i32 {
    let outcome = match GitHubReleases::new(config.github_settings(args.github_token.clone())) {
        Ok(source) => run_check(config, &source, libraries, github_output, !args.quiet).await,
        Err(e) => Err(e.into()),
    };

    match outcome {
        Ok(result) => {
            if result.update_required {
                info!("Update required: {}", result.updated_libraries.join(", "));
            } else {
                info!("No update required");
            }
            print_check_result(&result);
            0
        }
        Err(e) => {
            error!("Update check failed: {:#}", e);
            print_check_result(&UpdateCheckResult::failed(format!("{:#}", e)));
            1
        }
    }
}

async fn run_check(
    config: &Config,
    source: &dyn VersionSource,
    libraries: Option<&[String]>,
    github_output: Option<&Path>,
    show_progress: bool,
) -> Result<UpdateCheckResult> {
    let tracked = config.select_libraries(libraries)?;

    let store = FileVersionStore::new(&config.general.store_dir);
    let mut current = store.read_all()?;
    debug!(
        "Read {} records from {}",
        current.len(),
        store.dir().display()
    );

    // A partial check only looks at the selected libraries' records.
    if libraries.is_some() {
        let selected: BTreeSet<String> = tracked
            .iter()
            .map(|l| analysis::canonical_name(&l.name))
            .collect();
        current.retain(|name, _| selected.contains(&analysis::canonical_name(name)));
    }

    let snapshot = upstream::fetch_all(source, &tracked, show_progress).await;

    let result = analysis::check(&current, &snapshot)?;

    if let Some(path) = github_output {
        append_github_output(path, &result)?;
    }

    Ok(result)
}

/// Append step outputs in the `key=value` format GitHub Actions reads.
fn append_github_output(path: &Path, result: &UpdateCheckResult) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open GitHub output file {}", path.display()))?;

    writeln!(file, "update-required={}", result.update_required)?;
    writeln!(
        file,
        "updated-libraries={}",
        serde_json::to_string(&result.updated_libraries)?
    )?;

    debug!("Wrote step outputs to {}", path.display());
    Ok(())
}

/// Fetch upstream releases and persist one record per fetched library.
///
/// Returns 1 when any library could not be fetched, after writing the rest.
async fn run_record(
    config: &Config,
    source: &dyn VersionSource,
    libraries: Option<&[String]>,
    dry_run: bool,
    show_progress: bool,
) -> Result<i32> {
    let tracked = config.select_libraries(libraries)?;
    let file_store = FileVersionStore::new(&config.general.store_dir);

    let snapshot = upstream::fetch_all(source, &tracked, show_progress).await;

    let preview;
    let store: &dyn VersionStore = if dry_run {
        preview = MemoryVersionStore::with_records(file_store.read_all()?.into_values());
        &preview
    } else {
        &file_store
    };

    for (name, release) in &snapshot.releases {
        let record = LibraryVersionRecord::from_release(name, release);
        store
            .write_one(&record)
            .with_context(|| format!("Failed to record version of {}", name))?;
        println!("{} v{}", name, record.version);
    }

    if dry_run {
        let records = store.read_all()?;
        println!(
            "\nDry run, store would contain: {}",
            report::build_version_summary(records.values())
        );
    }

    if !snapshot.is_complete() {
        for (name, reason) in &snapshot.failures {
            error!("Not recorded: {}: {}", name, reason);
        }
        return Ok(1);
    }

    Ok(0)
}

/// Directory containing `path`, `.` for a bare file name.
fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

fn read_release_input(path: &Path) -> Result<String, ReleaseError> {
    std::fs::read_to_string(path).map_err(|source| ReleaseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write via a temp file in the same directory, then rename over `path`.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = parent_dir(path);

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Prepare the downstream release: badges, version bump, commit and tag.
///
/// Everything is computed and validated before the first file is written.
fn run_release(config: &Config, dry_run: bool, json: bool, no_git: bool) -> Result<i32> {
    let store = FileVersionStore::new(&config.general.store_dir);
    let records = store.read_all()?;
    info!("Releasing from {} recorded libraries", records.len());

    let readme_path = &config.general.readme;
    let readme = read_release_input(readme_path)?;

    let pyproject_path = &config.general.pyproject;
    let manifest = read_release_input(pyproject_path)?;

    let current_version = repo::pyproject::read_version(&manifest)?;
    let metadata = report::build_release_metadata(
        records.values(),
        &current_version,
        &config.release.text_options(),
    )?;
    let rendered_readme =
        report::render(&readme, &metadata.badge_block, &config.release.markers())?;
    let updated_manifest = repo::pyproject::set_version(&manifest, &metadata.next_version)?;

    let commit = config.release.commit && !no_git;
    let git_repo = if commit {
        let git_repo = repo::open_repository(parent_dir(readme_path))?;
        if repo::tag_exists(&git_repo, &metadata.tag_name)? {
            return Err(ReleaseError::TagExists(metadata.tag_name.clone()).into());
        }
        Some(git_repo)
    } else {
        None
    };

    let output = if json {
        report::generate_json_report(&metadata)?
    } else {
        report::generate_text_summary(&metadata)
    };
    print!("{}", output);
    if json {
        println!();
    }

    if dry_run {
        info!("Dry run: no files written");
        return Ok(0);
    }

    if readme != rendered_readme {
        write_atomic(readme_path, &rendered_readme)?;
        info!("Updated {}", readme_path.display());
    } else {
        debug!("{} already up to date", readme_path.display());
    }
    write_atomic(pyproject_path, &updated_manifest)?;
    info!(
        "Bumped {} to {}",
        pyproject_path.display(),
        metadata.next_version
    );

    match git_repo {
        Some(git_repo) => {
            // The records are the state the next scheduled check starts from.
            let mut staged = vec![readme_path.clone(), pyproject_path.clone()];
            staged.extend(records.keys().map(|name| store.record_path(name)));

            let paths = staged
                .iter()
                .map(|p| {
                    std::fs::canonicalize(p)
                        .with_context(|| format!("Failed to resolve {}", p.display()))
                })
                .collect::<Result<Vec<PathBuf>>>()?;

            repo::commit_and_tag(
                &git_repo,
                &paths,
                &metadata.commit_message,
                &metadata.tag_name,
                &metadata.summary,
                &config.release.author(),
            )?;
        }
        None => warn!("Skipping git commit and tag"),
    }

    Ok(0)
}

/// Print the bundled-versions summary without side effects.
fn run_summary(config: &Config, json: bool) -> Result<i32> {
    let store = FileVersionStore::new(&config.general.store_dir);
    let records: BTreeMap<String, LibraryVersionRecord> = store.read_all()?;

    if records.is_empty() {
        warn!("Version store {} is empty", store.dir().display());
    }

    if json {
        let value = serde_json::json!({
            "summary": report::build_version_summary(records.values()),
            "entries": report::generator::version_entries(records.values()),
            "badge_block": report::build_badge_block(records.values(), &config.release.badge_color),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", report::build_version_summary(records.values()));
    }

    Ok(0)
}
