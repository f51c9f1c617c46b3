//! Persisted directory-access CLI.
//!
//! Lets the user pick a directory once, remembers the grant under
//! `.dirgrant/`, and re-validates it on every `show`, prompting again when the
//! grant has lapsed.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dirgrant::core::types::{EnsureOutcome, Operability, PickOutcome};
use dirgrant::exit_codes;
use dirgrant::io::config::load_config;
use dirgrant::io::init::{DEFAULT_STATE_DIR, InitOptions, StatePaths, init_state};
use dirgrant::io::picker::{DirectoryPicker, FixedPicker, PromptPicker};
use dirgrant::io::prefs::FilePreferenceStore;
use dirgrant::io::registry::{FsGrantRegistry, PermissionRegistry};
use dirgrant::logging;
use dirgrant::manager::{AccessSettings, DirectoryAccessManager};
use tokio::io::{BufReader, Stderr, Stdin};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "dirgrant",
    version,
    about = "Persist and re-validate access to a chosen directory"
)]
struct Cli {
    /// Directory holding config, preferences and grants.
    #[arg(long, global = true, default_value = DEFAULT_STATE_DIR)]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the state directory and a default `config.toml`.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Pick a directory, persist its grant and save it.
    Select {
        /// Answer the prompt with this directory instead of reading stdin.
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the saved directory, prompting again if access has lapsed.
    Show {
        /// Answer a re-prompt with this directory instead of reading stdin.
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Check the saved directory's read/write access without prompting.
    Check,
    /// List persisted grants.
    Grants,
}

/// Picker chosen from the command line.
enum CliPicker {
    Prompt(PromptPicker<BufReader<Stdin>, Stderr>),
    Fixed(FixedPicker),
}

impl CliPicker {
    fn from_arg(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => CliPicker::Fixed(FixedPicker::new(Some(path))),
            None => CliPicker::Prompt(PromptPicker::stdio()),
        }
    }
}

impl DirectoryPicker for CliPicker {
    async fn pick(&self) -> Result<PickOutcome> {
        match self {
            CliPicker::Prompt(picker) => picker.pick().await,
            CliPicker::Fixed(picker) => picker.pick().await,
        }
    }
}

type CliManager = DirectoryAccessManager<FilePreferenceStore, FsGrantRegistry, CliPicker>;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init();
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let paths = StatePaths::new(&cli.state_dir);
    debug!(state_dir = %paths.state_dir.display(), "resolved state directory");
    match cli.command {
        Command::Init { force } => cmd_init(&paths, force),
        Command::Select { path } => cmd_select(&paths, path).await,
        Command::Show { path } => cmd_show(&paths, path).await,
        Command::Check => cmd_check(&paths),
        Command::Grants => cmd_grants(&paths),
    }
}

fn build_manager(paths: &StatePaths, picker: CliPicker) -> Result<CliManager> {
    let cfg = load_config(&paths.config_path)?;
    Ok(DirectoryAccessManager::new(
        FilePreferenceStore::new(&paths.prefs_dir, &cfg.prefs_namespace),
        FsGrantRegistry::new(paths.grants_path.clone()),
        picker,
        AccessSettings::from(&cfg),
    ))
}

fn cmd_init(paths: &StatePaths, force: bool) -> Result<i32> {
    init_state(&paths.state_dir, &InitOptions { force })?;
    println!("Initialized {}", paths.state_dir.display());
    Ok(exit_codes::OK)
}

async fn cmd_select(paths: &StatePaths, path: Option<PathBuf>) -> Result<i32> {
    let manager = build_manager(paths, CliPicker::from_arg(path))?;
    match manager.request_directory().await? {
        PickOutcome::Granted(handle) => {
            println!("Uri: {handle}");
            Ok(exit_codes::OK)
        }
        PickOutcome::Cancelled => {
            println!("Selection cancelled.");
            Ok(exit_codes::NO_DIRECTORY)
        }
    }
}

async fn cmd_show(paths: &StatePaths, path: Option<PathBuf>) -> Result<i32> {
    let manager = build_manager(paths, CliPicker::from_arg(path))?;
    match manager.ensure_accessible().await? {
        EnsureOutcome::Accessible(handle) | EnsureOutcome::Reacquired(handle) => {
            println!("Uri: {handle}");
            Ok(exit_codes::OK)
        }
        EnsureOutcome::Declined {
            previous: Some(handle),
        } => {
            println!("Uri: {handle} (access lapsed)");
            Ok(exit_codes::LAPSED)
        }
        EnsureOutcome::Declined { previous: None } => {
            println!("No Uri Saved.");
            Ok(exit_codes::NO_DIRECTORY)
        }
    }
}

fn cmd_check(paths: &StatePaths) -> Result<i32> {
    let manager = build_manager(paths, CliPicker::Fixed(FixedPicker::default()))?;
    let Some(handle) = manager.saved_directory()? else {
        println!("No Uri Saved.");
        return Ok(exit_codes::NO_DIRECTORY);
    };
    let report = manager.validate(&handle)?;
    println!("Uri: {handle}");
    for op in Operability::ALL {
        let status = if !manager.settings().operations.contains(op) {
            "not requested"
        } else if report.get(op) {
            "granted"
        } else {
            "lost"
        };
        println!("{op}: {status}");
    }
    if report.is_valid() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::LAPSED)
    }
}

fn cmd_grants(paths: &StatePaths) -> Result<i32> {
    let registry = FsGrantRegistry::new(paths.grants_path.clone());
    let grants = registry.persisted_grants()?;
    if grants.is_empty() {
        println!("No persisted grants.");
        return Ok(exit_codes::OK);
    }
    for grant in grants {
        println!(
            "{}\t{}\t{}",
            grant.identifier, grant.operations, grant.granted_at
        );
    }
    Ok(exit_codes::OK)
}
