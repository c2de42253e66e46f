// snapfix CLI - golden dataset checks against SQLite databases

mod check;
mod exit_codes;
mod export;
mod snapshots;
mod verify;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use snapfix_config::{ConfigError, FixtureConfig};
use snapfix_dataset::DatasetError;
use snapfix_fixture::{FixtureError, SqliteConnection};

use exit_codes::{
    EXIT_CONFIG, EXIT_DATABASE, EXIT_DATASET_MALFORMED, EXIT_IO, EXIT_MISMATCH, EXIT_SUCCESS,
    EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "snapfix")]
#[command(about = "Check golden datasets against SQLite test databases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a golden dataset and list its tables
    #[command(after_help = "\
Examples:
  snapfix check tests/Fixtures/pages.csv
  snapfix check tests/Fixtures/pages.csv --json")]
    Check {
        /// Golden dataset file
        dataset: PathBuf,

        /// Print the table summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile a SQLite database against a golden dataset
    #[command(after_help = "\
Examples:
  snapfix verify expected.csv test.sqlite
  snapfix verify expected.csv test.sqlite --json > report.json
  snapfix verify expected.csv test.sqlite --config ci/snapfix.toml

Exit codes:
  0  every table matches
  1  at least one table differs
  5  the dataset is malformed")]
    Verify {
        /// Golden dataset file
        dataset: PathBuf,

        /// SQLite database file
        database: PathBuf,

        /// Print the diff report as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Config file (default: discover snapfix.toml)
        #[arg(long, env = "SNAPFIX_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Write database tables in the golden dataset format
    #[command(after_help = "\
Examples:
  snapfix export test.sqlite --table pages --table tt_content
  snapfix export test.sqlite --output expected.csv")]
    Export {
        /// SQLite database file
        database: PathBuf,

        /// Table to export (repeatable, default: all tables)
        #[arg(long = "table", short = 't')]
        tables: Vec<String>,

        /// Write to file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// List snapshot manifests under a snapshot root
    #[command(after_help = "\
Examples:
  snapfix snapshots --root /var/tmp/snapfix
  snapfix snapshots --json")]
    Snapshots {
        /// Snapshot root (default: snapshot.root from config)
        #[arg(long)]
        root: Option<PathBuf>,

        #[arg(long)]
        json: bool,

        /// Config file (default: discover snapfix.toml)
        #[arg(long, env = "SNAPFIX_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { dataset, json } => check::cmd_check(&dataset, json),
        Commands::Verify {
            dataset,
            database,
            json,
            config,
        } => verify::cmd_verify(&dataset, &database, json, config.as_deref()),
        Commands::Export {
            database,
            tables,
            output,
        } => export::cmd_export(&database, &tables, output.as_deref()),
        Commands::Snapshots { root, json, config } => {
            snapshots::cmd_snapshots(root, json, config.as_deref())
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::new(EXIT_MISMATCH, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<DatasetError> for CliError {
    fn from(e: DatasetError) -> Self {
        if e.is_malformed() {
            Self::new(EXIT_DATASET_MALFORMED, e.to_string())
        } else {
            Self::io(e.to_string())
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Io(_) => Self::io(e.to_string()),
            _ => Self::new(EXIT_CONFIG, e.to_string()),
        }
    }
}

impl From<FixtureError> for CliError {
    fn from(e: FixtureError) -> Self {
        match e {
            FixtureError::Dataset(e) => e.into(),
            FixtureError::Config(e) => e.into(),
            FixtureError::Connection(_) => Self::new(EXIT_DATABASE, e.to_string()),
            FixtureError::Assertion(_) => Self::mismatch(e.to_string()),
            _ => Self::io(e.to_string()),
        }
    }
}

/// `--config` file, or discovery from the working directory.
fn load_config(path: Option<&Path>) -> Result<FixtureConfig, CliError> {
    match path {
        Some(p) => Ok(FixtureConfig::load(p)?),
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| CliError::io(format!("no working directory: {e}")))?;
            Ok(FixtureConfig::discover(&cwd)?)
        }
    }
}

/// Open an existing database; never creates one.
fn open_database(path: &Path) -> Result<SqliteConnection, CliError> {
    if !path.is_file() {
        return Err(CliError::io(format!("database not found: {}", path.display())));
    }
    Ok(SqliteConnection::open(path)?)
}
