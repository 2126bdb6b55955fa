// Tally CLI - upload transaction batches and reconcile them

mod compare;
mod exit_codes;
mod inspect;
mod logging;
mod upload;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tally_config::{ConfigError, Settings};
use tally_io::{ReportError, TableError};
use tally_recon::{CanonicalField, CompareError, IngestError};
use tally_store::SqliteStore;

use exit_codes::{EXIT_ERROR, EXIT_NOT_FOUND, EXIT_REJECTED, EXIT_STORAGE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Upload transaction batches and reconcile them pairwise")]
#[command(version)]
#[command(long_version = long_version())]
struct Cli {
    /// SQLite database file (overrides database.path in settings)
    #[arg(long, global = true, env = "TALLY_DB")]
    db: Option<PathBuf>,

    /// Settings file (default: <config dir>/tally/settings.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a spreadsheet or CSV file as a new batch
    #[command(after_help = "\
Examples:
  tally upload bank.xlsx
  tally upload ledger.csv --json")]
    Upload {
        /// Input file (.xlsx, .xlsm, .xls, .xlsb, .ods, .csv)
        file: PathBuf,

        /// Print the batch as JSON instead of its id
        #[arg(long)]
        json: bool,
    },

    /// Reconcile two batches and write the xlsx report
    #[command(after_help = "\
Examples:
  tally compare 1 2
  tally compare 1 2 -o march.xlsx
  tally compare 1 2 --json")]
    Compare {
        /// Batch A id
        id_a: i64,

        /// Batch B id
        id_b: i64,

        /// Report path (default: comparison_<a>_<b>.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the full result as JSON instead of the summary
        #[arg(long)]
        json: bool,
    },

    /// Inspect or delete stored batches
    Batch {
        #[command(subcommand)]
        command: inspect::BatchCommands,
    },

    /// Inspect stored transactions
    Transactions {
        #[command(subcommand)]
        command: inspect::TransactionCommands,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("TALLY_COMMIT"), ")",
        "\nstore:   sqlite (bundled)",
        "\ntarget:  ", env!("TALLY_TARGET"),
    )
}

/// Values resolved once at startup and handed to every command.
pub struct Context {
    pub settings: Settings,
    pub db_path: PathBuf,
}

impl Context {
    fn resolve(db: Option<PathBuf>, config: Option<&Path>) -> Result<Self, CliError> {
        let settings = Settings::load(config)?;
        let db_path = db.unwrap_or_else(|| settings.database_path());
        Ok(Self { settings, db_path })
    }

    pub fn open_store(&self) -> Result<SqliteStore, CliError> {
        SqliteStore::open(&self.db_path).map_err(|e| {
            CliError::storage(e.to_string())
                .with_hint(format!("database: {}", self.db_path.display()))
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = Context::resolve(cli.db, cli.config.as_deref()).and_then(|ctx| {
        logging::init(ctx.settings.log_filter.as_deref());
        match cli.command {
            Commands::Upload { file, json } => upload::cmd_upload(&ctx, &file, json),
            Commands::Compare { id_a, id_b, output, json } => {
                compare::cmd_compare(&ctx, id_a, id_b, output, json)
            }
            Commands::Batch { command } => inspect::cmd_batch(&ctx, command),
            Commands::Transactions { command } => inspect::cmd_transactions(&ctx, command),
        }
    });

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
    pub fn error(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self { code: EXIT_REJECTED, message: msg.into(), hint: None }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self { code: EXIT_NOT_FOUND, message: msg.into(), hint: None }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_STORAGE, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::UnknownField(_) => {
                let known: Vec<_> = CanonicalField::ALL.iter().map(|f| f.as_str()).collect();
                format!("known fields: {}", known.join(", "))
            }
            _ => "fix the settings file or pass --config".to_string(),
        };
        CliError::usage(err.to_string()).with_hint(hint)
    }
}

impl From<TableError> for CliError {
    fn from(err: TableError) -> Self {
        match &err {
            TableError::Empty => CliError::rejected(err.to_string())
                .with_hint("the first sheet needs a header row"),
            _ => CliError::rejected(err.to_string()),
        }
    }
}

impl From<IngestError> for CliError {
    fn from(err: IngestError) -> Self {
        match &err {
            IngestError::Storage(_) => CliError::storage(err.to_string()),
            IngestError::Mapping(_) => CliError::rejected(err.to_string())
                .with_hint("rename the column or add an alias under [ingest.aliases]"),
            IngestError::DuplicateIds(_) => CliError::rejected(err.to_string())
                .with_hint("reconcile.duplicates is set to reject"),
            IngestError::Row { .. } => CliError::rejected(err.to_string()),
        }
    }
}

impl From<CompareError> for CliError {
    fn from(err: CompareError) -> Self {
        match &err {
            CompareError::NotFound(_) => {
                CliError::not_found(err.to_string()).with_hint("run `tally batch list` to see stored batches")
            }
            CompareError::Recon(_) => CliError::rejected(err.to_string())
                .with_hint("reconcile.duplicates is set to reject"),
            CompareError::Storage(_) => CliError::storage(err.to_string()),
        }
    }
}

impl From<ReportError> for CliError {
    fn from(err: ReportError) -> Self {
        CliError::error(err.to_string())
    }
}

/// Pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError::error(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
