//! Batch CLI commands: run a batch file, or write a template

use std::path::{Path, PathBuf};

use clap::{Subcommand, ValueEnum};

use crate::display::format_batch_report;
use crate::error::{EngineError, TallyResult};
use crate::services::{read_batch_file, write_template, BatchFormat, BatchService};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for BatchFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => BatchFormat::Csv,
            FormatArg::Json => BatchFormat::Json,
        }
    }
}

/// Batch subcommands
#[derive(Subcommand)]
pub enum BatchCommands {
    /// Apply every operation in a CSV or JSON file, or none of them
    Run {
        /// Batch file (.csv or .json)
        file: PathBuf,
        /// Check every operation without changing anything
        #[arg(long)]
        preview: bool,
        /// File format, when the extension does not say
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },
    /// Write an example batch file
    Template {
        /// Where to write it
        file: PathBuf,
        #[arg(long, value_enum, default_value = "csv")]
        format: FormatArg,
    },
}

impl BatchCommands {
    /// Whether the command can change the ledger
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Run { preview: false, .. })
    }
}

/// Write a batch template; needs no ledger
pub fn handle_batch_template(file: &Path, format: FormatArg) -> TallyResult<()> {
    write_template(file, format.into())?;
    println!("Batch template written to {}", file.display());
    Ok(())
}

/// Handle a batch command for the acting user
pub fn handle_batch_command(storage: &Storage, username: &str, cmd: BatchCommands) -> TallyResult<()> {
    match cmd {
        BatchCommands::Run {
            file,
            preview,
            format,
        } => {
            let items = read_batch_file(&file, format.map(Into::into))?;
            let report = BatchService::new(storage).run(username, &items, preview)?;
            print!("{}", format_batch_report(&report));

            if !preview && !report.committed {
                return Err(EngineError::Validation(format!(
                    "batch rejected: {} of {} operations failed",
                    report.failed(),
                    report.total()
                ))
                .into());
            }
        }
        BatchCommands::Template { file, format } => handle_batch_template(&file, format)?,
    }

    Ok(())
}
