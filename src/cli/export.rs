//! CLI command for transaction export
//!
//! Writes to a file when `--output` is given, otherwise to stdout.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};

use crate::error::{PersistenceError, TallyResult};
use crate::export::{csv, json};
use crate::services::{HistoryService, Sort, SortKey, SortOrder};
use crate::storage::Storage;

use super::history::FilterArgs;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// CSV format, one row per transaction
    Csv,
    /// JSON format with a summary
    Json,
}

impl ExportFormat {
    /// Guess the format from a file extension
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Export format (default: from the output extension, else CSV)
    #[arg(short, long, value_enum)]
    pub format: Option<ExportFormat>,
    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Handle an export command
pub fn handle_export_command(storage: &Storage, username: &str, args: ExportArgs) -> TallyResult<()> {
    let format = args
        .format
        .or_else(|| args.output.as_deref().and_then(ExportFormat::from_path))
        .unwrap_or(ExportFormat::Csv);

    let account = args.filter.account_ref();
    let entries = HistoryService::new(storage).entries(
        username,
        account.as_ref(),
        &args.filter.to_filter(),
        Sort::new(SortKey::Date, SortOrder::Ascending),
    )?;

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                PersistenceError::Io(format!("Failed to create file {}: {}", path.display(), e))
            })?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout().lock()),
    };

    let count = match format {
        ExportFormat::Csv => csv::export_transactions_csv(&entries, &mut writer)?,
        ExportFormat::Json => {
            json::export_transactions_json(username, &entries, &mut writer, args.pretty)?
        }
    };
    writer.flush()?;

    if let Some(path) = &args.output {
        println!("Exported {} transactions to: {}", count, path.display());
    }
    Ok(())
}
