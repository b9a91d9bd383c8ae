//! Backup CLI commands
//!
//! Implements CLI commands for backup management.

use clap::Subcommand;

use crate::backup::RestoreManager;
use crate::error::{PersistenceError, TallyResult};
use crate::storage::Storage;

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// List all available backups, newest first
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Restore from a backup
    Restore {
        /// Backup filename (default: the newest valid backup)
        backup: Option<String>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Delete old backups, keeping the newest ones
    Prune {
        /// Number of backups to keep (default: the retention setting)
        #[arg(short, long)]
        keep: Option<usize>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Handle a backup command
pub fn handle_backup_command(storage: &Storage, cmd: BackupCommands) -> TallyResult<()> {
    match cmd {
        BackupCommands::List { verbose } => {
            let backups = storage.list_backups()?;

            if backups.is_empty() {
                println!("No backups found.");
                println!("A backup of the store is made on every save.");
                return Ok(());
            }

            println!("Available Backups");
            println!("=================");
            println!();

            let restore_manager = RestoreManager::new(storage.paths(), storage.backups());
            for (i, backup) in backups.iter().enumerate() {
                let age = chrono::Utc::now().signed_duration_since(backup.created_at);

                if verbose {
                    let status = match restore_manager.validate_backup(backup) {
                        Ok(validation) => validation.summary(),
                        Err(e) => format!("INVALID: {}", e),
                    };
                    println!(
                        "{}. {}\n   Created: {}\n   Size: {}\n   Age: {}\n   Contents: {}\n",
                        i + 1,
                        backup.filename,
                        backup.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        format_size(backup.size_bytes),
                        format_duration(age),
                        status,
                    );
                } else {
                    println!(
                        "  {}. {} ({} ago, {})",
                        i + 1,
                        backup.filename,
                        format_duration(age),
                        format_size(backup.size_bytes),
                    );
                }
            }

            println!();
            println!("Total: {} backup(s)", backups.len());
        }

        BackupCommands::Restore { backup, force } => {
            let name = backup.as_deref().filter(|b| !b.eq_ignore_ascii_case("latest"));

            let info = match name {
                Some(name) => storage.backups().get_backup(name)?,
                None => storage
                    .backups()
                    .get_latest_backup()?
                    .ok_or_else(|| PersistenceError::BackupNotFound("no backups exist".into()))?,
            };

            let restore_manager = RestoreManager::new(storage.paths(), storage.backups());
            if name.is_some() {
                let validation = restore_manager.validate_backup(&info)?;
                println!("Backup: {}", validation.summary());
                if let Some(saved_at) = validation.saved_at {
                    println!("Saved:  {}", saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
            } else {
                println!("Backup: newest valid backup (currently {})", info.filename);
            }
            println!();

            if !force {
                println!("WARNING: This will overwrite the current ledger!");
                println!("To proceed, run again with --force flag:");
                println!(
                    "  tally backup restore {} --force",
                    backup.as_deref().unwrap_or("latest")
                );
                return Ok(());
            }

            let result = storage.restore_backup(name)?;
            println!("Restore complete!");
            println!("{}", result.summary());
        }

        BackupCommands::Prune { keep, force } => {
            let keep = keep.unwrap_or(storage.settings().backup_retention);
            let backups = storage.list_backups()?;
            let to_delete = backups.len().saturating_sub(keep);

            if to_delete == 0 {
                println!("No backups to prune.");
                println!("You have {} backup(s); keeping {}.", backups.len(), keep);
                return Ok(());
            }

            println!("Prune Summary");
            println!("=============");
            println!("Current backups: {}", backups.len());
            println!("To be deleted:   {}", to_delete);
            println!();

            if !force {
                println!("To delete old backups, run again with --force flag:");
                println!("  tally backup prune --keep {} --force", keep);
                return Ok(());
            }

            let deleted = storage.prune_backups(keep)?;
            println!("Deleted {} backup(s).", deleted.len());
        }
    }

    Ok(())
}

/// Format a duration in human-readable form
fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    format!("{}mo", days / 30)
}

/// Format a file size in human-readable form
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
