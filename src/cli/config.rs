//! Configuration CLI commands

use clap::Subcommand;

use crate::config::{Settings, TallyPaths};
use crate::error::TallyResult;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show paths and settings
    Show,
    /// Change a setting
    Set {
        /// backup_retention, lock_timeout_ms, currency_symbol, or default_page_size
        key: String,
        value: String,
    },
}

/// Handle a config command
pub fn handle_config_command(
    paths: &TallyPaths,
    settings: &mut Settings,
    cmd: ConfigCommands,
) -> TallyResult<()> {
    match cmd {
        ConfigCommands::Show => {
            println!("Tally Configuration");
            println!("===================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Ledger file:      {}", paths.ledger_file().display());
            println!("Backup directory: {}", paths.backup_dir().display());
            println!("Audit log:        {}", paths.audit_log().display());
            println!();
            println!("Settings:");
            println!("  backup_retention:  {}", settings.backup_retention);
            println!("  lock_timeout_ms:   {}", settings.lock_timeout_ms);
            println!("  currency_symbol:   {}", settings.currency_symbol);
            println!("  default_page_size: {}", settings.default_page_size);
        }
        ConfigCommands::Set { key, value } => {
            settings.set(&key, &value)?;
            settings.save(paths)?;
            println!("Set {} = {}", key, value);
        }
    }

    Ok(())
}
