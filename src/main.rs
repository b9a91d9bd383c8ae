use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tally::cli::{
    handle_account_command, handle_backup_command, handle_batch_command, handle_batch_template,
    handle_config_command, handle_deposit_command, handle_export_command, handle_history_command,
    handle_statement_command, handle_summary_command, handle_transfer_command,
    handle_transfers_command, handle_user_command, handle_withdraw_command, read_new_password,
    AccountCommands, AmountArgs, BackupCommands, BatchCommands, ConfigCommands, Credentials,
    ExportArgs, FilterArgs, HistoryArgs, StatementArgs, TransferArgs, TransfersArgs,
    UserCommands,
};
use tally::config::{Settings, TallyPaths};
use tally::storage::Storage;

/// Environment variable holding the log filter, e.g. `debug` or `tally=info`
const LOG_ENV: &str = "TALLY_LOG";

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "File-backed personal ledger",
    long_about = "Tally keeps savings, current and salary accounts in a single JSON \
                  ledger. Every save rotates backups and replaces the store \
                  atomically; a damaged store is recovered from the newest valid \
                  backup."
)]
struct Cli {
    /// Acting user
    #[arg(short, long, global = true, env = "TALLY_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, settings and an empty ledger
    Init,

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Account management commands
    #[command(subcommand, alias = "acct")]
    Account(AccountCommands),

    /// Deposit money into an account
    Deposit(AmountArgs),

    /// Withdraw money from an account
    Withdraw(AmountArgs),

    /// Move money between two of your accounts
    Transfer(TransferArgs),

    /// List transfers, or show one transfer with both legs
    Transfers(TransfersArgs),

    /// Apply a file of operations all at once
    #[command(subcommand)]
    Batch(BatchCommands),

    /// Show transaction history, a page at a time
    #[command(alias = "log")]
    History(HistoryArgs),

    /// Summarize transactions by type
    Summary(FilterArgs),

    /// Period statement for one account
    Statement(StatementArgs),

    /// Export transactions to CSV or JSON
    Export(ExportArgs),

    /// Backup management commands
    #[command(subcommand)]
    Backup(BackupCommands),
}

impl Commands {
    /// Whether the command can change the ledger and so needs the store
    /// lock from load through save
    fn is_mutation(&self) -> bool {
        match self {
            Commands::User(_)
            | Commands::Deposit(_)
            | Commands::Withdraw(_)
            | Commands::Transfer(_) => true,
            Commands::Account(cmd) => cmd.is_mutation(),
            Commands::Batch(cmd) => cmd.is_mutation(),
            _ => false,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let paths = TallyPaths::new()?;
    let mut settings = Settings::load_or_create(&paths)?;

    match cli.command {
        None => {
            println!("Tally - file-backed personal ledger");
            println!();
            println!("Run 'tally --help' for usage information.");
            println!("Run 'tally init' to set up a new ledger.");
        }
        Some(Commands::Init) => init(&paths, settings)?,
        Some(Commands::Config { action }) => {
            handle_config_command(&paths, &mut settings, action.unwrap_or(ConfigCommands::Show))?
        }
        Some(Commands::Batch(BatchCommands::Template { file, format })) => {
            handle_batch_template(&file, format)?
        }
        Some(command) => run_ledger_command(paths, settings, cli.user.as_deref(), command)?,
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load the ledger. An exclusive open holds the store lock until the
/// storage is dropped, so another process cannot save in between.
fn open_storage(paths: TallyPaths, settings: Settings, exclusive: bool) -> Result<Storage> {
    let opened = if exclusive {
        Storage::open_exclusive(paths, settings)
    } else {
        Storage::open(paths, settings)
    };
    let (storage, report) = opened.context("Failed to load the ledger store")?;

    if let Some(advisory) = &report.recovered {
        eprintln!("Warning: {}", advisory);
        eprintln!("The next change will be saved over the damaged store.");
    }
    debug!(
        source = ?report.source,
        users = report.user_count,
        transactions = report.transaction_count,
        "ledger loaded"
    );

    Ok(storage)
}

fn init(paths: &TallyPaths, settings: Settings) -> Result<()> {
    settings.save(paths)?;
    let storage = open_storage(paths.clone(), settings, true)?;

    println!("Initializing Tally at: {}", paths.base_dir().display());
    if paths.ledger_file().exists() {
        println!("A ledger already exists; nothing to do.");
        return Ok(());
    }

    storage.save()?;
    println!("Initialization complete!");
    println!();
    println!("Register a user with: tally user register <username> --email <email>");
    Ok(())
}

/// Run a command against the loaded ledger, saving afterwards if it changed
fn run_ledger_command(
    paths: TallyPaths,
    settings: Settings,
    user: Option<&str>,
    command: Commands,
) -> Result<()> {
    // Prompts run before the store lock is taken
    let new_password = match &command {
        Commands::User(_) => Some(read_new_password()?),
        _ => None,
    };
    let credentials = match &command {
        Commands::User(_) | Commands::Backup(_) => None,
        _ => Some(Credentials::prompt(user)?),
    };

    let mutation = command.is_mutation();
    let storage = open_storage(paths, settings, mutation)?;
    let username = match &credentials {
        Some(credentials) => credentials.authenticate(&storage)?,
        None => "",
    };

    match command {
        Commands::User(cmd) => {
            if let Some(password) = &new_password {
                handle_user_command(&storage, cmd, password)?;
            }
        }
        Commands::Account(cmd) => handle_account_command(&storage, username, cmd)?,
        Commands::Deposit(args) => handle_deposit_command(&storage, username, args)?,
        Commands::Withdraw(args) => handle_withdraw_command(&storage, username, args)?,
        Commands::Transfer(args) => handle_transfer_command(&storage, username, args)?,
        Commands::Transfers(args) => handle_transfers_command(&storage, username, args)?,
        Commands::Batch(cmd) => handle_batch_command(&storage, username, cmd)?,
        Commands::History(args) => handle_history_command(&storage, username, args)?,
        Commands::Summary(args) => handle_summary_command(&storage, username, args)?,
        Commands::Statement(args) => handle_statement_command(&storage, username, args)?,
        Commands::Export(args) => handle_export_command(&storage, username, args)?,
        Commands::Backup(cmd) => handle_backup_command(&storage, cmd)?,
        // Handled before the ledger is opened
        Commands::Init | Commands::Config { .. } => {}
    }

    if mutation {
        let report = storage.save().context("Failed to save the ledger")?;
        debug!(
            bytes = report.bytes_written,
            backup = report.backup.as_ref().map(|b| b.filename.as_str()),
            pruned = report.pruned,
            "ledger saved"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_mutating_commands_are_exclusive() {
        let parse = |args: &[&str]| {
            Cli::try_parse_from(std::iter::once("tally").chain(args.iter().copied()))
                .unwrap()
                .command
                .unwrap()
        };

        assert!(parse(&["deposit", "savings", "5"]).is_mutation());
        assert!(parse(&["transfer", "savings", "current", "5"]).is_mutation());
        assert!(parse(&["user", "register", "bob", "--email", "b@example.com"]).is_mutation());
        assert!(parse(&["batch", "run", "ops.csv"]).is_mutation());
        assert!(!parse(&["batch", "run", "ops.csv", "--preview"]).is_mutation());
        assert!(!parse(&["history"]).is_mutation());
        assert!(!parse(&["transfers"]).is_mutation());
        assert!(!parse(&["account", "list"]).is_mutation());
    }
}
