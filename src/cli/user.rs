//! User CLI commands

use clap::Subcommand;

use crate::auth::Password;
use crate::error::TallyResult;
use crate::services::AccountService;
use crate::storage::Storage;

/// User subcommands
#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    Register {
        /// Username (letters, digits and underscores)
        username: String,
        /// Contact email
        #[arg(short, long)]
        email: String,
    },
}

/// Handle a user command. The new user's password is read by the caller
/// before the ledger is opened.
pub fn handle_user_command(
    storage: &Storage,
    cmd: UserCommands,
    password: &Password,
) -> TallyResult<()> {
    let service = AccountService::new(storage);

    match cmd {
        UserCommands::Register { username, email } => {
            let user = service.register_user(&username, password, &email)?;

            println!("Registered user: {}", user.username);
            println!("  Email: {}", user.email);
            println!();
            println!(
                "Open an account with: tally --user {} account open savings",
                user.username
            );
        }
    }

    Ok(())
}
