//! Acting-user context for CLI commands
//!
//! Commands that touch a user's accounts authenticate first. The password
//! comes from `TALLY_PASSWORD` when set, otherwise from a terminal prompt.

use zeroize::Zeroizing;

use crate::auth::Password;
use crate::error::{EngineError, PersistenceError, TallyResult};
use crate::services::AccountService;
use crate::storage::Storage;

/// Environment variable holding the acting user's password
pub const PASSWORD_ENV: &str = "TALLY_PASSWORD";

/// Read a password from the environment or the terminal
pub fn read_password(prompt: &str) -> TallyResult<Password> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(Zeroizing::new(password));
    }

    let password = rpassword::prompt_password(prompt)
        .map_err(|e| PersistenceError::Io(format!("Failed to read password: {}", e)))?;
    Ok(Zeroizing::new(password))
}

/// Read a new password, asking twice when prompting
pub fn read_new_password() -> TallyResult<Password> {
    if std::env::var_os(PASSWORD_ENV).is_some() {
        return read_password("");
    }

    let password = read_password("New password: ")?;
    let confirm = read_password("Confirm password: ")?;
    if *password != *confirm {
        return Err(EngineError::Validation("Passwords do not match".into()).into());
    }
    Ok(password)
}

/// The acting user and their password, read before the ledger is opened
/// so that no prompt runs while the store lock is held
pub struct Credentials {
    username: String,
    password: Password,
}

impl Credentials {
    /// Resolve the acting user and read their password
    pub fn prompt(user: Option<&str>) -> TallyResult<Self> {
        let username = user.ok_or_else(|| {
            EngineError::Validation("No user given; pass --user or set TALLY_USER".into())
        })?;
        let password = read_password(&format!("Password for {}: ", username))?;

        Ok(Self {
            username: username.to_string(),
            password,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Verify the password against the loaded ledger; returns the username
    pub fn authenticate(&self, storage: &Storage) -> TallyResult<&str> {
        AccountService::new(storage).authenticate(&self.username, &self.password)?;
        Ok(&self.username)
    }
}
