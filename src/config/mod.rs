//! Configuration module for Tally
//!
//! Path resolution for the store, backups and audit log, and persisted user
//! settings.

pub mod paths;
pub mod settings;

pub use paths::TallyPaths;
pub use settings::Settings;
