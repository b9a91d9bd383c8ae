//! Reports module for Tally
//!
//! Period statements built from recorded transaction history.

pub mod statement;

pub use statement::{AccountStatement, StatementLine, DEFAULT_PERIOD_DAYS};
