use std::time::Duration;
use thiserror::Error;

/// A required configuration entry is missing or unusable. Raised before any
/// connection attempt, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required MySQL setting `{0}`, check your environment variables")]
    Missing(&'static str),
    #[error("invalid value for MySQL setting `{0}`")]
    Invalid(&'static str),
}

/// Connecting to the server failed after every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("could not establish a MySQL connection after {attempts} attempts")]
pub struct ConnectionError {
    pub attempts: u32,
}

/// A cursor could not be opened on an apparently valid connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unable to acquire a MySQL cursor after {attempts} attempts")]
pub struct CursorError {
    pub attempts: u32,
}

/// The bounded executor gave up waiting. The statement itself is killed
/// server side on a best effort basis and is never re-issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("query timed out after {} seconds", timeout.as_secs())]
pub struct QueryTimeoutError {
    pub timeout: Duration,
}

impl QueryTimeoutError {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}
