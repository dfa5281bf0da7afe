//! Common error types for discplay

use thiserror::Error;

/// Common result type for discplay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the player and its front ends
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed textual input (disc positions, cue sheet fields)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
