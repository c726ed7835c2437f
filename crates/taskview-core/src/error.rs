//! Error types for taskview-core

use thiserror::Error;

/// Result type alias using taskview-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in view, history and staging operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the service client
    #[error(transparent)]
    Api(#[from] taskview_api::Error),

    /// Blank prompt; nothing was sent
    #[error("Please enter a valid prompt")]
    EmptyPrompt,

    /// Reading a staged file from disk failed
    #[error("Failed to read {name}: {source}")]
    ReadFile {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// History index out of range
    #[error("No history entry at position {0}")]
    NoSuchEntry(usize),
}

impl Error {
    /// Validation errors are caught before any request is made
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::EmptyPrompt | Error::NoSuchEntry(_))
    }
}
