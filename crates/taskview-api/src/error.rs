//! Error types for taskview-api

use thiserror::Error;

/// Result type alias using taskview-api Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the task service
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a local file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The service answered with a non-success status
    #[error("{detail}")]
    Api { status: u16, detail: String },

    /// A success response was missing something we need
    #[error("{0}")]
    InvalidResponse(String),

    /// Event stream transport failed
    #[error("SSE error: {0}")]
    Sse(String),

    /// A named event arrived whose payload does not match its schema
    #[error("Malformed '{event}' event: {reason}")]
    MalformedEvent { event: String, reason: String },

    /// An event with a name we do not handle
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
}

impl Error {
    /// Create an API error from a status code and detail message
    pub fn api(status: u16, detail: impl Into<String>) -> Self {
        Self::Api {
            status,
            detail: detail.into(),
        }
    }

    /// Create a malformed-event error
    pub fn malformed(event: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedEvent {
            event: event.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the event stream connection is gone.
    ///
    /// Malformed and unknown events are not transport failures: the event is
    /// dropped and the stream keeps going.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Sse(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_variants() {
        assert!(Error::Sse("connection reset".into()).is_transport());
    }

    #[test]
    fn test_payload_errors_are_not_transport() {
        assert!(!Error::malformed("think", "missing field `result`").is_transport());
        assert!(!Error::UnknownEvent("ping".into()).is_transport());
        assert!(!Error::api(500, "boom").is_transport());
        assert!(!Error::InvalidResponse("Invalid task ID".into()).is_transport());
    }

    #[test]
    fn test_api_error_displays_detail_only() {
        let e = Error::api(422, "Prompt too long");
        assert_eq!(e.to_string(), "Prompt too long");
    }

    #[test]
    fn test_malformed_display() {
        let e = Error::malformed("error", "expected a map");
        assert_eq!(e.to_string(), "Malformed 'error' event: expected a map");
    }
}
