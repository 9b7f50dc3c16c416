//! Error types for the cooperative API client.
//!
//! # Design
//! `Api` is a bare signal carrying the raw status: callers decide what a 404
//! or a 409 means for their screen. `Auth` and `Registration` exist because
//! the session store reinterprets any failure of the login and register
//! endpoints, and pages show different messages for them.

use thiserror::Error;

use crate::forms::ValidationErrors;

/// A `Result` type that uses [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the client, the session store and the page controllers.
#[derive(Debug, Error)]
pub enum Error {
    /// The login endpoint rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The register endpoint rejected the account (conflict or validation).
    #[error("registration failed ({status}): {message}")]
    Registration { status: u16, message: String },

    /// The server returned a non-2xx status.
    #[error("HTTP {status} {status_text}")]
    Api {
        status: u16,
        status_text: String,
        body: String,
    },

    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Client-side form validation failed; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The operation needs an authenticated session and there is none.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Reading or writing the persisted token failed.
    #[error("token storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } | Error::Registration { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// True for rejected credentials and for 401/403 responses.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::NotAuthenticated)
            || matches!(self.status(), Some(401) | Some(403))
    }

    /// The `message` field of a JSON error body, when the server sent one.
    pub fn server_message(&self) -> Option<String> {
        match self {
            Error::Api { body, .. } => message_from_body(body),
            Error::Registration { message, .. } | Error::Auth(message) => Some(message.clone()),
            _ => None,
        }
    }
}

/// Extract `message` from an error body such as `{"message": "..."}`.
///
/// Some servers send `message` as an array of validation strings; those are
/// joined with `"; "`.
pub(crate) fn message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("message")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        _ => None,
    }
}
