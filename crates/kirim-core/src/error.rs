// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the kirim gateway.
//!
//! Expected delivery failures are not errors: the dispatcher reports them as
//! `None` and the scheduler records them as a status field. `KirimError` is
//! reserved for failures the caller must react to.

use thiserror::Error;

/// The primary error type used across all kirim crates.
#[derive(Debug, Error)]
pub enum KirimError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence layer errors (connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// External messaging client errors (handshake, send, teardown).
    #[error("client error: {message}")]
    Client {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed input, surfaced with the offending field.
    #[error("validation failed for `{field}`: {message}")]
    Validation { field: String, message: String },

    /// The pairing handshake ended in auth failure or disconnect.
    #[error("pairing failed for session {session_id}: {reason}")]
    PairingFailed { session_id: String, reason: String },

    /// A per-session send limit was exhausted.
    #[error("quota exceeded: {message}")]
    QuotaExceeded { message: String },

    /// A referenced record does not exist or is not visible to the caller.
    #[error("{what} not found")]
    NotFound { what: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KirimError {
    /// Shorthand for a validation error on a named field.
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        KirimError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_their_subject() {
        let err = KirimError::validation("targetPhoneNumber", "must not start with 0");
        assert_eq!(
            err.to_string(),
            "validation failed for `targetPhoneNumber`: must not start with 0"
        );

        let err = KirimError::PairingFailed {
            session_id: "sess-1".into(),
            reason: "auth_failure".into(),
        };
        assert!(err.to_string().contains("sess-1"));
        assert!(err.to_string().contains("auth_failure"));

        let err = KirimError::NotFound {
            what: "session".into(),
        };
        assert_eq!(err.to_string(), "session not found");
    }

    #[test]
    fn storage_error_wraps_source() {
        let err = KirimError::Storage {
            source: Box::new(std::io::Error::other("disk gone")),
        };
        assert!(err.to_string().contains("disk gone"));
    }
}
