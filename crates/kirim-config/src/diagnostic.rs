// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge.
//!
//! Converts Figment deserialization errors and semantic validation failures
//! into miette diagnostics so startup failures read like compiler errors.

use miette::Diagnostic;
use thiserror::Error;

/// A configuration error rendered as a miette diagnostic.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ConfigError {
    /// The configuration could not be parsed or deserialized.
    #[error("{message}")]
    #[diagnostic(
        code(kirim::config::parse),
        help("check kirim.toml against the documented sections; unknown keys are rejected")
    )]
    Parse {
        /// Figment's description of the failure, including the offending key path.
        message: String,
    },

    /// The configuration parsed but a semantic constraint failed.
    #[error("{message}")]
    #[diagnostic(code(kirim::config::validation))]
    Validation {
        /// Description of the violated constraint.
        message: String,
    },
}

/// Convert a figment error (which may aggregate several failures) into one
/// diagnostic per failure.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    err.into_iter()
        .map(|e| ConfigError::Parse {
            message: e.to_string(),
        })
        .collect()
}

/// Render all collected errors to stderr via miette's fancy reporter.
pub fn render_errors(errors: &[ConfigError]) {
    for error in errors {
        let report = miette::Report::new(error.clone());
        eprintln!("{report:?}");
    }
}
