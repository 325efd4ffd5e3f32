// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Zapfunil sales pipeline engine.

use thiserror::Error;

/// The primary error type used across all Zapfunil crates.
#[derive(Debug, Error)]
pub enum ZapfunilError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// A configured message template is missing or unusable. Fatal to the
    /// single send attempt; the bot session keeps its position.
    #[error("template error: {name}: {detail}")]
    Template { name: String, detail: String },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Outbound gateway errors (HTTP failure, provider rejection, rate limiting).
    /// Transient by taxonomy: callers retry, state machines do not advance.
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ZapfunilError {
    /// Shorthand for a storage error wrapping any boxed source.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ZapfunilError::Storage {
            source: Box::new(source),
        }
    }
}
