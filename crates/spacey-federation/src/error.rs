// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the federation runtime

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for federation operations
pub type Result<T> = std::result::Result<T, FederationError>;

/// One failed attempt of a transport while loading a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttempt {
    /// Transport name (`http`, `fs`, ...)
    pub transport: String,
    /// Locator handed to the transport
    pub locator: String,
    /// Why the attempt failed
    pub reason: String,
}

impl fmt::Display for LoadAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.transport, self.locator, self.reason)
    }
}

/// Errors that can occur in the federation runtime.
///
/// The type is `Clone` so a failed load can be handed to every caller that
/// was waiting on the same in-flight module.
#[derive(Debug, Clone, Error)]
pub enum FederationError {
    /// The remote entry was requested before the build context existed
    #[error("Error trying to generate {0} before build step")]
    SetupOrder(String),

    /// `get` was called with a key the remote does not expose
    #[error("Can not find remote module {key}")]
    ModuleNotFound {
        /// Requested logical key
        key: String,
    },

    /// Every transport failed to load an exposed module
    #[error("Failed to load remote module {key}: {}", format_attempts(.attempts))]
    ModuleLoad {
        /// Logical key of the module
        key: String,
        /// Failed attempts, in the order they were tried
        attempts: Vec<LoadAttempt>,
    },

    /// A single transport could not fetch a locator
    #[error("{transport} transport failed for '{locator}': {reason}")]
    Transport {
        /// Transport name
        transport: String,
        /// Locator that was requested
        locator: String,
        /// Reason for failure
        reason: String,
    },

    /// Fetched source could not be turned into a module namespace
    #[error("Failed to evaluate module '{locator}': {reason}")]
    Evaluate {
        /// Locator of the source
        locator: String,
        /// Reason for failure
        reason: String,
    },

    /// An import specifier could not be resolved to a file
    #[error("Error resolving module '{specifier}': {reason}")]
    Resolve {
        /// Import specifier
        specifier: String,
        /// Reason for failure
        reason: String,
    },

    /// The same logical key was exposed twice
    #[error("Module key '{0}' is exposed more than once")]
    DuplicateExpose(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Type declarations of a remote could not be downloaded
    #[error("download of types from '{remote}' ({url}) failed: {reason}")]
    TypeDownload {
        /// Remote name
        remote: String,
        /// Types URL
        url: String,
        /// Reason for failure
        reason: String,
    },

    /// File system error
    #[error("File system error: {0}")]
    Io(Arc<std::io::Error>),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(String),
}

impl FederationError {
    /// Create a module not found error
    pub fn module_not_found(key: impl Into<String>) -> Self {
        Self::ModuleNotFound { key: key.into() }
    }

    /// Create a transport error
    pub fn transport(
        transport: impl Into<String>,
        locator: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::Transport {
            transport: transport.into(),
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an evaluation error
    pub fn evaluate(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Evaluate {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Create a resolution error
    pub fn resolve(specifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolve {
            specifier: specifier.into(),
            reason: reason.into(),
        }
    }

    /// Attribute a load failure to the logical key it was loading
    pub fn for_module(self, key: &str) -> Self {
        match self {
            Self::ModuleLoad { attempts, .. } => Self::ModuleLoad {
                key: key.to_string(),
                attempts,
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for FederationError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for FederationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for FederationError {
    fn from(err: toml::de::Error) -> Self {
        Self::Toml(err.to_string())
    }
}

fn format_attempts(attempts: &[LoadAttempt]) -> String {
    if attempts.is_empty() {
        return "no transport configured".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_not_found_message() {
        let err = FederationError::module_not_found("./Missing");
        assert_eq!(err.to_string(), "Can not find remote module ./Missing");
    }

    #[test]
    fn test_module_load_lists_attempts() {
        let err = FederationError::ModuleLoad {
            key: "./Button".to_string(),
            attempts: vec![
                LoadAttempt {
                    transport: "http".to_string(),
                    locator: "/src/Button.jsx".to_string(),
                    reason: "HTTP 404".to_string(),
                },
                LoadAttempt {
                    transport: "fs".to_string(),
                    locator: "/@fs/app/src/Button.jsx".to_string(),
                    reason: "not found".to_string(),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("./Button"));
        assert!(message.contains("http '/src/Button.jsx': HTTP 404"));
        assert!(message.contains("fs '/@fs/app/src/Button.jsx': not found"));
    }

    #[test]
    fn test_io_error_is_cloneable() {
        let err: FederationError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
