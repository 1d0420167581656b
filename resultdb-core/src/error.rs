// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error taxonomy shared by every backend.
//!
//! The create-or-update reconciler only looks at the kind of an error
//! ([`ResultDbError::is_entry_exists`] / [`ResultDbError::is_entry_not_found`]),
//! so backends must map their native failures onto these variants.

use thiserror::Error;

/// Errors raised by the experiment database client.
///
/// Payloads are plain strings so the error is `Clone`; bulk save status
/// snapshots hand out copies of the failures they collected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultDbError {
    /// A create targeted an id that is already present.
    #[error("Entry already exists: {0}")]
    EntryExists(String),

    /// A get, update or delete targeted an id that is absent.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Unknown filter operator or malformed filter value.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Malformed sort entry, unknown sort key or direction.
    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    /// Mutually exclusive or otherwise unusable arguments.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other failure reported by a backend.
    #[error("{context} Failed to process the request: {message}")]
    RequestFailed {
        context: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type for experiment database operations.
pub type Result<T> = std::result::Result<T, ResultDbError>;

impl ResultDbError {
    /// Backend failure without an HTTP status.
    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::RequestFailed {
            context: String::new(),
            status: None,
            message: message.into(),
        }
    }

    /// Backend failure carrying the HTTP status that produced it.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            409 => Self::EntryExists(message),
            404 => Self::EntryNotFound(message),
            _ => Self::RequestFailed {
                context: String::new(),
                status: Some(status),
                message,
            },
        }
    }

    pub fn is_entry_exists(&self) -> bool {
        matches!(self, Self::EntryExists(_))
    }

    pub fn is_entry_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound(_))
    }

    /// Whether the caller supplied bad input; such errors are raised before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidFilter(_) | Self::InvalidSort(_) | Self::InvalidArgument(_)
        )
    }

    /// Prefix the error with the operation and entity being attempted.
    ///
    /// The kind is preserved, so a reconciler above this call still sees
    /// `EntryExists` / `EntryNotFound`.
    pub fn with_context(self, context: impl AsRef<str>) -> Self {
        let context = context.as_ref();
        if context.is_empty() {
            return self;
        }
        match self {
            Self::EntryExists(msg) => {
                Self::EntryExists(format!("{} The server responded with {}", context, msg))
            }
            Self::EntryNotFound(msg) => {
                Self::EntryNotFound(format!("{} The server responded with {}", context, msg))
            }
            Self::RequestFailed {
                context: inner,
                status,
                message,
            } => Self::RequestFailed {
                context: if inner.is_empty() {
                    context.to_string()
                } else {
                    format!("{} {}", context, inner)
                },
                status,
                message,
            },
            other => other,
        }
    }

    /// HTTP status behind a backend failure, when known.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::EntryExists(_) => Some(409),
            Self::EntryNotFound(_) => Some(404),
            Self::RequestFailed { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ResultDbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for ResultDbError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<chrono::ParseError> for ResultDbError {
    fn from(err: chrono::ParseError) -> Self {
        Self::Serialization(format!("invalid timestamp: {}", err))
    }
}

impl From<toml::de::Error> for ResultDbError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
