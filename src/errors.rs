//! Unified error type for the fulfillment engine and coin ledger.
//!
//! The transition taxonomy (`NotFound` through `Conflict`) is what callers match on;
//! `Config` and `Database` wrap infrastructure failures.

use thiserror::Error;

/// Every failure the crate can report.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced record, profile or product does not exist
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of thing that was looked up (e.g. "order")
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The requester fails the role or ownership check for the attempted action
    #[error("Unauthorized: {reason}")]
    Unauthorized {
        /// Why the requester was turned away
        reason: String,
    },

    /// The record is not in the source status required by the attempted edge
    #[error("Invalid state: {entity} {id} is '{current}', expected '{expected}'")]
    InvalidState {
        /// Record kind
        entity: &'static str,
        /// Record id
        id: String,
        /// Status the record is actually in
        current: String,
        /// Status the edge requires
        expected: String,
    },

    /// A claim lost to another salesperson
    #[error("{entity} {id} is already assigned to salesperson '{salesperson_id}'")]
    AlreadyAssigned {
        /// Record kind
        entity: &'static str,
        /// Record id
        id: String,
        /// Salesperson currently holding the record
        salesperson_id: String,
    },

    /// Handoff token content does not parse or lacks required fields
    #[error("Malformed handoff token: {reason}")]
    MalformedToken {
        /// What was wrong with the token
        reason: String,
    },

    /// Caller-supplied values fail domain constraints
    #[error("Validation failed: {message}")]
    Validation {
        /// Description of the violated constraint
        message: String,
    },

    /// A conditional write matched nothing and a re-read could not explain it
    #[error("Concurrent update conflict on {entity} {id}")]
    Conflict {
        /// Record kind
        entity: &'static str,
        /// Record id
        id: String,
    },

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl Error {
    /// Shorthand for [`Error::Unauthorized`].
    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::Validation`].
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::MalformedToken`].
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedToken {
            reason: reason.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
