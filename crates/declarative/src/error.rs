//! Error types for reconciliation.
//!
//! Errors are layered: a backend primitive raises [`Error::Backend`] or
//! [`Error::NotFound`], and every layer above wraps it in
//! [`Error::Operation`] naming what was being attempted and for which entity.
//! The rendered message therefore reads as a chain, one line of context per
//! layer, ending in the original cause. The wrapped cause is part of the
//! message and is not also exposed through `source()`, so reporters that walk
//! the source chain print each line once.

use thiserror::Error;

/// Errors that can occur while observing or converging an external system
#[derive(Debug, Error)]
pub enum Error {
    /// Listing current state failed; no plan can be computed
    #[error("unable to list {what}: {cause}")]
    Observe {
        /// What was being listed (e.g. "roles")
        what: String,
        cause: Box<Error>,
    },

    /// A mutation against an external system failed
    #[error("{action} {target}: {cause}")]
    Operation {
        /// What was being attempted (e.g. "failed detaching policy")
        action: String,
        /// The named entity the action targeted
        target: String,
        cause: Box<Error>,
    },

    /// The external system rejected a primitive call
    #[error("{system}: {message}")]
    Backend {
        /// Which external system raised the error
        system: &'static str,
        /// Message reported by the system
        message: String,
    },

    /// A primitive referenced an entity the system does not know
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Entity kind (e.g. "role", "cluster")
        kind: &'static str,
        /// Name of the missing entity
        name: String,
    },

    /// A policy document could not be serialized
    #[error("failed to encode JSON")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a backend error for `system`.
    pub fn backend(system: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            system,
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// The innermost cause of this error.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Observe { cause, .. } | Self::Operation { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Adds one line of context to a failing result.
pub trait ResultExt<T> {
    /// Wrap the error as a failed `action` against `target`.
    fn during(self, action: &str, target: &str) -> Result<T>;

    /// Wrap the error as a failed listing of `what`.
    fn observing(self, what: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn during(self, action: &str, target: &str) -> Result<T> {
        self.map_err(|cause| Error::Operation {
            action: action.to_string(),
            target: target.to_string(),
            cause: Box::new(cause),
        })
    }

    fn observing(self, what: &str) -> Result<T> {
        self.map_err(|cause| Error::Observe {
            what: what.to_string(),
            cause: Box::new(cause),
        })
    }
}
