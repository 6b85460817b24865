//! Error types for the WARDEN permission engine.
//!
//! Build-time problems (bad metadata, unknown checks) surface as
//! `ConfigError`; a check that faults while running surfaces as
//! `CheckExecution`.  Neither is ever folded into a `Failed` verdict.

use thiserror::Error;

use crate::permission::PermissionKind;

/// The unified error type for the WARDEN crates.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Metadata or rule configuration is missing or invalid.
    ///
    /// Raised while building expressions, never while evaluating them.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A check predicate faulted instead of returning a verdict.
    ///
    /// Evaluation of the enclosing tree stops at the faulting leaf.
    #[error("check '{check}' failed to execute: {reason}")]
    CheckExecution { check: String, reason: String },

    /// The permission executor reached a `Failed` decision.
    ///
    /// `trace` is the plain-text rendering of the expression that failed.
    #[error("{kind} permission denied on {resource}")]
    ForbiddenAccess {
        kind: PermissionKind,
        resource: String,
        trace: String,
    },
}

impl WardenError {
    /// Shorthand for `WardenError::ConfigError`.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the WARDEN crates.
pub type WardenResult<T> = Result<T, WardenError>;

/// The fault a check reports when it cannot produce a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct CheckFault {
    pub reason: String,
}

impl CheckFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
