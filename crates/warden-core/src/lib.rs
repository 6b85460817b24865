//! # warden-core
//!
//! Builds and evaluates permission expressions for the WARDEN engine.
//!
//! This crate provides:
//! - The collaborator traits (`Check`, `CheckResolver`, `PermissionCatalog`)
//! - `PermissionExpressionBuilder`, which turns entity and field rules into
//!   operation and commit expression trees
//! - The per-operation `ExpressionResultCache`
//! - `PermissionExecutor`, which runs requests through both phases and keeps
//!   an audit list of decisions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{PermissionExecutor, traits::PermissionDictionary};
//!
//! let mut exec = PermissionExecutor::new(scope, dictionary);
//! exec.check_permission(PermissionKind::Read, &resource, None)?;
//! exec.execute_commit_checks()?;
//! ```

pub mod builder;
pub mod cache;
pub mod executor;
pub mod expression;
pub mod trace;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use builder::{Expressions, PermissionExpressionBuilder};
pub use cache::ExpressionResultCache;
pub use executor::{DecisionPhase, DecisionRecord, PermissionExecutor};
pub use expression::{Expression, PermissionExpression};
pub use trace::{TraceStyle, Traceable};
