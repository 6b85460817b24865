//! Permission kinds, check phases, and the tri-state check result.
//!
//! Every expression node carries a `CheckResult`.  It starts `Unevaluated`
//! and moves to `Passed` or `Failed` at most once.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of access being requested.
///
/// Written in TOML as a lowercase key (`read = "..."`).  `Display` produces
/// the uppercase label used in trace headers (`READ`, `UPDATE`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionKind {
    Read,
    Update,
    Create,
    Delete,
    Share,
}

impl PermissionKind {
    /// Every kind, in declaration order.
    pub const ALL: [PermissionKind; 5] = [
        PermissionKind::Read,
        PermissionKind::Update,
        PermissionKind::Create,
        PermissionKind::Delete,
        PermissionKind::Share,
    ];

    /// The uppercase label used in traces.
    pub fn label(self) -> &'static str {
        match self {
            PermissionKind::Read => "READ",
            PermissionKind::Update => "UPDATE",
            PermissionKind::Create => "CREATE",
            PermissionKind::Delete => "DELETE",
            PermissionKind::Share => "SHARE",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// When a check may run.
///
/// `Inline` checks run as soon as an expression is evaluated.  `Commit`
/// checks need the final state of the operation and are deferred out of
/// operation-phase trees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckPhase {
    #[default]
    Inline,
    Commit,
}

/// Tri-state outcome of a check or of a combinator node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckResult {
    #[default]
    Unevaluated,
    Passed,
    Failed,
}

impl CheckResult {
    pub fn is_passed(self) -> bool {
        self == CheckResult::Passed
    }

    pub fn is_failed(self) -> bool {
        self == CheckResult::Failed
    }

    pub fn is_evaluated(self) -> bool {
        self != CheckResult::Unevaluated
    }

    /// Swap `Passed` and `Failed`; `Unevaluated` is left alone.
    pub fn negate(self) -> Self {
        match self {
            CheckResult::Passed => CheckResult::Failed,
            CheckResult::Failed => CheckResult::Passed,
            CheckResult::Unevaluated => CheckResult::Unevaluated,
        }
    }

    /// Three-valued conjunction: any `Failed` wins, then any `Unevaluated`.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (CheckResult::Failed, _) | (_, CheckResult::Failed) => CheckResult::Failed,
            (CheckResult::Passed, CheckResult::Passed) => CheckResult::Passed,
            _ => CheckResult::Unevaluated,
        }
    }

    /// Three-valued disjunction: any `Passed` wins, then any `Unevaluated`.
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (CheckResult::Passed, _) | (_, CheckResult::Passed) => CheckResult::Passed,
            (CheckResult::Failed, CheckResult::Failed) => CheckResult::Failed,
            _ => CheckResult::Unevaluated,
        }
    }
}

impl From<bool> for CheckResult {
    fn from(passed: bool) -> Self {
        if passed {
            CheckResult::Passed
        } else {
            CheckResult::Failed
        }
    }
}
