//! The per-operation permission executor.
//!
//! A `PermissionExecutor` owns one operation's `RequestScope`, result cache
//! and builder, and drives every permission request through two phases:
//!
//!   build → evaluate operation tree → (Passed | Failed | queue commit tree)
//!   ...operation runs...
//!   execute_commit_checks → evaluate queued commit trees
//!
//! A request is only denied by a `Failed` tree.  `Unevaluated` at operation
//! time means some commit-phase check is still outstanding; the matching
//! commit tree is queued and must be settled by `execute_commit_checks()`
//! before the operation is allowed to complete.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use warden_contracts::{
    error::{WardenError, WardenResult},
    permission::{CheckResult, PermissionKind},
    resource::{ChangeSpec, PersistentResource},
    scope::RequestScope,
};

use crate::{
    builder::{Expressions, PermissionExpressionBuilder},
    cache::ExpressionResultCache,
    expression::PermissionExpression,
    trace::{TraceStyle, Traceable},
    traits::PermissionDictionary,
};

/// When a decision was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionPhase {
    Operation,
    Commit,
}

/// One evaluated permission tree, kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub kind: PermissionKind,
    pub resource: String,
    pub phase: DecisionPhase,
    pub verdict: CheckResult,
    /// Uncoloured trace of the evaluated tree.
    pub trace: String,
    pub decided_at: DateTime<Utc>,
}

/// Runs permission requests for a single operation.
///
/// Construct one executor per operation; its cache lives exactly as long.
pub struct PermissionExecutor {
    builder: PermissionExpressionBuilder,
    pending: Vec<(PermissionKind, PermissionExpression)>,
    decisions: Vec<DecisionRecord>,
}

impl PermissionExecutor {
    pub fn new(scope: RequestScope, dictionary: Arc<dyn PermissionDictionary>) -> Self {
        Self {
            builder: PermissionExpressionBuilder::new(
                Arc::new(scope),
                ExpressionResultCache::new(),
                dictionary,
            ),
            pending: Vec::new(),
            decisions: Vec::new(),
        }
    }

    pub fn scope(&self) -> &RequestScope {
        self.builder.scope()
    }

    pub fn cache(&self) -> &ExpressionResultCache {
        self.builder.cache()
    }

    pub fn builder(&self) -> &PermissionExpressionBuilder {
        &self.builder
    }

    /// Every decision taken so far, oldest first.
    pub fn decisions(&self) -> &[DecisionRecord] {
        &self.decisions
    }

    /// Number of commit trees waiting for `execute_commit_checks()`.
    pub fn pending_commit_checks(&self) -> usize {
        self.pending.len()
    }

    /// May any field of `resource` be accessed with `kind`?
    ///
    /// # Errors
    ///
    /// `ForbiddenAccess` when the operation tree fails, `ConfigError` for
    /// unbound entities or unknown checks, `CheckExecution` for check faults.
    pub fn check_permission(
        &mut self,
        kind: PermissionKind,
        resource: &Arc<PersistentResource>,
        change: Option<Arc<ChangeSpec>>,
    ) -> WardenResult<CheckResult> {
        let expressions = self.builder.build_any_field_expressions(resource, kind, change)?;
        self.decide(kind, expressions)
    }

    /// May `field` of `resource` be accessed with `kind`?
    pub fn check_specific_field_permission(
        &mut self,
        resource: &Arc<PersistentResource>,
        kind: PermissionKind,
        field: &str,
        change: Option<Arc<ChangeSpec>>,
    ) -> WardenResult<CheckResult> {
        let expressions = self
            .builder
            .build_specific_field_expressions(resource, kind, field, change)?;
        self.decide(kind, expressions)
    }

    /// Entity-level permission, ignoring field rules.
    pub fn check_entity_permission(
        &mut self,
        kind: PermissionKind,
        resource: &Arc<PersistentResource>,
        change: Option<Arc<ChangeSpec>>,
    ) -> WardenResult<CheckResult> {
        let expressions = self.builder.build_entity_expressions(resource, kind, change)?;
        self.decide(kind, expressions)
    }

    /// May `resource` be shared?  Decided immediately, never queued.
    pub fn check_share_permission(
        &mut self,
        resource: &Arc<PersistentResource>,
    ) -> WardenResult<CheckResult> {
        let expressions = self.builder.build_share_permission_expressions(resource)?;
        self.decide(PermissionKind::Share, expressions)
    }

    /// Evaluate every queued commit tree.
    ///
    /// The queue is emptied even when a tree fails; the first failure is
    /// returned as `ForbiddenAccess`.
    pub fn execute_commit_checks(&mut self) -> WardenResult<()> {
        let pending = std::mem::take(&mut self.pending);

        info!(
            operation_id = %self.scope().operation_id,
            count = pending.len(),
            "executing commit checks"
        );

        for (kind, mut expression) in pending {
            let verdict = expression.evaluate()?;
            self.record(kind, DecisionPhase::Commit, &expression);
            if !verdict.is_passed() {
                return Err(self.deny(kind, &expression));
            }
        }
        Ok(())
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn decide(&mut self, kind: PermissionKind, expressions: Expressions) -> WardenResult<CheckResult> {
        let (operation, mut commit) = expressions.into_parts();

        let Some(mut operation) = operation else {
            let verdict = commit.evaluate()?;
            self.record(kind, DecisionPhase::Commit, &commit);
            return match verdict {
                CheckResult::Passed => Ok(verdict),
                _ => Err(self.deny(kind, &commit)),
            };
        };

        let verdict = operation.evaluate()?;
        self.record(kind, DecisionPhase::Operation, &operation);

        match verdict {
            CheckResult::Passed => Ok(verdict),
            CheckResult::Failed => Err(self.deny(kind, &operation)),
            CheckResult::Unevaluated => {
                debug!(
                    operation_id = %self.scope().operation_id,
                    kind = %kind,
                    resource = %commit.condition().resource,
                    "deferring decision to commit"
                );
                self.pending.push((kind, commit));
                Ok(verdict)
            }
        }
    }

    fn record(&mut self, kind: PermissionKind, phase: DecisionPhase, expression: &PermissionExpression) {
        self.decisions.push(DecisionRecord {
            kind,
            resource: expression.condition().resource.to_string(),
            phase,
            verdict: expression.result(),
            trace: expression.render(TraceStyle::Plain),
            decided_at: Utc::now(),
        });
    }

    fn deny(&self, kind: PermissionKind, expression: &PermissionExpression) -> WardenError {
        let trace = expression.render(TraceStyle::Plain);
        warn!(
            operation_id = %self.scope().operation_id,
            kind = %kind,
            trace = %trace,
            "permission denied"
        );
        WardenError::ForbiddenAccess {
            kind,
            resource: expression.condition().resource.to_string(),
            trace,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
