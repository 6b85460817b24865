//! Combinator expression trees and their evaluation.
//!
//! A tree is a closed set of node variants:
//!
//! - `Check`: one named check, run through the operation cache
//! - `And`/`Or`: binary junctions with left-to-right short-circuit
//! - `Not`: negation
//! - `Constant`: a fixed outcome standing in for a missing rule
//!
//! Evaluation is explicit (`evaluate()`), never a side effect of building
//! or printing.  Node states only move `Unevaluated → Passed | Failed`;
//! a short-circuited branch stays `Unevaluated` for the life of the tree.
//!
//! Commit-phase trees combine children with plain boolean logic.  An
//! operation-phase tree may contain *deferred* leaves, which report
//! `Unevaluated` without running their check; junctions then combine
//! three-valued (`CheckResult::and` / `CheckResult::or`) and the whole tree
//! may come out `Unevaluated`, meaning "decide at commit".

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use warden_contracts::{
    error::{WardenError, WardenResult},
    permission::{CheckResult, PermissionKind},
    resource::{ChangeSpec, PersistentResource},
    scope::RequestScope,
};

use crate::{
    cache::{CacheKey, ExpressionResultCache, Lookup},
    trace::{TraceStyle, Traceable},
    traits::Check,
};

/// What every leaf of one tree is evaluated against.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub resource: Arc<PersistentResource>,
    pub change: Option<Arc<ChangeSpec>>,
    pub scope: Arc<RequestScope>,
    pub cache: ExpressionResultCache,
}

// ── Nodes ─────────────────────────────────────────────────────────────────────

/// A node of a permission expression tree.
#[derive(Debug)]
pub enum Expression {
    Check(CheckExpression),
    And(Box<Junction>),
    Or(Box<Junction>),
    Not(Box<Negation>),
    Constant(ConstantExpression),
}

impl Expression {
    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(Junction::new(left, right)))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(Junction::new(left, right)))
    }

    pub fn not(child: Expression) -> Self {
        Expression::Not(Box::new(Negation {
            child,
            result: CheckResult::Unevaluated,
        }))
    }

    /// Stand-in for "no rule declared": always `Failed`, renders `FAILURE`.
    pub fn fail_closed() -> Self {
        Expression::Constant(ConstantExpression::FailClosed)
    }

    /// Stand-in for an entity without a share rule.
    pub fn not_shareable() -> Self {
        Expression::Constant(ConstantExpression::NotShareable)
    }

    /// Evaluate the subtree, updating node states in place.
    ///
    /// A check fault aborts immediately; nodes already settled keep their
    /// state so the trace shows how far evaluation got.
    pub fn evaluate(&mut self) -> WardenResult<CheckResult> {
        match self {
            Expression::Check(leaf) => leaf.evaluate(),
            Expression::And(junction) => junction.evaluate_and(),
            Expression::Or(junction) => junction.evaluate_or(),
            Expression::Not(negation) => negation.evaluate(),
            Expression::Constant(constant) => Ok(constant.verdict()),
        }
    }

    /// Current state, without evaluating anything.
    pub fn result(&self) -> CheckResult {
        match self {
            Expression::Check(leaf) => leaf.result,
            Expression::And(junction) | Expression::Or(junction) => junction.result,
            Expression::Not(negation) => negation.result,
            Expression::Constant(constant) => constant.verdict(),
        }
    }
}

impl Traceable for Expression {
    fn fmt_trace(&self, f: &mut fmt::Formatter<'_>, style: TraceStyle) -> fmt::Result {
        match self {
            Expression::Check(leaf) => {
                write!(f, "({} ", leaf.name)?;
                style.status(f, leaf.result)?;
                f.write_str(")")
            }
            Expression::And(junction) => junction.fmt_joined(f, style, "AND"),
            Expression::Or(junction) => junction.fmt_joined(f, style, "OR"),
            Expression::Not(negation) => {
                f.write_str("NOT (")?;
                negation.child.fmt_trace(f, style)?;
                f.write_str(")")
            }
            Expression::Constant(ConstantExpression::FailClosed) => {
                style.paint(f, CheckResult::Failed, "FAILURE")
            }
            Expression::Constant(ConstantExpression::NotShareable) => {
                f.write_str("NOT MARKED SHAREABLE")
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_trace(f, TraceStyle::Ansi)
    }
}

/// Leaf wrapping one named check.
pub struct CheckExpression {
    name: String,
    check: Arc<dyn Check>,
    context: EvaluationContext,
    deferred: bool,
    result: CheckResult,
}

impl CheckExpression {
    pub fn new(name: impl Into<String>, check: Arc<dyn Check>, context: EvaluationContext) -> Self {
        Self {
            name: name.into(),
            check,
            context,
            deferred: false,
            result: CheckResult::Unevaluated,
        }
    }

    /// A leaf that never runs its check and always reports `Unevaluated`.
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn result(&self) -> CheckResult {
        self.result
    }

    fn evaluate(&mut self) -> WardenResult<CheckResult> {
        if self.result.is_evaluated() || self.deferred {
            return Ok(self.result);
        }

        let ctx = &self.context;
        let key = CacheKey::new(&self.name, &ctx.resource, ctx.change.as_deref());

        let check = &self.check;
        let name = &self.name;
        let lookup = ctx.cache.get_or_evaluate(key, || {
            debug!(
                operation_id = %ctx.scope.operation_id,
                check = %name,
                resource = %ctx.resource,
                "invoking check"
            );
            check
                .ok(&ctx.resource, ctx.change.as_deref(), &ctx.scope)
                .map(CheckResult::from)
                .map_err(|fault| WardenError::CheckExecution {
                    check: name.clone(),
                    reason: fault.reason,
                })
        })?;

        if let Lookup::Hit(cached) = lookup {
            debug!(
                operation_id = %ctx.scope.operation_id,
                check = %self.name,
                result = ?cached,
                "adopting cached check result"
            );
        }

        let result = lookup.result();
        self.result = result;
        Ok(result)
    }
}

impl fmt::Debug for CheckExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckExpression")
            .field("name", &self.name)
            .field("deferred", &self.deferred)
            .field("result", &self.result)
            .finish()
    }
}

/// Two children joined by AND or OR.
///
/// The short-circuit contract lives here and only here.
#[derive(Debug)]
pub struct Junction {
    pub left: Expression,
    pub right: Expression,
    result: CheckResult,
}

impl Junction {
    pub fn new(left: Expression, right: Expression) -> Self {
        Self {
            left,
            right,
            result: CheckResult::Unevaluated,
        }
    }

    pub fn result(&self) -> CheckResult {
        self.result
    }

    /// `left` failing settles the node; `right` is then never evaluated.
    pub fn evaluate_and(&mut self) -> WardenResult<CheckResult> {
        let left = self.left.evaluate()?;
        if left.is_failed() {
            self.result = CheckResult::Failed;
            return Ok(self.result);
        }
        let right = self.right.evaluate()?;
        self.result = left.and(right);
        Ok(self.result)
    }

    /// `left` passing settles the node; `right` is then never evaluated.
    pub fn evaluate_or(&mut self) -> WardenResult<CheckResult> {
        let left = self.left.evaluate()?;
        if left.is_passed() {
            self.result = CheckResult::Passed;
            return Ok(self.result);
        }
        let right = self.right.evaluate()?;
        self.result = left.or(right);
        Ok(self.result)
    }

    fn fmt_joined(&self, f: &mut fmt::Formatter<'_>, style: TraceStyle, op: &str) -> fmt::Result {
        f.write_str("(")?;
        self.left.fmt_trace(f, style)?;
        write!(f, ") {} (", op)?;
        self.right.fmt_trace(f, style)?;
        f.write_str(")")
    }
}

#[derive(Debug)]
pub struct Negation {
    pub child: Expression,
    result: CheckResult,
}

impl Negation {
    fn evaluate(&mut self) -> WardenResult<CheckResult> {
        self.result = self.child.evaluate()?.negate();
        Ok(self.result)
    }
}

/// Fixed outcomes for rules that are absent rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantExpression {
    /// No applicable rule; deny.  Rendered as a red `FAILURE`.
    FailClosed,
    /// Entity carries no share rule at all.  Rendered verbatim, uncoloured.
    NotShareable,
}

impl ConstantExpression {
    pub fn verdict(self) -> CheckResult {
        CheckResult::Failed
    }
}

// ── Scoped, printable expressions ────────────────────────────────────────────

/// The header of a permission trace: what was asked about which resource.
#[derive(Debug, Clone)]
pub struct PermissionCondition {
    pub kind: PermissionKind,
    pub resource: Arc<PersistentResource>,
    pub change: Option<Arc<ChangeSpec>>,
}

impl fmt::Display for PermissionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} PERMISSION WAS INVOKED ON {} ", self.kind, self.resource)?;
        if let Some(change) = &self.change {
            write!(f, "WITH CHANGES {}", change)?;
        }
        Ok(())
    }
}

/// Which rules a tree was assembled from.
#[derive(Debug)]
pub enum ExpressionScope {
    /// Entity-level rule only.
    Entity(Expression),
    /// One field's rule, or the entity rule standing in for it.
    Field(Expression),
    /// `left` = OR over every field rule, `right` = entity rule.
    AnyField(Junction),
    /// Entity-level share rule.
    ShareEntity(Expression),
}

impl ExpressionScope {
    fn evaluate(&mut self) -> WardenResult<CheckResult> {
        match self {
            ExpressionScope::Entity(expr)
            | ExpressionScope::Field(expr)
            | ExpressionScope::ShareEntity(expr) => expr.evaluate(),
            ExpressionScope::AnyField(junction) => junction.evaluate_or(),
        }
    }

    fn result(&self) -> CheckResult {
        match self {
            ExpressionScope::Entity(expr)
            | ExpressionScope::Field(expr)
            | ExpressionScope::ShareEntity(expr) => expr.result(),
            ExpressionScope::AnyField(junction) => junction.result(),
        }
    }
}

impl Traceable for ExpressionScope {
    fn fmt_trace(&self, f: &mut fmt::Formatter<'_>, style: TraceStyle) -> fmt::Result {
        let (tag, expr) = match self {
            ExpressionScope::Entity(expr) => ("ENTITY", expr),
            ExpressionScope::Field(expr) => ("FIELD", expr),
            ExpressionScope::ShareEntity(expr) => ("SHARE ENTITY", expr),
            ExpressionScope::AnyField(junction) => {
                f.write_str("FIELDS(")?;
                junction.left.fmt_trace(f, style)?;
                f.write_str(") OR ENTITY(")?;
                junction.right.fmt_trace(f, style)?;
                return f.write_str(")");
            }
        };
        write!(f, "{}(", tag)?;
        expr.fmt_trace(f, style)?;
        f.write_str(")")
    }
}

/// A complete, printable permission expression.
///
/// `Display` renders the full trace line with ANSI colours:
///
/// ```text
/// READ PERMISSION WAS INVOKED ON PersistentResource { type=book, id=1 }  FOR EXPRESSION [ENTITY((is owner PASSED))]
/// ```
#[derive(Debug)]
pub struct PermissionExpression {
    condition: PermissionCondition,
    scope: ExpressionScope,
}

impl PermissionExpression {
    pub fn new(condition: PermissionCondition, scope: ExpressionScope) -> Self {
        Self { condition, scope }
    }

    pub fn evaluate(&mut self) -> WardenResult<CheckResult> {
        self.scope.evaluate()
    }

    pub fn result(&self) -> CheckResult {
        self.scope.result()
    }

    pub fn condition(&self) -> &PermissionCondition {
        &self.condition
    }

    pub fn scope(&self) -> &ExpressionScope {
        &self.scope
    }
}

impl Traceable for PermissionExpression {
    fn fmt_trace(&self, f: &mut fmt::Formatter<'_>, style: TraceStyle) -> fmt::Result {
        write!(f, "{} FOR EXPRESSION [", self.condition)?;
        self.scope.fmt_trace(f, style)?;
        f.write_str("]")
    }
}

impl fmt::Display for PermissionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_trace(f, TraceStyle::Ansi)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
