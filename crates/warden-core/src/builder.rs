//! Assembles permission expressions from entity and field rules.
//!
//! One `PermissionExpressionBuilder` serves one operation.  Every tree it
//! builds shares the operation's `ExpressionResultCache`, so the same check
//! on the same resource and change is run at most once no matter how many
//! trees mention it.
//!
//! Each build returns an [`Expressions`] bundle:
//!
//! - an **operation** tree, evaluated as soon as the request touches the
//!   resource.  Commit-phase checks are deferred leaves here.
//! - a **commit** tree, evaluated once the operation's final state is known.
//!
//! Missing rules are fail-closed: a scope without an applicable rule becomes
//! a `FAILURE` constant, except share, which renders `NOT MARKED SHAREABLE`.

use std::sync::Arc;

use tracing::debug;

use warden_contracts::{
    error::WardenResult,
    permission::{CheckPhase, PermissionKind},
    resource::{ChangeSpec, PersistentResource},
    rule::RuleExpr,
    scope::RequestScope,
};

use crate::{
    cache::ExpressionResultCache,
    expression::{
        CheckExpression, EvaluationContext, Expression, ExpressionScope, Junction,
        PermissionCondition, PermissionExpression,
    },
    traits::{CheckResolver, PermissionCatalog, PermissionDictionary},
};

/// Which tree is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Operation,
    Commit,
}

/// The trees produced for one permission request.
#[derive(Debug)]
pub struct Expressions {
    operation: Option<PermissionExpression>,
    commit: PermissionExpression,
}

impl Expressions {
    pub fn new(operation: Option<PermissionExpression>, commit: PermissionExpression) -> Self {
        Self { operation, commit }
    }

    /// The operation-phase tree; absent for share requests.
    pub fn operation_expression(&self) -> Option<&PermissionExpression> {
        self.operation.as_ref()
    }

    pub fn operation_expression_mut(&mut self) -> Option<&mut PermissionExpression> {
        self.operation.as_mut()
    }

    /// The tree whose evaluation decides the request.
    pub fn commit_expression(&self) -> &PermissionExpression {
        &self.commit
    }

    pub fn commit_expression_mut(&mut self) -> &mut PermissionExpression {
        &mut self.commit
    }

    pub fn into_parts(self) -> (Option<PermissionExpression>, PermissionExpression) {
        (self.operation, self.commit)
    }
}

/// Builds [`Expressions`] for one operation.
pub struct PermissionExpressionBuilder {
    scope: Arc<RequestScope>,
    cache: ExpressionResultCache,
    dictionary: Arc<dyn PermissionDictionary>,
}

impl PermissionExpressionBuilder {
    pub fn new(
        scope: Arc<RequestScope>,
        cache: ExpressionResultCache,
        dictionary: Arc<dyn PermissionDictionary>,
    ) -> Self {
        Self {
            scope,
            cache,
            dictionary,
        }
    }

    pub fn cache(&self) -> &ExpressionResultCache {
        &self.cache
    }

    pub fn scope(&self) -> &Arc<RequestScope> {
        &self.scope
    }

    /// Expressions for "may any field of `resource` be accessed with `kind`".
    ///
    /// Commit tree: `FIELDS(f1 OR f2 OR ...) OR ENTITY(entity rule)`, fields
    /// first.  Either side falls back to `FAILURE` when nothing is declared.
    pub fn build_any_field_expressions(
        &self,
        resource: &Arc<PersistentResource>,
        kind: PermissionKind,
        change: Option<Arc<ChangeSpec>>,
    ) -> WardenResult<Expressions> {
        let entity = resource.type_name.as_str();
        let entity_rule = self.dictionary.entity_rule(entity, kind)?;

        let mut field_rules = Vec::new();
        for field in self.dictionary.field_names(entity)? {
            if let Some(rule) = self.dictionary.field_rule(entity, &field, kind)? {
                field_rules.push(rule);
            }
        }

        debug!(
            operation_id = %self.scope.operation_id,
            entity = %entity,
            kind = %kind,
            field_rules = field_rules.len(),
            has_entity_rule = entity_rule.is_some(),
            "building any-field expressions"
        );

        let ctx = self.context(resource, change.clone());
        let build = |phase: Phase| -> WardenResult<PermissionExpression> {
            let mut fields: Option<Expression> = None;
            for rule in &field_rules {
                let tree = self.tree(rule, &ctx, phase)?;
                fields = Some(match fields {
                    Some(acc) => Expression::or(acc, tree),
                    None => tree,
                });
            }
            let fields = fields.unwrap_or_else(Expression::fail_closed);
            let entity_term = self.tree_or_fail_closed(entity_rule.as_ref(), &ctx, phase)?;

            Ok(PermissionExpression::new(
                self.condition(kind, resource, change.clone()),
                ExpressionScope::AnyField(Junction::new(fields, entity_term)),
            ))
        };

        Ok(Expressions::new(Some(build(Phase::Operation)?), build(Phase::Commit)?))
    }

    /// Expressions for access to one named field.
    ///
    /// Uses the field's own rule, falling back to the entity rule.  The
    /// trace is tagged `FIELD` either way.
    pub fn build_specific_field_expressions(
        &self,
        resource: &Arc<PersistentResource>,
        kind: PermissionKind,
        field: &str,
        change: Option<Arc<ChangeSpec>>,
    ) -> WardenResult<Expressions> {
        let entity = resource.type_name.as_str();
        let rule = match self.dictionary.field_rule(entity, field, kind)? {
            Some(rule) => Some(rule),
            None => self.dictionary.entity_rule(entity, kind)?,
        };

        debug!(
            operation_id = %self.scope.operation_id,
            entity = %entity,
            field = %field,
            kind = %kind,
            has_rule = rule.is_some(),
            "building specific-field expressions"
        );

        let ctx = self.context(resource, change.clone());
        let build = |phase: Phase| -> WardenResult<PermissionExpression> {
            Ok(PermissionExpression::new(
                self.condition(kind, resource, change.clone()),
                ExpressionScope::Field(self.tree_or_fail_closed(rule.as_ref(), &ctx, phase)?),
            ))
        };

        Ok(Expressions::new(Some(build(Phase::Operation)?), build(Phase::Commit)?))
    }

    /// Expressions for an entity-level permission, ignoring field rules.
    pub fn build_entity_expressions(
        &self,
        resource: &Arc<PersistentResource>,
        kind: PermissionKind,
        change: Option<Arc<ChangeSpec>>,
    ) -> WardenResult<Expressions> {
        let rule = self.dictionary.entity_rule(&resource.type_name, kind)?;

        debug!(
            operation_id = %self.scope.operation_id,
            entity = %resource.type_name,
            kind = %kind,
            has_rule = rule.is_some(),
            "building entity expressions"
        );

        let ctx = self.context(resource, change.clone());
        let build = |phase: Phase| -> WardenResult<PermissionExpression> {
            Ok(PermissionExpression::new(
                self.condition(kind, resource, change.clone()),
                ExpressionScope::Entity(self.tree_or_fail_closed(rule.as_ref(), &ctx, phase)?),
            ))
        };

        Ok(Expressions::new(Some(build(Phase::Operation)?), build(Phase::Commit)?))
    }

    /// Expressions for sharing `resource`.
    ///
    /// Only a commit tree is produced.  An entity with no share rule gets the
    /// `NOT MARKED SHAREABLE` constant, which denies and never changes.
    pub fn build_share_permission_expressions(
        &self,
        resource: &Arc<PersistentResource>,
    ) -> WardenResult<Expressions> {
        let rule = self
            .dictionary
            .entity_rule(&resource.type_name, PermissionKind::Share)?;

        debug!(
            operation_id = %self.scope.operation_id,
            entity = %resource.type_name,
            shareable = rule.is_some(),
            "building share expressions"
        );

        let root = match &rule {
            Some(rule) => self.tree(rule, &self.context(resource, None), Phase::Commit)?,
            None => Expression::not_shareable(),
        };

        let commit = PermissionExpression::new(
            self.condition(PermissionKind::Share, resource, None),
            ExpressionScope::ShareEntity(root),
        );
        Ok(Expressions::new(None, commit))
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn context(
        &self,
        resource: &Arc<PersistentResource>,
        change: Option<Arc<ChangeSpec>>,
    ) -> EvaluationContext {
        EvaluationContext {
            resource: resource.clone(),
            change,
            scope: self.scope.clone(),
            cache: self.cache.clone(),
        }
    }

    fn condition(
        &self,
        kind: PermissionKind,
        resource: &Arc<PersistentResource>,
        change: Option<Arc<ChangeSpec>>,
    ) -> PermissionCondition {
        PermissionCondition {
            kind,
            resource: resource.clone(),
            change,
        }
    }

    fn tree_or_fail_closed(
        &self,
        rule: Option<&RuleExpr>,
        ctx: &EvaluationContext,
        phase: Phase,
    ) -> WardenResult<Expression> {
        match rule {
            Some(rule) => self.tree(rule, ctx, phase),
            None => Ok(Expression::fail_closed()),
        }
    }

    /// Wire a rule AST to checks.  Unknown check names fail here, at build
    /// time, through the resolver.
    fn tree(&self, rule: &RuleExpr, ctx: &EvaluationContext, phase: Phase) -> WardenResult<Expression> {
        Ok(match rule {
            RuleExpr::Check(name) => {
                let check = self.dictionary.resolve(name)?;
                let defer = phase == Phase::Operation && check.phase() == CheckPhase::Commit;
                let leaf = CheckExpression::new(name.clone(), check, ctx.clone());
                Expression::Check(if defer { leaf.deferred() } else { leaf })
            }
            RuleExpr::And(left, right) => {
                Expression::and(self.tree(left, ctx, phase)?, self.tree(right, ctx, phase)?)
            }
            RuleExpr::Or(left, right) => {
                Expression::or(self.tree(left, ctx, phase)?, self.tree(right, ctx, phase)?)
            }
            RuleExpr::Not(inner) => Expression::not(self.tree(inner, ctx, phase)?),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
