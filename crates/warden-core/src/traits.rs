//! Collaborator interfaces consumed by the expression builder.
//!
//! These traits define the boundary between the engine and the host:
//!
//! - `Check`: a named predicate over a resource (host-provided)
//! - `CheckResolver`: maps check names to `Check` objects
//! - `PermissionCatalog`: entity and field metadata, i.e. which rule guards what
//!
//! The builder only ever sees parsed `RuleExpr` trees; how rule strings are
//! stored and parsed is the catalog's business.

use std::sync::Arc;

use warden_contracts::{
    error::{CheckFault, WardenResult},
    permission::{CheckPhase, PermissionKind},
    resource::{ChangeSpec, PersistentResource},
    rule::RuleExpr,
    scope::RequestScope,
};

/// A named boolean predicate over a resource.
///
/// Checks are stateless from the engine's point of view, but may be
/// expensive or have side effects.  The engine guarantees a check runs at
/// most once per (resource, change) within one operation.
pub trait Check: Send + Sync {
    /// Decide whether the check passes.
    ///
    /// Return `Err(CheckFault)` when no verdict can be produced.  A fault is
    /// surfaced as `WardenError::CheckExecution`, never as a denial.
    fn ok(
        &self,
        resource: &PersistentResource,
        change: Option<&ChangeSpec>,
        scope: &RequestScope,
    ) -> Result<bool, CheckFault>;

    /// Whether the check can run inline or must wait for commit.
    fn phase(&self) -> CheckPhase {
        CheckPhase::Inline
    }
}

/// Adapter turning a closure into a `Check`.
///
/// Built with [`check_fn`]; the explicit `Fn` bound there lets closure
/// parameter types be inferred.
pub struct FnCheck<F> {
    f: F,
    phase: CheckPhase,
}

impl<F> FnCheck<F> {
    pub fn with_phase(mut self, phase: CheckPhase) -> Self {
        self.phase = phase;
        self
    }
}

pub fn check_fn<F>(f: F) -> FnCheck<F>
where
    F: Fn(&PersistentResource, Option<&ChangeSpec>, &RequestScope) -> Result<bool, CheckFault>
        + Send
        + Sync,
{
    FnCheck {
        f,
        phase: CheckPhase::Inline,
    }
}

impl<F> Check for FnCheck<F>
where
    F: Fn(&PersistentResource, Option<&ChangeSpec>, &RequestScope) -> Result<bool, CheckFault>
        + Send
        + Sync,
{
    fn ok(
        &self,
        resource: &PersistentResource,
        change: Option<&ChangeSpec>,
        scope: &RequestScope,
    ) -> Result<bool, CheckFault> {
        (self.f)(resource, change, scope)
    }

    fn phase(&self) -> CheckPhase {
        self.phase
    }
}

/// Resolves check names appearing in rules.
pub trait CheckResolver: Send + Sync {
    /// Return the check registered under `name`.
    ///
    /// Unregistered names are a `WardenError::ConfigError`.
    fn resolve(&self, name: &str) -> WardenResult<Arc<dyn Check>>;
}

/// Entity and field permission metadata.
///
/// Every method returns `WardenError::ConfigError` when `entity` is not a
/// bound type.  `Ok(None)` means the type is bound but declares no rule.
pub trait PermissionCatalog: Send + Sync {
    /// The entity-level rule for `kind`.
    fn entity_rule(&self, entity: &str, kind: PermissionKind) -> WardenResult<Option<RuleExpr>>;

    /// All declared fields of `entity`, in declaration order.
    fn field_names(&self, entity: &str) -> WardenResult<Vec<String>>;

    /// The rule declared on `field` for `kind`.
    ///
    /// Unknown fields are a `WardenError::ConfigError`.
    fn field_rule(
        &self,
        entity: &str,
        field: &str,
        kind: PermissionKind,
    ) -> WardenResult<Option<RuleExpr>>;
}

/// A catalog that can also resolve its checks; what the builder consumes.
pub trait PermissionDictionary: PermissionCatalog + CheckResolver {}

impl<T: PermissionCatalog + CheckResolver + ?Sized> PermissionDictionary for T {}
