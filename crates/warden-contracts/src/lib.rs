//! # warden-contracts
//!
//! Shared types, the rule AST, and error contracts for the WARDEN permission
//! engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod error;
pub mod permission;
pub mod resource;
pub mod rule;
pub mod scope;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use error::{CheckFault, WardenError};
    use permission::{CheckPhase, CheckResult, PermissionKind};
    use resource::{ChangeSpec, PersistentResource};
    use rule::RuleExpr;
    use scope::{OperationId, User};

    // ── CheckResult ──────────────────────────────────────────────────────────

    #[test]
    fn check_result_defaults_to_unevaluated() {
        assert_eq!(CheckResult::default(), CheckResult::Unevaluated);
        assert!(!CheckResult::default().is_evaluated());
    }

    #[test]
    fn check_result_from_bool() {
        assert_eq!(CheckResult::from(true), CheckResult::Passed);
        assert_eq!(CheckResult::from(false), CheckResult::Failed);
    }

    #[test]
    fn check_result_negate_leaves_unevaluated_alone() {
        assert_eq!(CheckResult::Passed.negate(), CheckResult::Failed);
        assert_eq!(CheckResult::Failed.negate(), CheckResult::Passed);
        assert_eq!(CheckResult::Unevaluated.negate(), CheckResult::Unevaluated);
    }

    #[test]
    fn check_result_three_valued_and() {
        use CheckResult::*;
        assert_eq!(Passed.and(Passed), Passed);
        assert_eq!(Passed.and(Failed), Failed);
        assert_eq!(Unevaluated.and(Failed), Failed);
        assert_eq!(Unevaluated.and(Passed), Unevaluated);
    }

    #[test]
    fn check_result_three_valued_or() {
        use CheckResult::*;
        assert_eq!(Failed.or(Failed), Failed);
        assert_eq!(Failed.or(Passed), Passed);
        assert_eq!(Unevaluated.or(Passed), Passed);
        assert_eq!(Unevaluated.or(Failed), Unevaluated);
    }

    // ── PermissionKind / CheckPhase ──────────────────────────────────────────

    #[test]
    fn permission_kind_labels_are_uppercase() {
        let labels: Vec<String> = PermissionKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(labels, ["READ", "UPDATE", "CREATE", "DELETE", "SHARE"]);
    }

    #[test]
    fn permission_kind_deserializes_from_lowercase() {
        let kind: PermissionKind = serde_json::from_str("\"update\"").unwrap();
        assert_eq!(kind, PermissionKind::Update);
    }

    #[test]
    fn check_phase_defaults_to_inline() {
        assert_eq!(CheckPhase::default(), CheckPhase::Inline);
        let phase: CheckPhase = serde_json::from_str("\"commit\"").unwrap();
        assert_eq!(phase, CheckPhase::Commit);
    }

    // ── Resources ────────────────────────────────────────────────────────────

    #[test]
    fn resource_display_uses_null_for_missing_id() {
        let resource = PersistentResource::new("model", None);
        assert_eq!(resource.to_string(), "PersistentResource { type=model, id=null }");

        let stored = PersistentResource::new("book", Some("7".to_string()));
        assert_eq!(stored.to_string(), "PersistentResource { type=book, id=7 }");
    }

    #[test]
    fn resource_instances_are_distinct() {
        let a = PersistentResource::new("model", None);
        let b = PersistentResource::new("model", None);
        assert_ne!(a.instance(), b.instance());
        assert_eq!(a.clone().instance(), a.instance());
    }

    #[test]
    fn change_spec_display() {
        let resource = Arc::new(PersistentResource::new("model", None));
        let change = ChangeSpec::new(resource, "foo", 1, 2);
        assert_eq!(
            change.to_string(),
            "ChangeSpec { resource=PersistentResource { type=model, id=null }, \
             field=foo, original=1, modified=2}"
        );
        assert!(!change.is_noop());
    }

    #[test]
    fn change_spec_display_strings_unquoted() {
        let resource = Arc::new(PersistentResource::new("book", Some("42".to_string())));
        let change = ChangeSpec::new(resource, "title", "Dune", serde_json::Value::Null);
        assert_eq!(
            change.to_string(),
            "ChangeSpec { resource=PersistentResource { type=book, id=42 }, \
             field=title, original=Dune, modified=null}"
        );
    }

    // ── Scope ────────────────────────────────────────────────────────────────

    #[test]
    fn user_roles() {
        let user = User::new("alice").with_role("librarian");
        assert!(user.has_role("librarian"));
        assert!(!user.has_role("admin"));
        assert!(User::anonymous().id.is_none());
    }

    #[test]
    fn operation_ids_are_unique() {
        let ids: std::collections::HashSet<OperationId> = (0..50).map(|_| OperationId::new()).collect();
        assert_eq!(ids.len(), 50);
    }

    // ── RuleExpr ─────────────────────────────────────────────────────────────

    #[test]
    fn rule_expr_collects_check_names_in_order() {
        let rule = RuleExpr::check("a")
            .and(RuleExpr::check("b").or(RuleExpr::check("c").negate()));
        assert_eq!(rule.check_names(), ["a", "b", "c"]);
        assert_eq!(rule.depth(), 4);
        assert_eq!(rule.to_string(), "(a AND (b OR NOT c))");
    }

    // ── WardenError display messages ─────────────────────────────────────────

    #[test]
    fn error_config_display() {
        let msg = WardenError::config("unknown check 'x'").to_string();
        assert!(msg.contains("configuration error"));
        assert!(msg.contains("unknown check 'x'"));
    }

    #[test]
    fn error_check_execution_display() {
        let err = WardenError::CheckExecution {
            check: "is owner".to_string(),
            reason: CheckFault::new("owner lookup timed out").to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("is owner"));
        assert!(msg.contains("owner lookup timed out"));
    }

    #[test]
    fn error_forbidden_display() {
        let err = WardenError::ForbiddenAccess {
            kind: PermissionKind::Update,
            resource: "PersistentResource { type=book, id=1 }".to_string(),
            trace: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "UPDATE permission denied on PersistentResource { type=book, id=1 }"
        );
    }
}
