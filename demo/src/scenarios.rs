//! Demo scenarios.
//!
//! The first three use a throwaway `model` entity with an always-pass and an
//! always-fail check, so each trace shows exactly which leaves were reached.
//! The library scenario drives a realistic dictionary through
//! `PermissionExecutor`.

use std::sync::Arc;

use serde_json::json;

use warden_contracts::{
    error::{WardenError, WardenResult},
    permission::{CheckResult, PermissionKind},
    resource::{ChangeSpec, PersistentResource},
    scope::{RequestScope, User},
};
use warden_core::{
    Expressions, ExpressionResultCache, PermissionExecutor, PermissionExpressionBuilder,
    TraceStyle, Traceable,
};
use warden_policy::EntityDictionary;

pub struct Options {
    pub style: TraceStyle,
}

// ── Model dictionaries ────────────────────────────────────────────────────────

const MODEL_CHECKS: &str = r#"
[checks."user has all access"]
kind = "allow-all"

[checks."user has no access"]
kind = "deny-all"
"#;

const ANY_FIELD_MODEL: &str = r#"
[[entities]]
name = "model"
[entities.permissions]
read = "user has all access AND user has no access"
"#;

const SPECIFIC_FIELD_MODEL: &str = r#"
[[entities]]
name = "model"
[entities.permissions]
update = "user has no access"

[[entities.fields]]
name = "foo"
[entities.fields.permissions]
update = "user has all access OR user has no access"
"#;

const SHAREABLE_MODEL: &str = r#"
[[entities]]
name = "model"
[entities.permissions]
share = "user has no access"
"#;

const UNSHAREABLE_MODEL: &str = r#"
[[entities]]
name = "model"
"#;

fn model_builder(entities: &str) -> WardenResult<PermissionExpressionBuilder> {
    let dictionary = EntityDictionary::from_toml_str(&format!("{}\n{}", MODEL_CHECKS, entities))?;
    dictionary.validate()?;
    Ok(PermissionExpressionBuilder::new(
        Arc::new(RequestScope::new(User::new("demo"))),
        ExpressionResultCache::new(),
        Arc::new(dictionary),
    ))
}

fn model() -> Arc<PersistentResource> {
    Arc::new(PersistentResource::new("model", None))
}

/// Print the commit trace, evaluate it, print it again.
fn show(options: &Options, mut expressions: Expressions) -> WardenResult<CheckResult> {
    let commit = expressions.commit_expression_mut();
    println!("  before: {}", commit.render(options.style));
    let result = commit.evaluate()?;
    println!("  after:  {}", commit.render(options.style));
    println!("  result: {:?}", result);
    println!();
    Ok(result)
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

pub fn any_field(options: &Options) -> WardenResult<()> {
    println!("── Any-field read ──────────────────────────────────────────────");
    let builder = model_builder(ANY_FIELD_MODEL)?;
    let expressions = builder.build_any_field_expressions(&model(), PermissionKind::Read, None)?;
    show(options, expressions)?;
    Ok(())
}

pub fn specific_field(options: &Options) -> WardenResult<()> {
    println!("── Specific-field update ───────────────────────────────────────");
    let builder = model_builder(SPECIFIC_FIELD_MODEL)?;
    let resource = model();
    let change = Arc::new(ChangeSpec::new(resource.clone(), "foo", 1, 2));
    let expressions = builder.build_specific_field_expressions(
        &resource,
        PermissionKind::Update,
        "foo",
        Some(change),
    )?;
    show(options, expressions)?;
    Ok(())
}

pub fn share(options: &Options) -> WardenResult<()> {
    println!("── Share ───────────────────────────────────────────────────────");
    for entities in [SHAREABLE_MODEL, UNSHAREABLE_MODEL] {
        let builder = model_builder(entities)?;
        let expressions = builder.build_share_permission_expressions(&model())?;
        show(options, expressions)?;
    }
    Ok(())
}

pub fn library(options: &Options, dictionary: EntityDictionary) -> WardenResult<()> {
    println!("── Library catalogue ───────────────────────────────────────────");
    let dictionary = Arc::new(dictionary);
    let book = Arc::new(
        PersistentResource::new("book", Some("42".to_string()))
            .with_attributes(json!({ "owner_id": "ann", "status": "draft", "title": "Dune" })),
    );

    let users = [
        ("owner", User::new("ann")),
        ("librarian", User::new("cat").with_role("librarian")),
        ("stranger", User::new("bob")),
    ];

    for (label, user) in users {
        println!("  as {} ({}):", label, user.id.as_deref().unwrap_or("anonymous"));
        let mut exec = PermissionExecutor::new(RequestScope::new(user), dictionary.clone());

        report("read", exec.check_permission(PermissionKind::Read, &book, None));

        let retitle = Arc::new(ChangeSpec::new(book.clone(), "title", "Dune", "Dune Messiah"));
        report(
            "update title",
            exec.check_specific_field_permission(&book, PermissionKind::Update, "title", Some(retitle)),
        );

        let publish = Arc::new(ChangeSpec::new(book.clone(), "status", "draft", "published"));
        report(
            "update status",
            exec.check_specific_field_permission(&book, PermissionKind::Update, "status", Some(publish)),
        );

        report("share", exec.check_share_permission(&book));

        let pending = exec.pending_commit_checks();
        match exec.execute_commit_checks() {
            Ok(()) => println!("    commit ({} queued): allowed", pending),
            Err(e) => println!("    commit ({} queued): {}", pending, e),
        }

        for decision in exec.decisions() {
            println!("      {:?} {:?}: {}", decision.phase, decision.verdict, decision.trace);
        }
        println!();
    }

    if options.style == TraceStyle::Ansi {
        println!("  (decision traces are always recorded uncoloured)");
        println!();
    }
    Ok(())
}

fn report(request: &str, result: WardenResult<CheckResult>) {
    match result {
        Ok(CheckResult::Passed) => println!("    {:<14} allowed", request),
        Ok(_) => println!("    {:<14} deferred to commit", request),
        Err(WardenError::ForbiddenAccess { .. }) => println!("    {:<14} forbidden", request),
        Err(e) => println!("    {:<14} error: {}", request, e),
    }
}
