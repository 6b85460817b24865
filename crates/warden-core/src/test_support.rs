//! In-memory collaborators shared by this crate's unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use warden_contracts::{
    error::{CheckFault, WardenError, WardenResult},
    permission::{CheckPhase, PermissionKind},
    resource::{ChangeSpec, PersistentResource},
    rule::RuleExpr,
    scope::RequestScope,
};

use crate::traits::{Check, CheckResolver, PermissionCatalog};

/// A check with a fixed verdict that counts how often it runs.
pub struct FixedCheck {
    verdict: Result<bool, CheckFault>,
    phase: CheckPhase,
    delay: Option<Duration>,
    pub calls: Arc<Mutex<u32>>,
}

impl FixedCheck {
    pub fn passing() -> Self {
        Self::with(Ok(true))
    }

    pub fn failing() -> Self {
        Self::with(Ok(false))
    }

    pub fn faulting(reason: &str) -> Self {
        Self::with(Err(CheckFault::new(reason)))
    }

    pub fn at_commit(mut self) -> Self {
        self.phase = CheckPhase::Commit;
        self
    }

    /// Sleep for `millis` before answering.
    pub fn slow(mut self, millis: u64) -> Self {
        self.delay = Some(Duration::from_millis(millis));
        self
    }

    fn with(verdict: Result<bool, CheckFault>) -> Self {
        Self {
            verdict,
            phase: CheckPhase::Inline,
            delay: None,
            calls: Arc::new(Mutex::new(0)),
        }
    }
}

impl Check for FixedCheck {
    fn ok(
        &self,
        _resource: &PersistentResource,
        _change: Option<&ChangeSpec>,
        _scope: &RequestScope,
    ) -> Result<bool, CheckFault> {
        *self.calls.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.verdict.clone()
    }

    fn phase(&self) -> CheckPhase {
        self.phase
    }
}

#[derive(Default)]
struct MockEntity {
    rules: HashMap<PermissionKind, RuleExpr>,
    fields: Vec<(String, HashMap<PermissionKind, RuleExpr>)>,
}

/// Hand-wired catalog and resolver.
#[derive(Default)]
pub struct MockDictionary {
    entities: HashMap<String, MockEntity>,
    checks: HashMap<String, Arc<dyn Check>>,
}

impl MockDictionary {
    /// Register `check` and return its invocation counter.
    pub fn with_check(&mut self, name: &str, check: FixedCheck) -> Arc<Mutex<u32>> {
        let calls = check.calls.clone();
        self.checks.insert(name.to_string(), Arc::new(check));
        calls
    }

    pub fn with_entity(&mut self, name: &str) -> &mut Self {
        self.entities.entry(name.to_string()).or_default();
        self
    }

    pub fn with_entity_rule(&mut self, entity: &str, kind: PermissionKind, rule: RuleExpr) -> &mut Self {
        self.entities
            .entry(entity.to_string())
            .or_default()
            .rules
            .insert(kind, rule);
        self
    }

    pub fn with_field(&mut self, entity: &str, field: &str) -> &mut Self {
        let e = self.entities.entry(entity.to_string()).or_default();
        if !e.fields.iter().any(|(name, _)| name == field) {
            e.fields.push((field.to_string(), HashMap::new()));
        }
        self
    }

    pub fn with_field_rule(
        &mut self,
        entity: &str,
        field: &str,
        kind: PermissionKind,
        rule: RuleExpr,
    ) -> &mut Self {
        self.with_field(entity, field);
        let e = self.entities.get_mut(entity).unwrap();
        let (_, rules) = e.fields.iter_mut().find(|(name, _)| name == field).unwrap();
        rules.insert(kind, rule);
        self
    }

    fn lookup(&self, entity: &str) -> WardenResult<&MockEntity> {
        self.entities
            .get(entity)
            .ok_or_else(|| WardenError::config(format!("entity '{}' is not bound", entity)))
    }
}

impl PermissionCatalog for MockDictionary {
    fn entity_rule(&self, entity: &str, kind: PermissionKind) -> WardenResult<Option<RuleExpr>> {
        Ok(self.lookup(entity)?.rules.get(&kind).cloned())
    }

    fn field_names(&self, entity: &str) -> WardenResult<Vec<String>> {
        Ok(self.lookup(entity)?.fields.iter().map(|(name, _)| name.clone()).collect())
    }

    fn field_rule(
        &self,
        entity: &str,
        field: &str,
        kind: PermissionKind,
    ) -> WardenResult<Option<RuleExpr>> {
        let (_, rules) = self
            .lookup(entity)?
            .fields
            .iter()
            .find(|(name, _)| name == field)
            .ok_or_else(|| {
                WardenError::config(format!("entity '{}' has no field '{}'", entity, field))
            })?;
        Ok(rules.get(&kind).cloned())
    }
}

impl CheckResolver for MockDictionary {
    fn resolve(&self, name: &str) -> WardenResult<Arc<dyn Check>> {
        self.checks
            .get(name)
            .cloned()
            .ok_or_else(|| WardenError::config(format!("check '{}' is not registered", name)))
    }
}
