//! Prefab checks that can be declared from configuration.
//!
//! Each `PrefabCheck` is built from a [`CheckConfig`] and decides using only
//! the resource's attribute bag, the pending change and the request user.

use serde_json::Value;

use warden_contracts::{
    error::{CheckFault, WardenError, WardenResult},
    permission::CheckPhase,
    resource::{ChangeSpec, PersistentResource},
    scope::RequestScope,
};
use warden_core::traits::Check;

use crate::config::{CheckConfig, CheckKind};

/// The predicate a prefab check applies.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Always passes.
    AllowAll,
    /// Always fails.
    DenyAll,
    /// The request user holds the role.
    HasRole(String),
    /// The attribute holds the request user's id.
    Owner(String),
    /// The attribute equals the value.  When the pending change targets the
    /// attribute, the modified value is compared instead.
    AttributeEquals(String, Value),
}

/// A configured prefab predicate plus the phase it runs in.
#[derive(Debug, Clone)]
pub struct PrefabCheck {
    predicate: Predicate,
    phase: CheckPhase,
}

impl PrefabCheck {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            phase: CheckPhase::Inline,
        }
    }

    pub fn with_phase(mut self, phase: CheckPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Build the check declared as `name`.
    ///
    /// Returns `WardenError::ConfigError` if a parameter required by the
    /// check's `kind` is missing.
    pub fn from_config(name: &str, config: &CheckConfig) -> WardenResult<Self> {
        let require = |param: &Option<String>, what: &str| {
            param.clone().ok_or_else(|| {
                WardenError::config(format!(
                    "check '{}' of kind {:?} requires '{}'",
                    name, config.kind, what
                ))
            })
        };

        let predicate = match config.kind {
            CheckKind::AllowAll => Predicate::AllowAll,
            CheckKind::DenyAll => Predicate::DenyAll,
            CheckKind::HasRole => Predicate::HasRole(require(&config.role, "role")?),
            CheckKind::Owner => Predicate::Owner(require(&config.attribute, "attribute")?),
            CheckKind::AttributeEquals => {
                let attribute = require(&config.attribute, "attribute")?;
                let value = config.value.clone().ok_or_else(|| {
                    WardenError::config(format!(
                        "check '{}' of kind {:?} requires 'value'",
                        name, config.kind
                    ))
                })?;
                Predicate::AttributeEquals(attribute, value)
            }
        };

        Ok(Self::new(predicate).with_phase(config.phase))
    }
}

impl Check for PrefabCheck {
    fn ok(
        &self,
        resource: &PersistentResource,
        change: Option<&ChangeSpec>,
        scope: &RequestScope,
    ) -> Result<bool, CheckFault> {
        match &self.predicate {
            Predicate::AllowAll => Ok(true),
            Predicate::DenyAll => Ok(false),
            Predicate::HasRole(role) => Ok(scope.user.has_role(role)),
            Predicate::Owner(attribute) => {
                let Some(user_id) = scope.user.id.as_deref() else {
                    return Ok(false);
                };
                match resource.attribute(attribute) {
                    None | Some(Value::Null) => Ok(false),
                    Some(Value::String(owner)) => Ok(owner == user_id),
                    Some(value @ (Value::Number(_) | Value::Bool(_))) => {
                        Ok(value.to_string() == user_id)
                    }
                    Some(_) => Err(CheckFault::new(format!(
                        "attribute '{}' on {} is not a scalar",
                        attribute, resource
                    ))),
                }
            }
            Predicate::AttributeEquals(attribute, expected) => {
                let actual = match change {
                    Some(change) if &change.field == attribute => Some(&change.modified),
                    _ => resource.attribute(attribute),
                };
                Ok(actual == Some(expected))
            }
        }
    }

    fn phase(&self) -> CheckPhase {
        self.phase
    }
}
