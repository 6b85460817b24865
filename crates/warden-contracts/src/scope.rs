//! Request-scoped identity: who is asking, and within which operation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Unique identifier for one logical operation (typically one request).
///
/// Appears in every log line and decision record produced while the
/// operation's expressions are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub uuid::Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The principal on whose behalf checks run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// `None` for anonymous callers.
    pub id: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            roles: BTreeSet::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Everything a check may consult besides the resource itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestScope {
    pub operation_id: OperationId,
    pub user: User,
}

impl RequestScope {
    pub fn new(user: User) -> Self {
        Self {
            operation_id: OperationId::new(),
            user,
        }
    }
}
