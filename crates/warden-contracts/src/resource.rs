//! The subject of a permission check and the change being applied to it.
//!
//! WARDEN never inspects a resource beyond its type, id, and attribute bag;
//! checks decide what the attributes mean.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A resource instance whose access is being decided.
///
/// `instance` identifies this in-memory instance.  Two resources with the
/// same `id` loaded separately are distinct subjects for caching purposes,
/// and new resources without an `id` still get a stable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentResource {
    /// Declared entity type, as bound in the dictionary.
    pub type_name: String,
    /// Persistent identifier; `None` for objects not yet stored.
    pub id: Option<String>,
    /// Arbitrary attribute bag checks may read.
    pub attributes: serde_json::Value,
    #[serde(default = "Uuid::new_v4")]
    instance: Uuid,
}

impl PersistentResource {
    pub fn new(type_name: impl Into<String>, id: Option<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id,
            attributes: serde_json::Value::Null,
            instance: Uuid::new_v4(),
        }
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = attributes;
        self
    }

    /// Look up a top-level attribute.
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }
}

impl fmt::Display for PersistentResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PersistentResource {{ type={}, id={} }}",
            self.type_name,
            self.id.as_deref().unwrap_or("null")
        )
    }
}

/// A pending change to one field of a resource, used by update checks.
#[derive(Debug, Clone)]
pub struct ChangeSpec {
    pub resource: Arc<PersistentResource>,
    pub field: String,
    pub original: serde_json::Value,
    pub modified: serde_json::Value,
}

impl ChangeSpec {
    pub fn new(
        resource: Arc<PersistentResource>,
        field: impl Into<String>,
        original: impl Into<serde_json::Value>,
        modified: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            resource,
            field: field.into(),
            original: original.into(),
            modified: modified.into(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.original == self.modified
    }
}

/// Strings render bare; every other value renders as JSON.
struct Verbatim<'a>(&'a serde_json::Value);

impl fmt::Display for Verbatim<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for ChangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChangeSpec {{ resource={}, field={}, original={}, modified={}}}",
            self.resource,
            self.field,
            Verbatim(&self.original),
            Verbatim(&self.modified)
        )
    }
}
