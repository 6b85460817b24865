//! Dictionary configuration schema.
//!
//! A `DictionaryConfig` is deserialized from TOML.  It declares the prefab
//! checks available to rules and binds entity types to their entity-level
//! and field-level permission rules.  Rules stay as strings here; the
//! dictionary parses them when an entity is bound.
//!
//! Example:
//! ```toml
//! [checks."is owner"]
//! kind = "owner"
//! attribute = "owner_id"
//!
//! [[entities]]
//! name = "book"
//! [entities.permissions]
//! read = "is owner OR is librarian"
//!
//! [[entities.fields]]
//! name = "title"
//! [entities.fields.permissions]
//! update = "is owner"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use warden_contracts::permission::{CheckPhase, PermissionKind};

/// Which prefab predicate a configured check uses.
///
/// Expressed in TOML as a kebab-case string:
/// ```toml
/// kind = "allow-all"
/// kind = "deny-all"
/// kind = "has-role"          # requires `role`
/// kind = "owner"             # requires `attribute`
/// kind = "attribute-equals"  # requires `attribute` and `value`
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    AllowAll,
    DenyAll,
    HasRole,
    Owner,
    AttributeEquals,
}

/// One check declared in TOML.
///
/// Only the parameters relevant to `kind` are read; a missing required one
/// is a configuration error when the dictionary is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub kind: CheckKind,

    /// Role the user must hold, for `has-role`.
    pub role: Option<String>,

    /// Resource attribute inspected by `owner` and `attribute-equals`.
    pub attribute: Option<String>,

    /// Expected attribute value, for `attribute-equals`.
    pub value: Option<serde_json::Value>,

    /// `"inline"` (default) or `"commit"`.
    #[serde(default)]
    pub phase: CheckPhase,
}

/// Permission rules for one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    #[serde(default)]
    pub permissions: BTreeMap<PermissionKind, String>,
}

/// Permission rules for one entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,

    /// Entity-level rules keyed by permission kind.
    #[serde(default)]
    pub permissions: BTreeMap<PermissionKind, String>,

    /// Fields in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// The top-level structure deserialized from a TOML dictionary file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictionaryConfig {
    #[serde(default)]
    pub checks: BTreeMap<String, CheckConfig>,

    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}
