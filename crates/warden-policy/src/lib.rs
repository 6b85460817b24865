//! # warden-policy
//!
//! TOML-driven permission metadata for the WARDEN engine.
//!
//! ## Overview
//!
//! This crate provides [`EntityDictionary`], which implements both
//! [`PermissionCatalog`](warden_core::traits::PermissionCatalog) and
//! [`CheckResolver`](warden_core::traits::CheckResolver).  Entities, fields
//! and their rule strings are declared in TOML; rule strings are parsed by
//! [`parse_rule`] into the `RuleExpr` AST when an entity is bound.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::{path::Path, sync::Arc};
//! use warden_policy::EntityDictionary;
//!
//! let dictionary = EntityDictionary::from_file(Path::new("policies/library.toml"))?;
//! dictionary.validate()?;
//! let mut exec = warden_core::PermissionExecutor::new(scope, Arc::new(dictionary));
//! ```
//!
//! ## Rule strings
//!
//! Rules combine check names with `AND`, `OR`, `NOT` and parentheses.  A
//! check name may contain spaces: `is owner OR user has all access`.

pub mod config;
pub mod dictionary;
pub mod parser;
pub mod prefab;

pub use config::{CheckConfig, CheckKind, DictionaryConfig, EntityConfig, FieldConfig};
pub use dictionary::EntityDictionary;
pub use parser::{parse_rule, RuleParseError};
pub use prefab::{Predicate, PrefabCheck};

// ── Tests ─────────────────────────────────────────────────────────────────────
