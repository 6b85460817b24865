//! TOML-driven entity dictionary.
//!
//! `EntityDictionary` loads a `DictionaryConfig` from a TOML string or file
//! and implements both collaborator traits the expression builder needs:
//!
//! - `PermissionCatalog`: entity and field rules, parsed once at bind time
//! - `CheckResolver`: prefab checks from the config plus any checks the
//!   host registers programmatically
//!
//! Rules may name checks that are registered after loading.  Call
//! [`EntityDictionary::validate`] once registration is complete; otherwise
//! an unknown name surfaces as a `ConfigError` when an expression is built.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use warden_contracts::{
    error::{CheckFault, WardenError, WardenResult},
    permission::PermissionKind,
    resource::{ChangeSpec, PersistentResource},
    rule::RuleExpr,
    scope::RequestScope,
};
use warden_core::traits::{check_fn, Check, CheckResolver, PermissionCatalog};

use crate::{
    config::{DictionaryConfig, EntityConfig},
    parser::parse_rule,
    prefab::PrefabCheck,
};

type Rules = BTreeMap<PermissionKind, RuleExpr>;

#[derive(Debug, Default)]
struct EntityBinding {
    rules: Rules,
    /// Declaration order is preserved; any-field trees depend on it.
    fields: Vec<(String, Rules)>,
}

/// Entity metadata plus the check registry.
///
/// ```rust,ignore
/// use warden_policy::EntityDictionary;
///
/// let mut dictionary = EntityDictionary::from_file(Path::new("policies/library.toml"))?;
/// dictionary.register_fn("is weekday", |_, _, _| Ok(true));
/// dictionary.validate()?;
/// ```
#[derive(Default)]
pub struct EntityDictionary {
    entities: BTreeMap<String, EntityBinding>,
    checks: HashMap<String, Arc<dyn Check>>,
}

impl EntityDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dictionary from an already-deserialized config.
    ///
    /// Every prefab check is constructed and every entity is bound; the
    /// first problem is returned as `WardenError::ConfigError`.
    pub fn from_config(config: &DictionaryConfig) -> WardenResult<Self> {
        let mut dictionary = Self::new();
        for (name, check) in &config.checks {
            dictionary.register_check(name.clone(), Arc::new(PrefabCheck::from_config(name, check)?));
        }
        for entity in &config.entities {
            dictionary.bind_entity(entity)?;
        }

        info!(
            entities = dictionary.entities.len(),
            checks = dictionary.checks.len(),
            "entity dictionary loaded"
        );
        Ok(dictionary)
    }

    /// Parse `s` as TOML and build an `EntityDictionary`.
    ///
    /// Returns `WardenError::ConfigError` if the TOML is malformed, does not
    /// match `DictionaryConfig`, or contains an invalid rule.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        let config: DictionaryConfig = toml::from_str(s).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to parse dictionary TOML: {}", e),
        })?;
        Self::from_config(&config)
    }

    /// Read the file at `path` and parse it as a TOML dictionary.
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to read dictionary file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Register `check` under `name`, replacing any earlier registration.
    pub fn register_check(&mut self, name: impl Into<String>, check: Arc<dyn Check>) -> &mut Self {
        let name = name.into();
        debug!(check = %name, phase = ?check.phase(), "registering check");
        self.checks.insert(name, check);
        self
    }

    /// Register a closure as an inline check.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&PersistentResource, Option<&ChangeSpec>, &RequestScope) -> Result<bool, CheckFault>
            + Send
            + Sync
            + 'static,
    {
        self.register_check(name, Arc::new(check_fn(f)))
    }

    /// Bind an entity type and parse its rules.
    ///
    /// Returns `WardenError::ConfigError` for a duplicate entity or field and
    /// for any rule string that does not parse.
    pub fn bind_entity(&mut self, entity: &EntityConfig) -> WardenResult<()> {
        if self.entities.contains_key(&entity.name) {
            return Err(WardenError::config(format!(
                "entity '{}' is bound twice",
                entity.name
            )));
        }

        let mut binding = EntityBinding {
            rules: parse_rules(&entity.name, &entity.permissions)?,
            fields: Vec::with_capacity(entity.fields.len()),
        };

        for field in &entity.fields {
            if binding.fields.iter().any(|(name, _)| name == &field.name) {
                return Err(WardenError::config(format!(
                    "field '{}' is declared twice on entity '{}'",
                    field.name, entity.name
                )));
            }
            let owner = format!("{}.{}", entity.name, field.name);
            binding
                .fields
                .push((field.name.clone(), parse_rules(&owner, &field.permissions)?));
        }

        debug!(
            entity = %entity.name,
            rules = binding.rules.len(),
            fields = binding.fields.len(),
            "entity bound"
        );
        self.entities.insert(entity.name.clone(), binding);
        Ok(())
    }

    /// Verify that every rule references a registered check.
    pub fn validate(&self) -> WardenResult<()> {
        for (entity, binding) in &self.entities {
            let field_rules = binding.fields.iter().flat_map(|(_, rules)| rules.values());
            for rule in binding.rules.values().chain(field_rules) {
                for name in rule.check_names() {
                    if !self.checks.contains_key(name) {
                        return Err(WardenError::config(format!(
                            "rule '{}' on entity '{}' references unregistered check '{}'",
                            rule, entity, name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Names of all bound entity types, sorted.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    fn binding(&self, entity: &str) -> WardenResult<&EntityBinding> {
        self.entities
            .get(entity)
            .ok_or_else(|| WardenError::config(format!("entity '{}' is not bound", entity)))
    }
}

fn parse_rules(owner: &str, permissions: &BTreeMap<PermissionKind, String>) -> WardenResult<Rules> {
    permissions
        .iter()
        .map(|(kind, text)| {
            let rule = parse_rule(text).map_err(|e| {
                WardenError::config(format!(
                    "{} rule '{}' on '{}' is invalid: {}",
                    kind, text, owner, e
                ))
            })?;
            Ok((*kind, rule))
        })
        .collect()
}

impl PermissionCatalog for EntityDictionary {
    fn entity_rule(&self, entity: &str, kind: PermissionKind) -> WardenResult<Option<RuleExpr>> {
        Ok(self.binding(entity)?.rules.get(&kind).cloned())
    }

    fn field_names(&self, entity: &str) -> WardenResult<Vec<String>> {
        Ok(self
            .binding(entity)?
            .fields
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn field_rule(
        &self,
        entity: &str,
        field: &str,
        kind: PermissionKind,
    ) -> WardenResult<Option<RuleExpr>> {
        let (_, rules) = self
            .binding(entity)?
            .fields
            .iter()
            .find(|(name, _)| name == field)
            .ok_or_else(|| {
                WardenError::config(format!("entity '{}' has no field '{}'", entity, field))
            })?;
        Ok(rules.get(&kind).cloned())
    }
}

impl CheckResolver for EntityDictionary {
    fn resolve(&self, name: &str) -> WardenResult<Arc<dyn Check>> {
        self.checks
            .get(name)
            .cloned()
            .ok_or_else(|| WardenError::config(format!("check '{}' is not registered", name)))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use warden_contracts::{error::WardenError, permission::PermissionKind, rule::RuleExpr};
    use warden_core::traits::{CheckResolver, PermissionCatalog};

    use super::EntityDictionary;

    const LIBRARY: &str = r#"
        [checks."is owner"]
        kind = "owner"
        attribute = "owner_id"

        [checks."is librarian"]
        kind = "has-role"
        role = "librarian"

        [[entities]]
        name = "book"
        [entities.permissions]
        read = "is owner OR is librarian"

        [[entities.fields]]
        name = "title"
        [entities.fields.permissions]
        update = "is owner"

        [[entities.fields]]
        name = "isbn"
    "#;

    // ── Loading ───────────────────────────────────────────────────────────────

    #[test]
    fn test_load_from_toml() {
        let dict = EntityDictionary::from_toml_str(LIBRARY).unwrap();
        dict.validate().unwrap();

        assert_eq!(dict.entity_names().collect::<Vec<_>>(), vec!["book"]);
        assert_eq!(
            dict.entity_rule("book", PermissionKind::Read).unwrap(),
            Some(RuleExpr::check("is owner").or(RuleExpr::check("is librarian")))
        );
        assert_eq!(dict.entity_rule("book", PermissionKind::Delete).unwrap(), None);
        assert_eq!(dict.field_names("book").unwrap(), vec!["title", "isbn"]);
        assert_eq!(
            dict.field_rule("book", "title", PermissionKind::Update).unwrap(),
            Some(RuleExpr::check("is owner"))
        );
        assert_eq!(dict.field_rule("book", "isbn", PermissionKind::Update).unwrap(), None);
        assert!(dict.resolve("is librarian").is_ok());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        match EntityDictionary::from_toml_str("entities = 3") {
            Err(WardenError::ConfigError { reason }) => {
                assert!(reason.contains("failed to parse dictionary TOML"), "{reason}")
            }
            other => panic!("expected ConfigError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = EntityDictionary::from_file(Path::new("/nonexistent/library.toml"));
        assert!(matches!(result, Err(WardenError::ConfigError { .. })));
    }

    #[test]
    fn test_invalid_rule_is_config_error() {
        let toml = r#"
            [[entities]]
            name = "book"
            [entities.permissions]
            read = "is owner OR"
        "#;
        match EntityDictionary::from_toml_str(toml) {
            Err(WardenError::ConfigError { reason }) => {
                assert!(reason.contains("READ rule 'is owner OR' on 'book'"), "{reason}")
            }
            other => panic!("expected ConfigError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_long_flat_rule_is_config_error() {
        let rule = vec!["ok"; 2000].join(" AND ");
        let toml = format!(
            "[checks.ok]\nkind = \"allow-all\"\n\n[[entities]]\nname = \"book\"\n\
             [entities.permissions]\nread = \"{}\"\n",
            rule
        );
        match EntityDictionary::from_toml_str(&toml) {
            Err(WardenError::ConfigError { reason }) => {
                assert!(reason.contains("rule too deep"), "{reason}")
            }
            other => panic!("expected ConfigError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_duplicate_entity_is_config_error() {
        let toml = r#"
            [[entities]]
            name = "book"
            [[entities]]
            name = "book"
        "#;
        assert!(matches!(
            EntityDictionary::from_toml_str(toml),
            Err(WardenError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_duplicate_field_is_config_error() {
        let toml = r#"
            [[entities]]
            name = "book"
            [[entities.fields]]
            name = "title"
            [[entities.fields]]
            name = "title"
        "#;
        assert!(matches!(
            EntityDictionary::from_toml_str(toml),
            Err(WardenError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_prefab_missing_parameter_is_config_error() {
        let toml = r#"
            [checks."is owner"]
            kind = "owner"
        "#;
        assert!(matches!(
            EntityDictionary::from_toml_str(toml),
            Err(WardenError::ConfigError { .. })
        ));
    }

    // ── Registration and validation ──────────────────────────────────────────

    #[test]
    fn test_validate_reports_unregistered_check() {
        let toml = r#"
            [[entities]]
            name = "book"
            [entities.permissions]
            delete = "is weekday AND NOT is frozen"
        "#;
        let mut dict = EntityDictionary::from_toml_str(toml).unwrap();

        match dict.validate() {
            Err(WardenError::ConfigError { reason }) => {
                assert!(reason.contains("'is weekday'"), "{reason}")
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }

        dict.register_fn("is weekday", |_, _, _| Ok(true))
            .register_fn("is frozen", |_, _, _| Ok(false));
        dict.validate().unwrap();
    }

    #[test]
    fn test_unknown_entity_and_field() {
        let dict = EntityDictionary::from_toml_str(LIBRARY).unwrap();

        assert!(matches!(
            dict.entity_rule("magazine", PermissionKind::Read),
            Err(WardenError::ConfigError { .. })
        ));
        assert!(matches!(
            dict.field_rule("book", "author", PermissionKind::Read),
            Err(WardenError::ConfigError { .. })
        ));
        assert!(matches!(dict.resolve("is admin"), Err(WardenError::ConfigError { .. })));
    }
}
