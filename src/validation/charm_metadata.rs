//! Charm metadata - parses and validates `metadata.yaml`
//!
//! Every charm carries a `metadata.yaml` at the root of its branch. The
//! publisher only needs the name to cross-check the charm URL, but a charm
//! with broken metadata would be rejected by the store anyway, so the whole
//! document is validated before anything is pushed.
//!
//! # Example
//!
//! ```
//! use charm_publisher::validation::CharmMetadata;
//!
//! let meta = CharmMetadata::parse(
//!     "name: wordpress\nsummary: Blog engine\ndescription: WordPress.\n",
//! ).unwrap();
//! assert_eq!(meta.name, "wordpress");
//! ```

use crate::core::charm_url::is_valid_name;
use crate::core::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tokio::fs;

/// File name of the charm metadata inside a branch
pub const METADATA_FILE: &str = "metadata.yaml";

/// Which side of a relation a charm takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationRole {
    Provider,
    Requirer,
    Peer,
}

/// A relation endpoint declared in the metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub interface: String,
    pub role: RelationRole,
    #[serde(default)]
    pub optional: bool,
}

/// Parsed charm metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharmMetadata {
    pub name: String,
    pub summary: String,
    pub description: String,
    #[serde(default)]
    pub subordinate: bool,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl CharmMetadata {
    /// Read and validate `metadata.yaml` from a branch directory
    pub async fn load(branch_dir: &Path) -> Result<Self, ValidationError> {
        let path = branch_dir.join(METADATA_FILE);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| metadata_error(METADATA_FILE, e.to_string()))?;

        Self::parse(&content)
    }

    /// Parse and validate metadata from YAML text
    pub fn parse(content: &str) -> Result<Self, ValidationError> {
        let doc: Value = serde_yaml::from_str(content)
            .map_err(|e| metadata_error(METADATA_FILE, e.to_string()))?;

        let map = match doc {
            Value::Mapping(map) => map,
            other => {
                return Err(metadata_error(
                    METADATA_FILE,
                    format!("expected map, got {}", type_name(&other)),
                ));
            }
        };

        let name = required_string(&map, "name")?;
        let summary = required_string(&map, "summary")?;
        let description = required_string(&map, "description")?;

        if !is_valid_name(&name) {
            return Err(metadata_error("name", format!("invalid charm name {:?}", name)));
        }

        let subordinate = match map.get("subordinate") {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(metadata_error(
                    "subordinate",
                    format!("expected bool, got {}", type_name(other)),
                ));
            }
        };

        let mut relations = Vec::new();
        for (key, role) in [
            ("provides", RelationRole::Provider),
            ("requires", RelationRole::Requirer),
            ("peers", RelationRole::Peer),
        ] {
            relations.extend(parse_relations(&map, key, role)?);
        }

        if subordinate && !relations.iter().any(|r| r.role == RelationRole::Requirer) {
            return Err(metadata_error(
                "subordinate",
                "subordinate charm must require at least one relation",
            ));
        }

        Ok(Self {
            name,
            summary,
            description,
            subordinate,
            relations,
        })
    }
}

fn metadata_error(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::Metadata {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nothing",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "map",
        Value::Tagged(_) => "tagged value",
    }
}

fn required_string(map: &Mapping, field: &str) -> Result<String, ValidationError> {
    match map.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(metadata_error(
            field,
            format!("expected string, got {}", type_name(other)),
        )),
        None => Err(metadata_error(field, "expected string, got nothing")),
    }
}

/// Relations are either `name: interface` or `name: {interface: ..., optional: ...}`
fn parse_relations(
    map: &Mapping,
    key: &str,
    role: RelationRole,
) -> Result<Vec<Relation>, ValidationError> {
    let entries = match map.get(key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Mapping(entries)) => entries,
        Some(other) => {
            return Err(metadata_error(
                key,
                format!("expected map, got {}", type_name(other)),
            ));
        }
    };

    let mut relations = Vec::with_capacity(entries.len());
    for (name, spec) in entries {
        let Value::String(name) = name else {
            return Err(metadata_error(key, "relation names must be strings"));
        };
        let field = format!("{}.{}", key, name);

        let (interface, optional) = match spec {
            Value::String(interface) => (interface.clone(), false),
            Value::Mapping(spec) => {
                let interface = match spec.get("interface") {
                    Some(Value::String(interface)) => interface.clone(),
                    other => {
                        return Err(metadata_error(
                            &format!("{}.interface", field),
                            format!(
                                "expected string, got {}",
                                other.map_or("nothing", type_name)
                            ),
                        ));
                    }
                };
                let optional = matches!(spec.get("optional"), Some(Value::Bool(true)));
                (interface, optional)
            }
            other => {
                return Err(metadata_error(
                    &field,
                    format!("expected string or map, got {}", type_name(other)),
                ));
            }
        };

        relations.push(Relation {
            name: name.clone(),
            interface,
            role,
            optional,
        });
    }

    Ok(relations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VALID: &str = "name: wordpress\nsummary: Some summary\ndescription: Some description.\n";

    #[test]
    fn test_parse_minimal() {
        let meta = CharmMetadata::parse(VALID).unwrap();

        assert_eq!(meta.name, "wordpress");
        assert_eq!(meta.summary, "Some summary");
        assert_eq!(meta.description, "Some description.");
        assert!(!meta.subordinate);
        assert!(meta.relations.is_empty());
    }

    #[test]
    fn test_missing_description() {
        let result = CharmMetadata::parse("name: wordpress\nsummary: Some summary\n");

        let error = result.unwrap_err();
        assert_eq!(
            error.to_string(),
            "metadata: description: expected string, got nothing"
        );
    }

    #[test]
    fn test_wrong_field_type() {
        let result = CharmMetadata::parse("name: [a, b]\nsummary: s\ndescription: d\n");

        assert_eq!(
            result,
            Err(ValidationError::Metadata {
                field: "name".to_string(),
                reason: "expected string, got list".to_string(),
            })
        );
    }

    #[test]
    fn test_invalid_name() {
        let result = CharmMetadata::parse("name: Word_Press\nsummary: s\ndescription: d\n");
        assert!(matches!(
            result,
            Err(ValidationError::Metadata { ref field, .. }) if field == "name"
        ));
    }

    #[test]
    fn test_not_a_map() {
        let result = CharmMetadata::parse("- just\n- a list\n");
        assert_eq!(
            result.unwrap_err().to_string(),
            "metadata: metadata.yaml: expected map, got list"
        );
    }

    #[test]
    fn test_relations() {
        let yaml = r#"
name: wordpress
summary: Blog
description: Blog engine.
provides:
  website: http
requires:
  db:
    interface: mysql
  cache:
    interface: memcache
    optional: true
peers:
  loadbalancer: reversenginx
"#;
        let meta = CharmMetadata::parse(yaml).unwrap();

        assert_eq!(meta.relations.len(), 4);
        let cache = meta.relations.iter().find(|r| r.name == "cache").unwrap();
        assert_eq!(cache.role, RelationRole::Requirer);
        assert_eq!(cache.interface, "memcache");
        assert!(cache.optional);
        let website = meta.relations.iter().find(|r| r.name == "website").unwrap();
        assert_eq!(website.role, RelationRole::Provider);
    }

    #[test]
    fn test_relation_without_interface() {
        let yaml = "name: wordpress\nsummary: s\ndescription: d\nrequires:\n  db:\n    optional: true\n";

        let result = CharmMetadata::parse(yaml);

        assert!(matches!(
            result,
            Err(ValidationError::Metadata { ref field, .. }) if field == "requires.db.interface"
        ));
    }

    #[test]
    fn test_subordinate_requires_relation() {
        let yaml = "name: logger\nsummary: s\ndescription: d\nsubordinate: true\n";
        assert!(CharmMetadata::parse(yaml).is_err());

        let yaml = "name: logger\nsummary: s\ndescription: d\nsubordinate: true\nrequires:\n  host:\n    interface: juju-info\n";
        assert!(CharmMetadata::parse(yaml).unwrap().subordinate);
    }

    #[tokio::test]
    async fn test_load_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(METADATA_FILE), VALID).unwrap();

        let meta = CharmMetadata::load(temp_dir.path()).await.unwrap();
        assert_eq!(meta.name, "wordpress");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();

        let result = CharmMetadata::load(temp_dir.path()).await;

        assert!(matches!(
            result,
            Err(ValidationError::Metadata { ref field, .. }) if field == METADATA_FILE
        ));
    }
}
