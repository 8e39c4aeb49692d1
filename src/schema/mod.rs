//! Output schema lookups
//!
//! The schema document lists the output domains (tables), the knowledge-base
//! class each domain stands for, and the properties of each domain with their
//! knowledge-base ids and value types. It is loaded once per process and
//! never mutated afterwards.

pub mod types;

pub use types::ValueType;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Name of the generic catch-all domain
pub const GENERIC_DOMAIN: &str = "entity";

/// Schema errors
#[derive(Error, Debug)]
pub enum SchemaError {
    /// I/O error reading the document
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML syntax error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed value type
    #[error("Invalid type: {0}")]
    InvalidType(String),

    /// Two domains with the same name
    #[error("Duplicate domain: {0}")]
    DuplicateDomain(String),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Serialized form of the schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Prefix of entity type names (`wd` gives `wd:human`)
    #[serde(default = "default_device")]
    pub device: String,
    pub domains: Vec<DomainDef>,
}

fn default_device() -> String {
    "wd".to_string()
}

/// One output domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainDef {
    /// Table name, e.g. `human`
    pub name: String,
    /// Knowledge-base class, e.g. `Q5`
    pub subject: String,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

/// One property of a domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    /// Knowledge-base property id, e.g. `P569`
    pub id: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

#[derive(Debug, Clone)]
struct Domain {
    subject: String,
    arguments: Vec<String>,
}

/// Immutable domain and property lookups
#[derive(Debug, Clone)]
pub struct Schema {
    device: String,
    tables: HashMap<String, String>,
    properties: HashMap<String, String>,
    property_types: HashMap<String, ValueType>,
    domains: IndexMap<String, Domain>,
}

impl Schema {
    /// Build the lookups from a parsed document
    pub fn from_document(doc: SchemaDocument) -> SchemaResult<Self> {
        let mut schema = Self {
            device: doc.device,
            tables: HashMap::new(),
            properties: HashMap::new(),
            property_types: HashMap::new(),
            domains: IndexMap::new(),
        };

        for domain in doc.domains {
            if schema.domains.contains_key(&domain.name) {
                return Err(SchemaError::DuplicateDomain(domain.name));
            }
            schema.tables.insert(domain.subject.clone(), domain.name.clone());

            // every domain can be filtered by identity and by subclass
            let mut arguments = vec!["id".to_string(), "instance_of".to_string()];
            for property in domain.properties {
                if let Some(fields) = property.value_type.compound_fields() {
                    for (field, ty) in fields {
                        let compound_name = format!("{}.{}", property.name, field);
                        schema.property_types.insert(compound_name.clone(), ty.clone());
                        arguments.push(compound_name);
                    }
                }
                schema.properties.insert(property.id, property.name.clone());
                schema.property_types.insert(property.name.clone(), property.value_type);
                arguments.push(property.name);
            }
            schema.domains.insert(
                domain.name,
                Domain {
                    subject: domain.subject,
                    arguments,
                },
            );
        }

        Ok(schema)
    }

    pub fn from_yaml_str(s: &str) -> SchemaResult<Self> {
        Self::from_document(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> SchemaResult<Self> {
        Self::from_document(serde_json::from_str(s)?)
    }

    /// Load a schema document, choosing the format by file extension
    pub fn load(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        info!("Loading schema from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let schema = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            _ => Self::from_yaml_str(&content)?,
        };
        info!("Schema loaded with {} domains", schema.domains.len());
        Ok(schema)
    }

    /// Table name for a knowledge-base class id
    pub fn get_table(&self, qid: &str) -> Option<&str> {
        self.tables.get(qid).map(|s| s.as_str())
    }

    /// Property name for a knowledge-base property id
    pub fn get_property(&self, pid: &str) -> Option<&str> {
        self.properties.get(pid).map(|s| s.as_str())
    }

    /// Value type of a property name; compound fields are addressed as
    /// `property.field`
    pub fn get_property_type(&self, property: &str) -> Option<&ValueType> {
        self.property_types.get(property)
    }

    /// Whether the property holds a collection of values
    pub fn is_array_property(&self, property: &str) -> bool {
        self.get_property_type(property)
            .map(|t| t.is_array())
            .unwrap_or(false)
    }

    /// Arguments a domain's table accepts
    pub fn domain_arguments(&self, domain: &str) -> Option<&[String]> {
        self.domains.get(domain).map(|d| d.arguments.as_slice())
    }

    /// Knowledge-base class a domain stands for
    pub fn domain_subject(&self, domain: &str) -> Option<&str> {
        self.domains.get(domain).map(|d| d.subject.as_str())
    }

    pub fn is_domain(&self, name: &str) -> bool {
        self.domains.contains_key(name)
    }

    /// All domain names with their knowledge-base classes, in document order
    pub fn domains(&self) -> impl Iterator<Item = (&str, &str)> {
        self.domains
            .iter()
            .map(|(name, d)| (name.as_str(), d.subject.as_str()))
    }

    /// Prefix of entity type names
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Fully qualified entity type for a local name, e.g. `wd:human`
    pub fn entity_type(&self, name: &str) -> String {
        format!("{}:{}", self.device, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
domains:
  - name: human
    subject: Q5
    properties:
      - name: date_of_birth
        id: P569
        type: Date
      - name: position_held
        id: P39
        type: "Array(Compound(value: Entity(wd:p_position_held), start_time: Date))"
  - name: entity
    subject: Q35120
    properties:
      - name: country
        id: P17
        type: Array(Entity(wd:country))
"#;

    #[test]
    fn test_lookups() {
        let schema = Schema::from_yaml_str(DOC).unwrap();
        assert_eq!(schema.get_table("Q5"), Some("human"));
        assert_eq!(schema.get_table("Q6256"), None);
        assert_eq!(schema.get_property("P569"), Some("date_of_birth"));
        assert_eq!(schema.get_property_type("date_of_birth"), Some(&ValueType::Date));
        assert!(schema.is_array_property("country"));
        assert!(!schema.is_array_property("date_of_birth"));
        assert_eq!(schema.get_property_type("position_held.start_time"), Some(&ValueType::Date));
        assert_eq!(schema.entity_type("human"), "wd:human");
    }

    #[test]
    fn test_domain_arguments() {
        let schema = Schema::from_yaml_str(DOC).unwrap();
        let args = schema.domain_arguments("human").unwrap();
        assert!(args.contains(&"id".to_string()));
        assert!(args.contains(&"position_held.start_time".to_string()));
        assert!(!args.contains(&"country".to_string()));
        assert_eq!(schema.domain_subject("entity"), Some("Q35120"));
        assert!(schema.is_domain("entity"));
    }

    #[test]
    fn test_duplicate_domain() {
        let doc = "domains:\n  - name: a\n    subject: Q1\n  - name: a\n    subject: Q2\n";
        assert!(matches!(Schema::from_yaml_str(doc), Err(SchemaError::DuplicateDomain(_))));
    }
}
