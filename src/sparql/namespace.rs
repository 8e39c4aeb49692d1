//! Namespaces and IRI classification
//!
//! Prefix expansion for query text, and the knowledge-base IRI families the
//! converter distinguishes: entities, direct properties, and the three roles
//! of a reified statement.

use std::collections::HashMap;
use thiserror::Error;

pub const ENTITY_PREFIX: &str = "http://www.wikidata.org/entity/";
pub const PROPERTY_PREFIX: &str = "http://www.wikidata.org/prop/direct/";
pub const PROPERTY_PREDICATE_PREFIX: &str = "http://www.wikidata.org/prop/";
pub const PROPERTY_STATEMENT_PREFIX: &str = "http://www.wikidata.org/prop/statement/";
pub const PROPERTY_QUALIFIER_PREFIX: &str = "http://www.wikidata.org/prop/qualifier/";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const LABEL_SERVICE: &str = "http://wikiba.se/ontology#label";

/// Prefix errors
#[derive(Error, Debug)]
pub enum PrefixError {
    /// Unknown prefix
    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),

    /// Not a prefixed name
    #[error("Invalid IRI: {0}")]
    InvalidIri(String),
}

pub type PrefixResult<T> = Result<T, PrefixError>;

/// Prefix to IRI mappings, seeded with the knowledge-base prefixes that
/// questions routinely leave undeclared
#[derive(Debug, Clone)]
pub struct NamespaceManager {
    prefixes: HashMap<String, String>,
}

impl NamespaceManager {
    pub fn new() -> Self {
        let mut mgr = Self {
            prefixes: HashMap::new(),
        };

        mgr.add_prefix("wd", ENTITY_PREFIX);
        mgr.add_prefix("wdt", PROPERTY_PREFIX);
        mgr.add_prefix("p", PROPERTY_PREDICATE_PREFIX);
        mgr.add_prefix("ps", PROPERTY_STATEMENT_PREFIX);
        mgr.add_prefix("pq", PROPERTY_QUALIFIER_PREFIX);
        mgr.add_prefix("wikibase", "http://wikiba.se/ontology#");
        mgr.add_prefix("bd", "http://www.bigdata.com/rdf#");
        mgr.add_prefix("schema", "http://schema.org/");
        mgr.add_prefix("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#");
        mgr.add_prefix("rdfs", "http://www.w3.org/2000/01/rdf-schema#");
        mgr.add_prefix("xsd", "http://www.w3.org/2001/XMLSchema#");
        mgr.add_prefix("owl", "http://www.w3.org/2002/07/owl#");
        mgr.add_prefix("skos", "http://www.w3.org/2004/02/skos/core#");

        mgr
    }

    /// Add or replace a prefix
    pub fn add_prefix(&mut self, prefix: impl Into<String>, iri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), iri.into());
    }

    pub fn get_iri(&self, prefix: &str) -> PrefixResult<&str> {
        self.prefixes
            .get(prefix)
            .map(|s| s.as_str())
            .ok_or_else(|| PrefixError::UnknownPrefix(prefix.to_string()))
    }

    /// Expand `prefix:local` to a full IRI
    pub fn expand(&self, compact_iri: &str) -> PrefixResult<String> {
        match compact_iri.split_once(':') {
            Some((prefix, local)) => Ok(format!("{}{}", self.get_iri(prefix)?, local)),
            None => Err(PrefixError::InvalidIri(compact_iri.to_string())),
        }
    }

    /// Compact an IRI with the longest matching namespace
    pub fn compact(&self, iri: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter(|(_, ns)| iri.starts_with(ns.as_str()))
            .max_by_key(|(_, ns)| ns.len())
            .map(|(prefix, ns)| format!("{}:{}", prefix, &iri[ns.len()..]))
    }
}

impl Default for NamespaceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// `wd:Q42`
pub fn is_entity(iri: &str) -> bool {
    iri.starts_with(ENTITY_PREFIX)
}

/// `wdt:P31`
pub fn is_direct_property(iri: &str) -> bool {
    iri.starts_with(PROPERTY_PREFIX)
}

/// `ps:P39`
pub fn is_statement_property(iri: &str) -> bool {
    iri.starts_with(PROPERTY_STATEMENT_PREFIX)
}

/// `pq:P580`
pub fn is_qualifier_property(iri: &str) -> bool {
    iri.starts_with(PROPERTY_QUALIFIER_PREFIX)
}

/// `p:P39`, excluding the more specific families sharing its namespace
pub fn is_predicate_property(iri: &str) -> bool {
    iri.starts_with(PROPERTY_PREDICATE_PREFIX)
        && !is_direct_property(iri)
        && !is_statement_property(iri)
        && !is_qualifier_property(iri)
}

/// Any of the three reified-statement roles
pub fn is_reified_property(iri: &str) -> bool {
    is_predicate_property(iri) || is_statement_property(iri) || is_qualifier_property(iri)
}

/// Local id of a knowledge-base IRI: `Q42`, `P31`
pub fn local_id(iri: &str) -> &str {
    iri.rsplit('/').next().unwrap_or(iri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand() {
        let mgr = NamespaceManager::new();
        assert_eq!(mgr.expand("wd:Q42").unwrap(), "http://www.wikidata.org/entity/Q42");
        assert_eq!(mgr.expand("pq:P580").unwrap(), "http://www.wikidata.org/prop/qualifier/P580");
        assert!(matches!(mgr.expand("foo:bar"), Err(PrefixError::UnknownPrefix(_))));
    }

    #[test]
    fn test_compact_prefers_longest_namespace() {
        let mgr = NamespaceManager::new();
        assert_eq!(
            mgr.compact("http://www.wikidata.org/prop/statement/P39"),
            Some("ps:P39".to_string())
        );
        assert_eq!(mgr.compact("http://www.wikidata.org/prop/P39"), Some("p:P39".to_string()));
    }

    #[test]
    fn test_classification() {
        let p = "http://www.wikidata.org/prop/P39";
        let ps = "http://www.wikidata.org/prop/statement/P39";
        let wdt = "http://www.wikidata.org/prop/direct/P39";
        assert!(is_predicate_property(p));
        assert!(!is_predicate_property(ps));
        assert!(!is_predicate_property(wdt));
        assert!(is_reified_property(ps));
        assert!(!is_reified_property(wdt));
        assert_eq!(local_id(wdt), "P39");
    }
}
