//! Knowledge-base access
//!
//! The converter only needs a handful of lookups: labels, the domain of an
//! entity, the schema domain a class falls under, and connected
//! properties. [`WikidataClient`] answers them over HTTP behind a
//! persistent [`RequestCache`]; [`InMemoryKnowledgeBase`] answers them from
//! tables filled in by the caller.

pub mod cache;
pub mod memory;
pub mod wikidata;

pub use cache::{CacheError, CacheResult, RequestCache};
pub use memory::InMemoryKnowledgeBase;
pub use wikidata::WikidataClient;

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static KB_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[PQ][0-9]+$").unwrap());

/// Human
pub const HUMAN: &str = "Q5";

/// Knowledge-base errors
#[derive(Error, Debug)]
pub enum KbError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Knowledge base API error: {0}")]
    Api(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

pub type KbResult<T> = Result<T, KbError>;

/// `Q42`, `P31`
pub fn is_kb_id(id: &str) -> bool {
    KB_ID.is_match(id)
}

/// `Q42`
pub fn is_entity(id: &str) -> bool {
    is_kb_id(id) && id.starts_with('Q')
}

/// Lookups the converter and its helpers issue against the knowledge base
///
/// Ids are bare (`Q42`, `P31`); every method may suspend on I/O.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// English label of an entity or property
    async fn get_label(&self, id: &str) -> KbResult<Option<String>>;

    /// English aliases
    async fn get_alt_labels(&self, id: &str) -> KbResult<Vec<String>>;

    /// Labels of many ids at once; ids that are not knowledge-base ids are skipped
    async fn get_labels_by_batch(&self, ids: &[String]) -> KbResult<IndexMap<String, Option<String>>> {
        let mut labels = IndexMap::new();
        for id in ids.iter().filter(|id| is_kb_id(id)) {
            if !labels.contains_key(id) {
                labels.insert(id.clone(), self.get_label(id).await?);
            }
        }
        Ok(labels)
    }

    /// The class an entity is most usefully an instance of
    async fn get_domain(&self, id: &str) -> KbResult<Option<String>>;

    /// First of `candidates` that any of `classes` is a (transitive) subclass of
    async fn get_top_level_domain(&self, classes: &[String], candidates: &[String]) -> KbResult<Option<String>>;

    /// Direct properties an entity has a value for
    async fn get_connected_property(&self, id: &str) -> KbResult<Vec<String>>;

    /// Values of `entity property ?v`
    async fn get_property_value(&self, entity: &str, property: &str) -> KbResult<Vec<String>>;

    /// Subjects of `?s property value`
    async fn get_entities_with_value(&self, property: &str, value: &str) -> KbResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids() {
        assert!(is_kb_id("Q42"));
        assert!(is_kb_id("P31"));
        assert!(!is_kb_id("Q42a"));
        assert!(!is_kb_id("human"));
        assert!(is_entity("Q5"));
        assert!(!is_entity("P5"));
    }

    #[tokio::test]
    async fn test_batch_labels_default() {
        let kb = InMemoryKnowledgeBase::new()
            .with_label("Q42", "Douglas Adams")
            .with_label("P31", "instance of");
        let ids = vec!["Q42".to_string(), "P31".to_string(), "x".to_string(), "Q42".to_string(), "Q1".to_string()];
        let labels = kb.get_labels_by_batch(&ids).await.unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels["Q42"].as_deref(), Some("Douglas Adams"));
        assert_eq!(labels["Q1"], None);
    }
}
