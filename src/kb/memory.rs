//! In-memory knowledge base
//!
//! Holds exactly the facts it is given; used for offline runs and tests.

use crate::kb::{KbResult, KnowledgeBase, HUMAN};
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct InMemoryKnowledgeBase {
    labels: HashMap<String, String>,
    alt_labels: HashMap<String, Vec<String>>,
    /// entity -> property -> values
    values: HashMap<String, HashMap<String, Vec<String>>>,
    /// class -> direct superclasses
    superclasses: HashMap<String, Vec<String>>,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, id: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(id.into(), label.into());
        self
    }

    pub fn with_alt_labels<I, S>(mut self, id: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alt_labels
            .entry(id.into())
            .or_default()
            .extend(labels.into_iter().map(Into::into));
        self
    }

    /// Record `entity property value`
    pub fn with_value(mut self, entity: impl Into<String>, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .entry(entity.into())
            .or_default()
            .entry(property.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Record `entity P31 class`
    pub fn with_instance_of(self, entity: impl Into<String>, class: impl Into<String>) -> Self {
        self.with_value(entity, "P31", class)
    }

    /// Record `class P279 superclass`
    pub fn with_subclass_of(mut self, class: impl Into<String>, superclass: impl Into<String>) -> Self {
        self.superclasses
            .entry(class.into())
            .or_default()
            .push(superclass.into());
        self
    }

    fn is_subclass(&self, class: &str, ancestor: &str) -> bool {
        let mut stack = vec![class];
        let mut seen = Vec::new();
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            if let Some(parents) = self.superclasses.get(current) {
                stack.extend(parents.iter().map(String::as_str));
            }
        }
        false
    }
}

#[async_trait]
impl KnowledgeBase for InMemoryKnowledgeBase {
    async fn get_label(&self, id: &str) -> KbResult<Option<String>> {
        Ok(self.labels.get(id).cloned())
    }

    async fn get_alt_labels(&self, id: &str) -> KbResult<Vec<String>> {
        Ok(self.alt_labels.get(id).cloned().unwrap_or_default())
    }

    /// Humans first, otherwise the first recorded class
    async fn get_domain(&self, id: &str) -> KbResult<Option<String>> {
        let domains = self.get_property_value(id, "P31").await?;
        if domains.iter().any(|d| d == HUMAN) {
            return Ok(Some(HUMAN.to_string()));
        }
        Ok(domains.into_iter().next())
    }

    async fn get_top_level_domain(&self, classes: &[String], candidates: &[String]) -> KbResult<Option<String>> {
        Ok(candidates
            .iter()
            .find(|candidate| classes.iter().any(|class| self.is_subclass(class, candidate)))
            .cloned())
    }

    async fn get_connected_property(&self, id: &str) -> KbResult<Vec<String>> {
        let mut properties: Vec<String> = self
            .values
            .get(id)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default();
        properties.sort();
        Ok(properties)
    }

    async fn get_property_value(&self, entity: &str, property: &str) -> KbResult<Vec<String>> {
        Ok(self
            .values
            .get(entity)
            .and_then(|props| props.get(property))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_entities_with_value(&self, property: &str, value: &str) -> KbResult<Vec<String>> {
        let mut entities: Vec<String> = self
            .values
            .iter()
            .filter(|(_, props)| props.get(property).is_some_and(|vs| vs.iter().any(|v| v == value)))
            .map(|(entity, _)| entity.clone())
            .collect();
        entities.sort();
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb() -> InMemoryKnowledgeBase {
        InMemoryKnowledgeBase::new()
            .with_instance_of("Q42", "Q5")
            .with_instance_of("Q42", "Q36180")
            .with_instance_of("Q60", "Q1093829")
            .with_subclass_of("Q1093829", "Q515")
            .with_subclass_of("Q515", "Q486972")
            .with_value("Q30", "P6", "Q6279")
    }

    #[tokio::test]
    async fn test_domain_prefers_human() {
        assert_eq!(kb().get_domain("Q42").await.unwrap(), Some("Q5".to_string()));
        assert_eq!(kb().get_domain("Q60").await.unwrap(), Some("Q1093829".to_string()));
        assert_eq!(kb().get_domain("Q1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_top_level_domain_follows_subclass_chain() {
        let candidates = vec!["Q5".to_string(), "Q486972".to_string()];
        let found = kb()
            .get_top_level_domain(&["Q1093829".to_string()], &candidates)
            .await
            .unwrap();
        assert_eq!(found, Some("Q486972".to_string()));
        let none = kb().get_top_level_domain(&["Q7".to_string()], &candidates).await.unwrap();
        assert_eq!(none, None);
    }

    #[tokio::test]
    async fn test_reverse_lookup() {
        let kb = kb();
        assert_eq!(kb.get_entities_with_value("P6", "Q6279").await.unwrap(), vec!["Q30".to_string()]);
        assert_eq!(kb.get_connected_property("Q42").await.unwrap(), vec!["P31".to_string()]);
    }
}
