//! Virtual properties
//!
//! A virtual property such as "location" has no value of its own; for a
//! given entity it stands for whichever concrete properties the entity
//! has, in the preference order of a ranked label list.

use crate::config::RankedProperties;
use crate::kb::{KbResult, KnowledgeBase};
use std::sync::Arc;
use tracing::warn;

pub struct VirtualPropertyGenerator {
    kb: Arc<dyn KnowledgeBase>,
    ranked: Arc<RankedProperties>,
}

impl VirtualPropertyGenerator {
    pub fn new(kb: Arc<dyn KnowledgeBase>, ranked: Arc<RankedProperties>) -> Self {
        Self { kb, ranked }
    }

    /// Labels of the properties `entity` has that rank for `property`, best first
    pub async fn properties_for(&self, entity: &str, property: &str) -> KbResult<Vec<String>> {
        let Some(ranking) = self.ranked.get(property) else {
            warn!("No ranking for virtual property {}", property);
            return Ok(Vec::new());
        };
        let connected = self.kb.get_connected_property(entity).await?;
        let labels = self.kb.get_labels_by_batch(&connected).await?;

        let mut ranked: Vec<(usize, String)> = labels
            .into_values()
            .flatten()
            .filter_map(|label| ranking.iter().position(|r| *r == label).map(|rank| (rank, label)))
            .collect();
        ranked.sort_by_key(|(rank, _)| *rank);
        ranked.dedup();
        Ok(ranked.into_iter().map(|(_, label)| label).collect())
    }
}
