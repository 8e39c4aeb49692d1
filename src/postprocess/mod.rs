//! Rewrites applied to converter output
//!
//! Date bounds spanning a single year become a point in time, and concrete
//! properties are abstracted when the utterance does not ask for them.

pub mod abstraction;
pub mod date_range;

pub use abstraction::{AbstractionRenamer, AbstractionTable};
pub use date_range::DateRangeFolder;

use crate::config::AbstractProperties;
use crate::kb::{KbResult, KnowledgeBase};
use crate::text::tokenize;
use crate::thingtalk::{Expression, VisitorMut};
use tracing::info;

pub struct PostProcessor {
    table: AbstractionTable,
    device: String,
}

impl PostProcessor {
    /// Resolve the abstract-property names once; the processor is then
    /// shared by every conversion
    pub async fn load(
        kb: &dyn KnowledgeBase,
        abstract_properties: &AbstractProperties,
        device: impl Into<String>,
    ) -> KbResult<Self> {
        let table = AbstractionTable::load(kb, abstract_properties).await?;
        info!("Post-processor ready ({} abstraction groups)", abstract_properties.iter().count());
        Ok(Self {
            table,
            device: device.into(),
        })
    }

    pub fn post_process(&self, utterance: &str, mut expression: Expression) -> Expression {
        let utterance = tokenize(utterance);
        DateRangeFolder.visit_expression(&mut expression);
        if !self.table.is_empty() {
            AbstractionRenamer::new(&self.table, &utterance, &self.device).visit_expression(&mut expression);
        }
        expression.optimize()
    }
}
