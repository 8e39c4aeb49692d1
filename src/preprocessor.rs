//! Rule-based rewrites
//!
//! "Who was the president of X in 2009" is asked of the country
//! (`head_of_government` qualified by a point in time) but recorded on the
//! person (`position_held` of the office). The rewrite goes through the
//! office the country's head holds, looked up in the knowledge base, and
//! works in both directions.

use crate::kb::{KbResult, KnowledgeBase};
use crate::sparql::namespace::{ENTITY_PREFIX, PROPERTY_PREDICATE_PREFIX, PROPERTY_STATEMENT_PREFIX};
use crate::sparql::normalize;
use regex::{NoExpand, Regex};
use std::sync::Arc;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Office held by the head of government / head of state, and the property
/// pointing from the country to that person
const OFFICES: [(&str, &str); 2] = [("P1313", "P6"), ("P1906", "P35")];

static THINGTALK_LEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\[ (head_of_government|head_of_state) filter (?:\( )?point_in_time == new Date \( ([0-9]+) \)(?: \))? \] of @wd \. (?:country|entity) \( \) filter id == " (Q[0-9]+) ""#,
    )
    .unwrap()
});

static POSITION_HELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\?([xyz]) <http://www\.wikidata\.org/prop/P39> \?([pq])").unwrap()
});

/// Which representation a piece of code is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    ThingTalk,
    Sparql,
}

pub struct RuleBasedPreprocessor {
    kb: Arc<dyn KnowledgeBase>,
}

impl RuleBasedPreprocessor {
    pub fn new(kb: Arc<dyn KnowledgeBase>) -> Self {
        Self { kb }
    }

    /// The rewritten code, or the input when no rule applies
    pub async fn preprocess(&self, code: &str, kind: CodeKind) -> KbResult<String> {
        let rewritten = match kind {
            CodeKind::ThingTalk => self.leader_from_thingtalk(code).await?,
            CodeKind::Sparql => self.leader_from_sparql(code).await?,
        };
        Ok(rewritten.unwrap_or_else(|| code.to_string()))
    }

    async fn leader_from_thingtalk(&self, code: &str) -> KbResult<Option<String>> {
        let Some(captures) = THINGTALK_LEADER.captures(code) else {
            return Ok(None);
        };
        let (year, country) = (&captures[2], &captures[3]);
        let office = if &captures[1] == "head_of_government" {
            OFFICES[0].0
        } else {
            OFFICES[1].0
        };
        let Some(position) = self.kb.get_property_value(country, office).await?.into_iter().next() else {
            warn!("Cannot find {} of {}", office, country);
            return Ok(None);
        };
        debug!("Rewriting {} of {} through {}", &captures[1], country, position);
        Ok(Some(format!(
            "@wd . entity ( ) filter contains ( position_held filter point_in_time == new Date ( {} ) , \" {} \" ^^wd:p_position_held ) ;",
            year, position
        )))
    }

    async fn leader_from_sparql(&self, code: &str) -> KbResult<Option<String>> {
        let normalized = normalize(code);
        let Some(captures) = POSITION_HELD.captures(&normalized) else {
            return Ok(None);
        };
        let (subject, statement) = (captures[1].to_string(), captures[2].to_string());

        let Ok(position_value) = Regex::new(&format!(
            r"\?{} <http://www\.wikidata\.org/prop/statement/P39> <http://www\.wikidata\.org/entity/(Q[0-9]+)>",
            statement
        )) else {
            return Ok(None);
        };
        let Some(position) = position_value.captures(&normalized).map(|c| c[1].to_string()) else {
            return Ok(None);
        };

        for (office, held_by) in OFFICES {
            let Some(country) = self.kb.get_entities_with_value(office, &position).await?.into_iter().next() else {
                continue;
            };
            debug!("Rewriting position {} as {} of {}", position, held_by, country);
            let rewritten = POSITION_HELD.replace(
                &normalized,
                NoExpand(&format!(
                    "<{}{}> <{}{}> ?{}",
                    ENTITY_PREFIX, country, PROPERTY_PREDICATE_PREFIX, held_by, statement
                )),
            );
            let rewritten = position_value.replace(
                &rewritten,
                NoExpand(&format!("?{} <{}{}> ?{}", statement, PROPERTY_STATEMENT_PREFIX, held_by, subject)),
            );
            return Ok(Some(rewritten.into_owned()));
        }
        Ok(None)
    }
}
