//! Abstract property renaming
//!
//! Properties such as `place_of_birth` or `residence` are replaced by the
//! abstract property of their group (`location`) unless the utterance names
//! the concrete property, either through one of its labels or through a word
//! that only makes sense for the concrete reading.

use crate::config::{AbstractProperties, AbstractionKind};
use crate::kb::{KbResult, KnowledgeBase};
use crate::text::clean_name;
use crate::thingtalk::visitor::{walk_boolean_expression, walk_projection_element, walk_value, VisitorMut};
use crate::thingtalk::{BooleanExpression, ProjectionElement, ProjectionTarget, PropertyPathElement, Value};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Labels too vague to signal the concrete property
const GENERIC_WORDS: [&str; 2] = ["in", "locality"];

static CONCRETE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(live|lives|county|counties|country|countries|city|cities|map|from|grew up|end|ends|ended|ending|stops|stopped|voice|voices|voiced)\b",
    )
    .unwrap()
});

fn word_pattern(label: &str) -> Option<Regex> {
    match Regex::new(&format!(r"\b{}\b", regex::escape(label))) {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            warn!("Skipping label {:?}: {}", label, e);
            None
        }
    }
}

/// Abstract property names and the concrete properties they stand for,
/// with the label patterns that keep a concrete property as is
#[derive(Debug, Clone, Default)]
pub struct AbstractionTable {
    groups: IndexMap<String, Vec<String>>,
    labels: IndexMap<String, Vec<Regex>>,
}

impl AbstractionTable {
    /// Resolve the property ids of every `any` group to property names
    pub async fn load(kb: &dyn KnowledgeBase, abstract_properties: &AbstractProperties) -> KbResult<Self> {
        let mut table = Self::default();
        for (id, abstraction) in abstract_properties.iter() {
            if abstraction.kind != AbstractionKind::Any {
                continue;
            }
            let Some(label) = kb.get_label(id).await? else {
                debug!("No label for abstract property {}", id);
                continue;
            };
            let mut members = Vec::new();
            for member in &abstraction.properties {
                let Some(label) = kb.get_label(member).await? else {
                    continue;
                };
                let name = clean_name(&label);
                if !table.labels.contains_key(&name) {
                    let mut labels = vec![label.to_lowercase()];
                    labels.extend(
                        kb.get_alt_labels(member)
                            .await?
                            .into_iter()
                            .map(|l| l.to_lowercase())
                            .filter(|l| !GENERIC_WORDS.contains(&l.as_str())),
                    );
                    let patterns = labels.iter().filter_map(|l| word_pattern(l)).collect();
                    table.labels.insert(name.clone(), patterns);
                }
                members.push(name);
            }
            table.groups.insert(clean_name(&label), members);
        }
        Ok(table)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The abstract name replacing `property` in the context of `utterance`
    pub fn abstract_property(&self, property: &str, utterance: &str) -> Option<&str> {
        for (abstract_property, members) in &self.groups {
            if abstract_property == property || !members.iter().any(|m| m == property) {
                continue;
            }
            let named = self
                .labels
                .get(property)
                .is_some_and(|patterns| patterns.iter().any(|p| p.is_match(utterance)));
            if named || CONCRETE_WORDS.is_match(utterance) {
                continue;
            }
            return Some(abstract_property);
        }
        None
    }
}

/// Renames property references throughout an expression
pub struct AbstractionRenamer<'t> {
    table: &'t AbstractionTable,
    utterance: &'t str,
    device: &'t str,
}

impl<'t> AbstractionRenamer<'t> {
    pub fn new(table: &'t AbstractionTable, utterance: &'t str, device: &'t str) -> Self {
        Self {
            table,
            utterance,
            device,
        }
    }

    fn rename(&self, property: &mut String) -> bool {
        let Some(renamed) = self.table.abstract_property(property, self.utterance) else {
            return false;
        };
        debug!("Abstracting {} into {}", property, renamed);
        *property = renamed.to_string();
        true
    }
}

impl VisitorMut for AbstractionRenamer<'_> {
    fn visit_boolean_expression(&mut self, filter: &mut BooleanExpression) {
        if let BooleanExpression::Atom { name, value, .. } = filter {
            // continents and countries are clear enough as they are
            if name.as_str() != "continent" && !name.starts_with("country") && self.rename(name) {
                if let Value::Entity { entity_type, .. } = value {
                    let concrete = format!("{}:p_", self.device);
                    if entity_type.starts_with(&concrete) {
                        *entity_type = format!("{}{}", concrete, name);
                    }
                }
            }
        }
        walk_boolean_expression(self, filter);
    }

    fn visit_value(&mut self, value: &mut Value) {
        if let Value::VarRef(name) = value {
            self.rename(name);
        }
        walk_value(self, value);
    }

    fn visit_projection_element(&mut self, element: &mut ProjectionElement) {
        if let ProjectionTarget::Property(name) = &mut element.target {
            self.rename(name);
        }
        walk_projection_element(self, element);
    }

    fn visit_property_path_element(&mut self, element: &mut PropertyPathElement) {
        self.rename(&mut element.property);
    }
}
