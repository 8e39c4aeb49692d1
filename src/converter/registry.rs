//! Per-conversion state
//!
//! Tables are keyed by the query variable (or entity IRI) they describe and
//! are only changed through the update methods below: append a filter,
//! append a projection, rename.

use crate::schema::GENERIC_DOMAIN;
use crate::sparql::ComparisonOp;
use crate::thingtalk::{AggregationOp, BooleanExpression, Operator, ProjectionTarget};
use indexmap::IndexMap;

/// A property the table yields, optionally bound to a query variable
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub property: ProjectionTarget,
    pub variable: Option<String>,
    /// Entity type annotation, filled in when another table collapses into this one
    pub entity_type: Option<String>,
}

impl Projection {
    pub fn new(property: ProjectionTarget, variable: impl Into<String>) -> Self {
        Self {
            property,
            variable: Some(variable.into()),
            entity_type: None,
        }
    }

    pub fn property(name: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::new(ProjectionTarget::Property(name.into()), variable)
    }

    pub fn binds(&self, variable: &str) -> bool {
        self.variable.as_deref() == Some(variable)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub operator: AggregationOp,
    /// Subject being counted, or the aggregated property
    pub variable: String,
}

/// One selected output of a subject
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Projection(Projection),
    Aggregation(Aggregation),
}

/// Deferred comparison between variables bound in two tables
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub lhs: String,
    pub operator: Operator,
    pub rhs: String,
}

impl Comparison {
    pub fn involves(&self, variable: &str) -> bool {
        self.lhs == variable || self.rhs == variable
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Qualifier {
    pub property: String,
    pub operator: ComparisonOp,
    pub value: String,
    pub is_variable: bool,
}

/// A reified statement assembled from its `p:`, `ps:` and `pq:` triples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub table: Option<String>,
    pub property: Option<String>,
    pub operator: Option<ComparisonOp>,
    pub is_variable: bool,
    pub value: Option<String>,
    pub predicate_variable: Option<String>,
    pub qualifiers: Vec<Qualifier>,
}

impl Predicate {
    fn matches(&self, update: &Predicate) -> bool {
        match (&self.predicate_variable, &update.predicate_variable) {
            (Some(a), Some(b)) if a == b => true,
            (Some(_), Some(_)) => false,
            _ => self.property.is_some() && self.property == update.property,
        }
    }

    /// Fold a partial update in; set fields overwrite, qualifiers accumulate
    pub fn merge(&mut self, update: Predicate) {
        for qualifier in update.qualifiers {
            if !self.qualifiers.contains(&qualifier) {
                self.qualifiers.push(qualifier);
            }
        }
        if update.table.is_some() {
            self.table = update.table;
        }
        if update.property.is_some() {
            self.property = update.property;
        }
        if update.value.is_some() {
            self.value = update.value;
        }
        if update.predicate_variable.is_some() {
            self.predicate_variable = update.predicate_variable;
        }
        if update.operator.is_some() {
            self.operator = update.operator;
        }
        if update.is_variable {
            self.is_variable = true;
        }
    }
}

/// Add a partial predicate, merging it into the first one it matches
pub fn add_or_update_predicate(predicates: &mut Vec<Predicate>, update: Predicate) {
    match predicates.iter_mut().find(|p| p.matches(&update)) {
        Some(existing) => existing.merge(update),
        None => predicates.push(update),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub projections: Vec<Projection>,
    pub filters: Vec<BooleanExpression>,
}

impl Table {
    fn new() -> Self {
        Self {
            name: GENERIC_DOMAIN.to_string(),
            projections: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn projection_of(&self, variable: &str) -> Option<&Projection> {
        self.projections.iter().find(|p| p.binds(variable))
    }

    /// Filter plus projection count
    pub fn complexity(&self) -> usize {
        self.filters.len() + self.projections.len()
    }
}

/// Subject -> table, in registration order
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: IndexMap<String, Table>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, subject: &str) -> &mut Table {
        self.tables.entry(subject.to_string()).or_insert_with(Table::new)
    }

    pub fn add_filter(&mut self, subject: &str, filter: BooleanExpression) {
        self.entry(subject).filters.push(filter);
    }

    /// Put a filter ahead of the existing ones
    pub fn prepend_filter(&mut self, subject: &str, filter: BooleanExpression) {
        self.entry(subject).filters.insert(0, filter);
    }

    pub fn add_projection(&mut self, subject: &str, projection: Projection) {
        self.entry(subject).projections.push(projection);
    }

    pub fn set_name(&mut self, subject: &str, name: impl Into<String>) {
        self.entry(subject).name = name.into();
    }

    pub fn filters_mut(&mut self, subject: &str) -> Option<&mut Vec<BooleanExpression>> {
        self.tables.get_mut(subject).map(|t| &mut t.filters)
    }

    /// Remove the projection bound to `variable`, returning it
    pub fn remove_projection(&mut self, subject: &str, variable: &str) -> Option<Projection> {
        let table = self.tables.get_mut(subject)?;
        let index = table.projections.iter().position(|p| p.binds(variable))?;
        Some(table.projections.remove(index))
    }

    pub fn remove_table(&mut self, subject: &str) -> Option<Table> {
        self.tables.shift_remove(subject)
    }

    pub fn get(&self, subject: &str) -> Option<&Table> {
        self.tables.get(subject)
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.tables.contains_key(subject)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn subjects(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Subject and projection binding `variable`, first match in registration order
    pub fn find_projection(&self, variable: &str) -> Option<(&str, &Projection)> {
        self.iter()
            .find_map(|(subject, table)| table.projection_of(variable).map(|p| (subject, p)))
    }
}

/// Filters grouped by the subject they constrain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FiltersBySubject(IndexMap<String, Vec<BooleanExpression>>);

impl FiltersBySubject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(subject: impl Into<String>, filter: BooleanExpression) -> Self {
        let mut collection = Self::new();
        collection.add(subject, filter);
        collection
    }

    pub fn add(&mut self, subject: impl Into<String>, filter: BooleanExpression) {
        self.0.entry(subject.into()).or_default().push(filter);
    }

    pub fn extend(&mut self, subject: impl Into<String>, filters: Vec<BooleanExpression>) {
        if !filters.is_empty() {
            self.0.entry(subject.into()).or_default().extend(filters);
        }
    }

    pub fn merge(&mut self, other: FiltersBySubject) {
        for (subject, filters) in other.0 {
            self.extend(subject, filters);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, subject: &str) -> Option<&[BooleanExpression]> {
        self.0.get(subject).map(|v| v.as_slice())
    }

    /// Replace each subject's filters with one combined expression
    pub fn combine<F>(self, combine: F) -> Self
    where
        F: Fn(Vec<BooleanExpression>) -> BooleanExpression,
    {
        Self(
            self.0
                .into_iter()
                .map(|(subject, filters)| (subject, vec![combine(filters)]))
                .collect(),
        )
    }
}

impl IntoIterator for FiltersBySubject {
    type Item = (String, Vec<BooleanExpression>);
    type IntoIter = indexmap::map::IntoIter<String, Vec<BooleanExpression>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thingtalk::Value;

    fn bridge() -> Predicate {
        Predicate {
            table: Some("x".to_string()),
            property: Some("position_held".to_string()),
            predicate_variable: Some("s".to_string()),
            ..Default::default()
        }
    }

    fn statement() -> Predicate {
        Predicate {
            property: Some("position_held".to_string()),
            predicate_variable: Some("s".to_string()),
            value: Some("http://www.wikidata.org/entity/Q11696".to_string()),
            ..Default::default()
        }
    }

    fn qualifier() -> Predicate {
        Predicate {
            predicate_variable: Some("s".to_string()),
            qualifiers: vec![Qualifier {
                property: "start_time".to_string(),
                operator: ComparisonOp::Equal,
                value: "t".to_string(),
                is_variable: true,
            }],
            ..Default::default()
        }
    }

    fn merged(order: Vec<Predicate>) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        for update in order {
            add_or_update_predicate(&mut predicates, update);
        }
        predicates
    }

    #[test]
    fn test_predicate_merge_is_order_independent() {
        let a = merged(vec![bridge(), statement(), qualifier()]);
        let b = merged(vec![qualifier(), statement(), bridge()]);
        let c = merged(vec![statement(), qualifier(), bridge()]);
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a[0].table.as_deref(), Some("x"));
        assert_eq!(a[0].qualifiers.len(), 1);
    }

    #[test]
    fn test_predicate_merge_is_idempotent() {
        let once = merged(vec![bridge(), statement(), qualifier()]);
        let twice = merged(vec![bridge(), statement(), qualifier(), qualifier(), bridge()]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_distinct_statements_stay_apart() {
        let mut other = bridge();
        other.predicate_variable = Some("s2".to_string());
        let predicates = merged(vec![bridge(), other]);
        assert_eq!(predicates.len(), 2);
    }

    #[test]
    fn test_registry_updates() {
        let mut tables = TableRegistry::new();
        tables.add_projection("x", Projection::property("date_of_birth", "d"));
        tables.add_projection("x", Projection::property("country", "c"));
        assert_eq!(tables.get("x").unwrap().name, GENERIC_DOMAIN);

        tables.set_name("x", "human");
        tables.add_filter("x", BooleanExpression::atom("id", Operator::Equal, Value::Null));
        let removed = tables.remove_projection("x", "d").unwrap();
        assert_eq!(removed.property, ProjectionTarget::Property("date_of_birth".to_string()));

        let table = tables.get("x").unwrap();
        assert_eq!(table.name, "human");
        assert_eq!(table.projections.len(), 1);
        assert_eq!(table.complexity(), 2);
        assert_eq!(tables.find_projection("c").map(|(s, _)| s), Some("x"));
    }

    #[test]
    fn test_filters_by_subject_merge_and_combine() {
        let atom = |n: &str| BooleanExpression::atom(n, Operator::Equal, Value::Null);
        let mut a = FiltersBySubject::single("x", atom("a"));
        let mut b = FiltersBySubject::single("y", atom("b"));
        b.add("x", atom("c"));
        a.merge(b);
        assert_eq!(a.get("x").unwrap().len(), 2);

        let combined = a.combine(BooleanExpression::or);
        assert_eq!(
            combined.get("x").unwrap(),
            &[BooleanExpression::Or(vec![atom("a"), atom("c")])]
        );
        assert_eq!(combined.get("y").unwrap(), &[atom("b")]);
    }
}
