//! SPARQL to ThingTalk conversion
//!
//! A conversion runs in stages over one [`ConversionContext`]:
//!
//! 1. the WHERE clause is split into triples, unions and filters; each
//!    triple registers a table for its subject and adds projections or
//!    filters to it
//! 2. reified statements collected on the way are folded into filters
//! 3. GROUP BY / HAVING becomes a count filter on the grouped table
//! 4. the generator picks a main table, turns the other tables into
//!    subqueries, and wraps the result in projections, sorting, slicing or
//!    a boolean question
//!
//! The context is created per call and dropped when it returns, so one
//! converter serves a sequence of queries without state leaking between
//! them. Callers such as the batch driver convert one query at a time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sparql2thingtalk::config::AbstractProperties;
//! use sparql2thingtalk::converter::{ConverterOptions, SparqlToThingTalkConverter};
//! use sparql2thingtalk::kb::InMemoryKnowledgeBase;
//! use sparql2thingtalk::schema::Schema;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema::load("schema.yaml")?;
//! let kb = InMemoryKnowledgeBase::new().with_label("Q42", "Douglas Adams");
//! let converter = SparqlToThingTalkConverter::new(
//!     Arc::new(schema),
//!     Arc::new(kb),
//!     Arc::new(AbstractProperties::default()),
//!     ConverterOptions::default(),
//! );
//! let program = converter
//!     .convert(
//!         "SELECT ?x WHERE { wd:Q42 wdt:P569 ?x . }",
//!         "when was douglas adams born",
//!     )
//!     .await?;
//! println!("{}", program.to_statement());
//! # Ok(())
//! # }
//! ```

pub mod filter;
pub mod generator;
pub mod group;
pub mod predicate;
pub mod query;
pub mod registry;
pub mod triple;
pub mod value;

pub use registry::{
    Aggregation, Comparison, FiltersBySubject, Predicate, Projection, Qualifier, Selection, Table,
    TableRegistry,
};

use crate::config::AbstractProperties;
use crate::kb::{KbError, KnowledgeBase};
use crate::schema::{Schema, SchemaError};
use crate::sparql::{self, ParseError};
use crate::text::{get_spans, tokenize};
use crate::thingtalk::{BooleanExpression, Expression};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Conversion errors
///
/// Every variant aborts the whole conversion; there are no partial results.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Knowledge base error: {0}")]
    Kb(#[from] KbError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Unsupported triple: {0}")]
    UnsupportedTriple(String),

    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("Unsupported clause: {0}")]
    UnsupportedClause(String),

    #[error("Unsupported aggregation: {0}")]
    UnsupportedAggregation(String),

    #[error("Union branches constrain different subjects")]
    MultipleSubjectsInUnion,

    #[error("Ordering on more than one variable is not supported")]
    MultipleOrdering,

    #[error("Grouping on more than one variable is not supported")]
    MultipleGrouping,

    #[error("Variable ?{0} is not bound by any table")]
    UnresolvedVariable(String),

    #[error("Property path not supported here: {0}")]
    PropertyPathNotSupported(String),

    #[error("No table qualifies as the main subject")]
    NoMainSubject,

    #[error("No selected variable resolves to a table or projection")]
    NoVariables,

    #[error("Failed to find matching span for entity {qid} ({label})")]
    UnresolvedEntityDisplay { qid: String, label: String },

    #[error("Unsupported value type: {0}")]
    UnsupportedValueType(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Statement is missing its table or property: {0}")]
    IncompletePredicate(String),

    #[error("Cannot join table {0} to the main subject")]
    SubqueryGeneration(String),
}

pub type ConversionResult<T> = Result<T, ConversionError>;

/// Per-converter switches
#[derive(Debug, Clone, Default)]
pub struct ConverterOptions {
    /// Emit entities without display strings and skip span matching
    pub exclude_entity_display: bool,
}

/// State of a single conversion
///
/// Created afresh for every query; stages read and extend it in order.
pub struct ConversionContext<'a> {
    pub(crate) schema: &'a Schema,
    pub(crate) kb: &'a dyn KnowledgeBase,
    pub(crate) options: &'a ConverterOptions,
    pub(crate) utterance: String,
    /// Token spans of the utterance, candidates for entity display strings
    pub(crate) keywords: Vec<String>,
    pub(crate) tables: TableRegistry,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) comparisons: Vec<Comparison>,
}

impl<'a> ConversionContext<'a> {
    pub fn new(
        schema: &'a Schema,
        kb: &'a dyn KnowledgeBase,
        options: &'a ConverterOptions,
        utterance: &str,
    ) -> Self {
        let utterance = tokenize(utterance);
        let keywords = get_spans(&utterance);
        Self {
            schema,
            kb,
            options,
            utterance,
            keywords,
            tables: TableRegistry::new(),
            predicates: Vec::new(),
            comparisons: Vec::new(),
        }
    }

    pub fn tables(&self) -> &TableRegistry {
        &self.tables
    }

    pub(crate) fn add_filter(&mut self, subject: &str, filter: BooleanExpression) {
        self.tables.add_filter(subject, filter);
    }

    pub(crate) fn add_projection(&mut self, subject: &str, projection: Projection) {
        self.tables.add_projection(subject, projection);
    }

    /// Narrow a subject to the table of a class, or to the class itself when
    /// the schema has no table for it
    pub(crate) fn set_domain(&mut self, subject: &str, qid: &str) {
        let name = self.schema.get_table(qid).unwrap_or(qid).to_string();
        self.tables.set_name(subject, name);
    }

    pub(crate) fn add_or_update_predicate(&mut self, update: Predicate) {
        registry::add_or_update_predicate(&mut self.predicates, update);
    }

    /// Property name for a direct-property IRI or a bare id
    pub(crate) fn property_name(&self, property: &str) -> ConversionResult<String> {
        let pid = sparql::namespace::local_id(property);
        self.schema
            .get_property(pid)
            .map(str::to_string)
            .ok_or_else(|| ConversionError::UnknownProperty(property.to_string()))
    }
}

/// Converts SPARQL queries over the knowledge base into ThingTalk
pub struct SparqlToThingTalkConverter {
    schema: Arc<Schema>,
    kb: Arc<dyn KnowledgeBase>,
    abstract_properties: Arc<AbstractProperties>,
    options: ConverterOptions,
}

impl SparqlToThingTalkConverter {
    pub fn new(
        schema: Arc<Schema>,
        kb: Arc<dyn KnowledgeBase>,
        abstract_properties: Arc<AbstractProperties>,
        options: ConverterOptions,
    ) -> Self {
        Self {
            schema,
            kb,
            abstract_properties,
            options,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn kb(&self) -> &Arc<dyn KnowledgeBase> {
        &self.kb
    }

    /// Convert one query; `utterance` is the natural-language question it
    /// answers, used to pick entity display strings
    pub async fn convert(&self, sparql: &str, utterance: &str) -> ConversionResult<Expression> {
        debug!("Converting: {}", sparql);
        let query = sparql::parse_query(sparql)?;
        let query = sparql::preprocess(query, &self.abstract_properties);

        let mut context = ConversionContext::new(&self.schema, self.kb.as_ref(), &self.options, utterance);
        context.parse_query(&query).await?;
        let expression = context.generate(&query).await?;
        info!("Converted into {} table(s): {}", context.tables.len(), expression);
        Ok(expression)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::kb::InMemoryKnowledgeBase;
    use crate::schema::Schema;

    pub const SCHEMA: &str = r#"
domains:
  - name: human
    subject: Q5
    properties:
      - name: date_of_birth
        id: P569
        type: Date
      - name: place_of_birth
        id: P19
        type: Entity(wd:p_place_of_birth)
      - name: occupation
        id: P106
        type: Array(Entity(wd:p_occupation))
      - name: award_received
        id: P166
        type: Array(Entity(wd:p_award_received))
      - name: position_held
        id: P39
        type: "Array(Compound(value: Entity(wd:p_position_held), start_time: Date, end_time: Date, point_in_time: Date))"
      - name: country_of_citizenship
        id: P27
        type: Array(Entity(wd:p_country_of_citizenship))
      - name: height
        id: P2048
        type: Measure(m)
      - name: spouse
        id: P26
        type: Array(Entity(wd:human))
  - name: country
    subject: Q6256
    properties:
      - name: population
        id: P1082
        type: Number
      - name: capital
        id: P36
        type: Array(Entity(wd:p_capital))
      - name: head_of_government
        id: P6
        type: Array(Entity(wd:human))
      - name: head_of_state
        id: P35
        type: Array(Entity(wd:human))
  - name: entity
    subject: Q35120
    properties:
      - name: country
        id: P17
        type: Array(Entity(wd:p_country))
      - name: located_in_the_administrative_territorial_entity
        id: P131
        type: Array(Entity(wd:p_located_in_the_administrative_territorial_entity))
      - name: subclass_of
        id: P279
        type: Array(Entity(wd:entity))
      - name: inception
        id: P571
        type: Date
      - name: start_time
        id: P580
        type: Date
      - name: end_time
        id: P582
        type: Date
      - name: point_in_time
        id: P585
        type: Date
"#;

    pub fn schema() -> Schema {
        Schema::from_yaml_str(SCHEMA).unwrap()
    }

    pub fn kb() -> InMemoryKnowledgeBase {
        InMemoryKnowledgeBase::new()
            .with_label("Q5", "human")
            .with_label("Q6256", "country")
            .with_label("Q35120", "entity")
            .with_label("Q42", "Douglas Adams")
            .with_instance_of("Q42", "Q5")
            .with_label("Q76", "Barack Obama")
            .with_alt_labels("Q76", ["Obama"])
            .with_instance_of("Q76", "Q5")
            .with_label("Q30", "United States of America")
            .with_alt_labels("Q30", ["USA", "America"])
            .with_instance_of("Q30", "Q6256")
            .with_label("Q183", "Germany")
            .with_instance_of("Q183", "Q6256")
            .with_label("Q11696", "President of the United States")
            .with_label("Q36180", "writer")
            .with_label("Q33999", "actor")
            .with_label("Q515", "city")
            .with_subclass_of("Q515", "Q35120")
            .with_label("Q1093829", "city of the United States")
            .with_subclass_of("Q1093829", "Q515")
            .with_label("Q60", "New York City")
            .with_instance_of("Q60", "Q1093829")
            .with_label("Q38104", "Nobel Prize in Physics")
            .with_label("Q3624078", "sovereign state")
            .with_subclass_of("Q3624078", "Q6256")
    }
}
