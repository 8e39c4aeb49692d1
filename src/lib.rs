//! sparql2thingtalk
//!
//! Converts SPARQL questions over Wikidata into single-table ThingTalk
//! programs.
//!
//! # Architecture
//!
//! - `sparql`: clause-preserving query tree, pest grammar, normalization and
//!   structural rewrites
//! - `schema`: domains, properties and their value types
//! - `kb`: knowledge-base lookups (Wikidata over HTTP, RocksDB cache,
//!   in-memory fixture)
//! - `converter`: staged conversion into per-subject tables, then generation
//!   of one ThingTalk expression
//! - `thingtalk`: target expression tree, visitor, rendering, simplification
//! - `postprocess`: date-range folding and abstract property renaming
//! - `patterns`, `preprocessor`: shortcut templates and rule-based rewrites
//!   consulted around the converter
//!
//! ## Example Usage
//!
//! ```rust
//! use sparql2thingtalk::thingtalk::{BooleanExpression, Expression, Operator, Value};
//!
//! let program = Expression::invocation("wd", "human")
//!     .filter(BooleanExpression::atom(
//!         "id",
//!         Operator::Equal,
//!         Value::Entity {
//!             value: "Q42".to_string(),
//!             entity_type: "wd:human".to_string(),
//!             display: None,
//!         },
//!     ))
//!     .project(&["date_of_birth"]);
//!
//! assert_eq!(
//!     program.to_statement(),
//!     "[ date_of_birth ] of @wd . human ( ) filter id == \" Q42 \" ^^wd:human ;"
//! );
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod converter;
pub mod kb;
pub mod patterns;
pub mod postprocess;
pub mod preprocessor;
pub mod schema;
pub mod sparql;
pub mod text;
pub mod thingtalk;
pub mod virtual_property;

// Re-export main types for convenience
pub use config::{AbstractProperties, ConfigError, ConfigResult, ConverterConfig, RankedProperties};

pub use converter::{ConversionError, ConversionResult, ConverterOptions, SparqlToThingTalkConverter};

pub use kb::{InMemoryKnowledgeBase, KbError, KbResult, KnowledgeBase, RequestCache, WikidataClient};

pub use patterns::{PatternConverter, PatternError, PatternResult};

pub use postprocess::PostProcessor;

pub use preprocessor::{CodeKind, RuleBasedPreprocessor};

pub use schema::{Schema, SchemaError, SchemaResult, ValueType};

pub use sparql::{parse_query, ParseError, ParseResult, Query};

pub use thingtalk::{BooleanExpression, Expression, Value};

pub use virtual_property::VirtualPropertyGenerator;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
