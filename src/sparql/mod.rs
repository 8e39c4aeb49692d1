//! Source query language
//!
//! Parses the SELECT/ASK subset of SPARQL 1.1 used against the knowledge
//! base into a clause-level tree, and provides the textual and structural
//! preprocessing applied before conversion.
//!
//! # Example
//!
//! ```rust
//! use sparql2thingtalk::sparql::{parse_query, GraphPattern};
//!
//! let query = parse_query("SELECT ?x WHERE { ?x wdt:P31 wd:Q5 . }").unwrap();
//! assert!(query.is_select());
//! assert!(matches!(query.where_clause[0], GraphPattern::Bgp(_)));
//! ```

pub mod ast;
pub mod namespace;
pub mod normalize;
pub mod parser;
pub mod rewrite;

pub use ast::{
    ComparisonOp, Expression, GraphPattern, OrderCondition, PropertyPath, Query, QueryForm,
    SelectItem, Term, Triple, Verb,
};
pub use namespace::{NamespaceManager, PrefixError, PrefixResult};
pub use normalize::normalize;
pub use parser::{parse_query, ParseError, ParseResult, QueryParser};
pub use rewrite::{preprocess, simplify_path, special_union};
