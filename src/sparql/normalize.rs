//! Textual normalization of query strings
//!
//! Brings queries written with or without the well-known prefix
//! declarations to one canonical text so that template lookups and
//! regular-expression rules can compare them.

use crate::sparql::namespace::{
    ENTITY_PREFIX, PROPERTY_PREDICATE_PREFIX, PROPERTY_PREFIX, PROPERTY_QUALIFIER_PREFIX,
    PROPERTY_STATEMENT_PREFIX, RDFS_LABEL,
};
use regex::{Captures, Regex};
use std::sync::LazyLock;

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";

static PREFIX_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)PREFIX\s+([A-Za-z]*)\s*:\s*<([^>]*)>").unwrap());

static PREFIXED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(wdt|wd|pq|ps|p):([PQ][0-9]+)\b").unwrap());

static XSD_DATE_TIME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bxsd:dateTime\b").unwrap());

static RDFS_LABEL_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\brdfs:label\b").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn namespace(prefix: &str) -> Option<&'static str> {
    match prefix {
        "wd" => Some(ENTITY_PREFIX),
        "wdt" => Some(PROPERTY_PREFIX),
        "p" => Some(PROPERTY_PREDICATE_PREFIX),
        "pq" => Some(PROPERTY_QUALIFIER_PREFIX),
        "ps" => Some(PROPERTY_STATEMENT_PREFIX),
        "xsd" => Some(XSD),
        "rdfs" => Some(RDFS),
        _ => None,
    }
}

/// Canonical form of a query string
///
/// Declarations of the well-known prefixes are dropped (others are kept),
/// `wd:Q42`-style names are expanded to `<...>` IRIs, and whitespace runs
/// collapse to a single space.
pub fn normalize(sparql: &str) -> String {
    let stripped = PREFIX_DECL.replace_all(sparql, |caps: &Captures| match namespace(&caps[1]) {
        Some(ns) if ns == &caps[2] => String::new(),
        _ => caps[0].to_string(),
    });

    let expanded = PREFIXED_ID.replace_all(&stripped, |caps: &Captures| match namespace(&caps[1]) {
        Some(ns) => format!("<{}{}>", ns, &caps[2]),
        None => caps[0].to_string(),
    });

    let expanded = XSD_DATE_TIME.replace_all(&expanded, format!("<{}dateTime>", XSD).as_str());
    let expanded = RDFS_LABEL_NAME.replace_all(&expanded, format!("<{}>", RDFS_LABEL).as_str());

    WHITESPACE.replace_all(&expanded, " ").trim().to_string()
}
