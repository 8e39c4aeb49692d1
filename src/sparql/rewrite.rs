//! Structural simplifications applied before conversion
//!
//! Unions that only spell out a subclass closure (or the US state /
//! federal district pair) collapse to one triple, and property paths whose
//! closure adds nothing a question would distinguish are flattened.

use crate::config::AbstractProperties;
use crate::sparql::ast::*;
use crate::sparql::namespace::{
    ENTITY_PREFIX, PROPERTY_PREDICATE_PREFIX, PROPERTY_PREFIX, PROPERTY_QUALIFIER_PREFIX,
    PROPERTY_STATEMENT_PREFIX,
};
use oxrdf::NamedNode;

const US_STATE: &str = "Q107390";
const FEDERAL_DISTRICT: &str = "Q475050";

fn is_direct(iri: Option<&str>, pid: &str) -> bool {
    iri.and_then(|iri| iri.strip_prefix(PROPERTY_PREFIX))
        .is_some_and(|id| id == pid)
}

fn is_property(path: &PropertyPath, pid: &str) -> bool {
    is_direct(path.as_iri(), pid)
}

fn is_verb_property(verb: &Verb, pid: &str) -> bool {
    is_direct(verb.as_iri(), pid)
}

fn is_entity(term: &Term, qid: &str) -> bool {
    term.as_iri()
        .and_then(|iri| iri.strip_prefix(ENTITY_PREFIX))
        .is_some_and(|id| id == qid)
}

/// `P279*`
fn is_subclass_closure(path: &PropertyPath) -> bool {
    matches!(path, PropertyPath::ZeroOrMore(inner) if is_property(inner, "P279"))
}

/// `P31` or `P31/P279*`
fn is_instance_of(verb: &Verb) -> bool {
    if is_verb_property(verb, "P31") {
        return true;
    }
    match verb {
        Verb::Path(PropertyPath::Sequence(items)) => {
            items.len() == 2 && is_property(&items[0], "P31") && is_subclass_closure(&items[1])
        }
        _ => false,
    }
}

/// The only triple of a branch made of a single one-triple BGP
fn single_triple(branch: &[GraphPattern]) -> Option<&Triple> {
    match branch {
        [GraphPattern::Bgp(triples)] if triples.len() == 1 => triples.first(),
        _ => None,
    }
}

/// `{ ?s P31/P279* Q107390 } UNION { ?s P31/P279* Q475050 }` -> the state triple
fn us_state_union(branches: &[Vec<GraphPattern>]) -> Option<Triple> {
    if branches.len() != 2 {
        return None;
    }
    let mut state = None;
    let mut district = None;
    for branch in branches {
        let triple = single_triple(branch)?;
        if is_instance_of(&triple.predicate) {
            if is_entity(&triple.object, US_STATE) {
                state = Some(triple);
            } else if is_entity(&triple.object, FEDERAL_DISTRICT) {
                district = Some(triple);
            }
        }
    }
    match (state, district) {
        (Some(state), Some(district)) if state.subject == district.subject => Some(state.clone()),
        _ => None,
    }
}

/// A union that is equivalent, for question answering, to one of its triples
///
/// Besides the US state case this covers `{ ?s p ?o } UNION { ?s p/P17 ?o }`
/// and `{ ?s P31 ?o } UNION { ?s P31/P279* ?o }`, both of which keep the
/// first branch.
pub fn special_union(branches: &[Vec<GraphPattern>]) -> Option<Triple> {
    if let Some(triple) = us_state_union(branches) {
        return Some(triple);
    }
    if branches.len() != 2 {
        return None;
    }
    let first = single_triple(&branches[0])?;
    let second = single_triple(&branches[1])?;
    if first.subject != second.subject || first.object != second.object {
        return None;
    }
    let first_iri = match &first.predicate {
        Verb::Term(Term::Iri(iri)) => iri,
        _ => return None,
    };
    let items = match &second.predicate {
        Verb::Path(PropertyPath::Sequence(items)) if items.len() == 2 => items,
        _ => return None,
    };
    if items[0].as_iri() != Some(first_iri.as_str()) {
        return None;
    }
    if is_property(&items[1], "P17") || is_subclass_closure(&items[1]) {
        return Some(first.clone());
    }
    None
}

/// Flatten closures a question would not distinguish
///
/// - `P31/P279*` -> `P31` (applied inside longer sequences too)
/// - `P131+` -> `P131`
/// - `a|b|c` where every member belongs to one abstract-property group,
///   under the same prefix family -> the abstract property
pub fn simplify_path(path: PropertyPath, abstract_properties: &AbstractProperties) -> PropertyPath {
    match path {
        PropertyPath::Sequence(mut items) => {
            if items.len() == 2 && is_property(&items[0], "P31") && is_subclass_closure(&items[1]) {
                items.truncate(1);
                return items.remove(0);
            }
            PropertyPath::Sequence(
                items
                    .into_iter()
                    .map(|item| simplify_path(item, abstract_properties))
                    .collect(),
            )
        }
        PropertyPath::OneOrMore(inner) if is_property(&inner, "P131") => *inner,
        PropertyPath::Alternative(items) => match collapse_alternative(&items, abstract_properties) {
            Some(iri) => PropertyPath::Iri(iri),
            None => PropertyPath::Alternative(items),
        },
        other => other,
    }
}

fn collapse_alternative(items: &[PropertyPath], abstract_properties: &AbstractProperties) -> Option<NamedNode> {
    for prefix in [
        PROPERTY_PREFIX,
        PROPERTY_STATEMENT_PREFIX,
        PROPERTY_QUALIFIER_PREFIX,
        PROPERTY_PREDICATE_PREFIX,
    ] {
        let ids: Option<Vec<&str>> = items
            .iter()
            .map(|item| item.as_iri().and_then(|iri| iri.strip_prefix(prefix)))
            .map(|id| id.filter(|id| !id.contains('/')))
            .collect();
        let Some(ids) = ids else { continue };
        if let Some(abstract_property) = abstract_properties.covering(ids.iter().copied()) {
            return NamedNode::new(format!("{}{}", prefix, abstract_property)).ok();
        }
    }
    None
}

fn simplify_verb(verb: Verb, abstract_properties: &AbstractProperties) -> Verb {
    match verb {
        Verb::Path(path) => match simplify_path(path, abstract_properties) {
            PropertyPath::Iri(iri) => Verb::Term(Term::Iri(iri)),
            path => Verb::Path(path),
        },
        term => term,
    }
}

fn simplify_triple(triple: Triple, abstract_properties: &AbstractProperties) -> Triple {
    Triple {
        predicate: simplify_verb(triple.predicate, abstract_properties),
        ..triple
    }
}

fn simplify_patterns(patterns: Vec<GraphPattern>, abstract_properties: &AbstractProperties) -> Vec<GraphPattern> {
    patterns
        .into_iter()
        .map(|pattern| simplify_pattern(pattern, abstract_properties))
        .collect()
}

fn simplify_pattern(pattern: GraphPattern, abstract_properties: &AbstractProperties) -> GraphPattern {
    match pattern {
        GraphPattern::Bgp(triples) => GraphPattern::Bgp(
            triples
                .into_iter()
                .map(|t| simplify_triple(t, abstract_properties))
                .collect(),
        ),
        GraphPattern::Union(branches) => match special_union(&branches) {
            Some(triple) => GraphPattern::Bgp(vec![simplify_triple(triple, abstract_properties)]),
            None => GraphPattern::Union(
                branches
                    .into_iter()
                    .map(|branch| simplify_patterns(branch, abstract_properties))
                    .collect(),
            ),
        },
        GraphPattern::Group(inner) => GraphPattern::Group(simplify_patterns(inner, abstract_properties)),
        GraphPattern::Optional(inner) => GraphPattern::Optional(simplify_patterns(inner, abstract_properties)),
        GraphPattern::Minus(inner) => GraphPattern::Minus(simplify_patterns(inner, abstract_properties)),
        GraphPattern::Service { name, silent, patterns } => GraphPattern::Service {
            name,
            silent,
            patterns: simplify_patterns(patterns, abstract_properties),
        },
        other => other,
    }
}

/// Apply the union and path simplifications to the whole WHERE clause
pub fn preprocess(query: Query, abstract_properties: &AbstractProperties) -> Query {
    Query {
        where_clause: simplify_patterns(query.where_clause, abstract_properties),
        ..query
    }
}
