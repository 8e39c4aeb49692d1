//! SPARQL query parser using Pest
//!
//! Prefixed names are expanded while parsing; the knowledge-base prefixes
//! (`wd`, `wdt`, `p`, `ps`, `pq`, ...) are known even when undeclared.

use crate::sparql::ast::*;
use crate::sparql::namespace::NamespaceManager;
use oxrdf::vocab::{rdf, xsd};
use oxrdf::{BlankNode, Literal, NamedNode, Variable};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "sparql/sparql.pest"]
struct SparqlGrammar;

static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::comparison_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
});

/// Parser errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// Pest parsing error
    #[error("Parse error: {0}")]
    PestError(#[from] Box<pest::error::Error<Rule>>),

    /// Semantic error
    #[error("Semantic error: {0}")]
    SemanticError(String),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Malformed IRI, variable or literal
    #[error("Invalid term: {0}")]
    InvalidTerm(String),
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        ParseError::PestError(Box::new(e))
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

fn missing(what: &str) -> ParseError {
    ParseError::SemanticError(format!("Missing {}", what))
}

/// Parse a query string
pub fn parse_query(input: &str) -> ParseResult<Query> {
    QueryParser::new().parse(input)
}

/// Stateful parser carrying the prefixes declared so far
pub struct QueryParser {
    namespaces: NamespaceManager,
}

impl QueryParser {
    pub fn new() -> Self {
        Self {
            namespaces: NamespaceManager::new(),
        }
    }

    pub fn parse(mut self, input: &str) -> ParseResult<Query> {
        let root = SparqlGrammar::parse(Rule::query, input)?
            .next()
            .ok_or_else(|| missing("query"))?;

        let mut prefixes = indexmap::IndexMap::new();
        let mut query = None;
        for inner in root.into_inner() {
            match inner.as_rule() {
                Rule::prefix_decl => {
                    let mut parts = inner.into_inner();
                    let ns = parts.next().ok_or_else(|| missing("prefix"))?;
                    let iri = parts.next().ok_or_else(|| missing("prefix IRI"))?;
                    let prefix = ns.as_str().trim_end_matches(':').to_string();
                    let iri = iri_ref_value(iri)?;
                    self.namespaces.add_prefix(prefix.clone(), iri.clone());
                    prefixes.insert(prefix, iri);
                }
                Rule::base_decl => {
                    return Err(ParseError::UnsupportedFeature("BASE".to_string()));
                }
                Rule::select_query => query = Some(self.parse_select(inner)?),
                Rule::ask_query => query = Some(self.parse_ask(inner)?),
                Rule::EOI => break,
                _ => {}
            }
        }

        let mut query = query.ok_or_else(|| missing("query form"))?;
        query.prefixes = prefixes;
        Ok(query)
    }

    fn parse_select(&self, pair: Pair<Rule>) -> ParseResult<Query> {
        let mut query = Query::new(QueryForm::Select);
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::select_clause => self.parse_select_clause(inner, &mut query)?,
                Rule::group_graph_pattern => query.where_clause = self.parse_group(inner)?,
                _ => self.parse_solution_modifier(inner, &mut query)?,
            }
        }
        Ok(query)
    }

    fn parse_ask(&self, pair: Pair<Rule>) -> ParseResult<Query> {
        let mut query = Query::new(QueryForm::Ask);
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::group_graph_pattern => query.where_clause = self.parse_group(inner)?,
                _ => self.parse_solution_modifier(inner, &mut query)?,
            }
        }
        Ok(query)
    }

    fn parse_select_clause(&self, pair: Pair<Rule>, query: &mut Query) -> ParseResult<()> {
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::distinct => query.distinct = true,
                Rule::wildcard => query.wildcard = true,
                Rule::var => query.variables.push(SelectItem::Variable(variable(inner)?)),
                Rule::select_expression => {
                    let mut parts = inner.into_inner();
                    let expression = self.parse_expression(parts.next().ok_or_else(|| missing("expression"))?)?;
                    let alias = variable(parts.next().ok_or_else(|| missing("alias"))?)?;
                    query.variables.push(SelectItem::Expression { expression, alias });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_solution_modifier(&self, pair: Pair<Rule>, query: &mut Query) -> ParseResult<()> {
        match pair.as_rule() {
            Rule::group_clause => {
                for var in pair.into_inner() {
                    query.group_by.push(variable(var)?);
                }
            }
            Rule::having_clause => {
                for constraint in pair.into_inner() {
                    query.having.push(self.parse_primary(constraint)?);
                }
            }
            Rule::order_clause => {
                for condition in pair.into_inner() {
                    query.order_by.push(self.parse_order_condition(condition)?);
                }
            }
            Rule::limit_clause => query.limit = Some(integer(pair)?),
            Rule::offset_clause => query.offset = Some(integer(pair)?),
            _ => {}
        }
        Ok(())
    }

    fn parse_order_condition(&self, pair: Pair<Rule>) -> ParseResult<OrderCondition> {
        let mut descending = false;
        let mut expression = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::order_direction => descending = inner.as_str().eq_ignore_ascii_case("desc"),
                _ => expression = Some(self.parse_primary(inner)?),
            }
        }
        Ok(OrderCondition {
            expression: expression.ok_or_else(|| missing("expression in ORDER BY"))?,
            descending,
        })
    }

    fn parse_group(&self, pair: Pair<Rule>) -> ParseResult<Vec<GraphPattern>> {
        let mut patterns = Vec::new();
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::triples_block => {
                    let triples = self.parse_triples_block(inner)?;
                    // adjacent blocks separated only by filters stay separate,
                    // as in the source text
                    patterns.push(GraphPattern::Bgp(triples));
                }
                Rule::filter => {
                    let constraint = inner.into_inner().next().ok_or_else(|| missing("filter expression"))?;
                    patterns.push(GraphPattern::Filter(self.parse_primary(constraint)?));
                }
                Rule::group_or_union => {
                    let mut branches = Vec::new();
                    for group in inner.into_inner() {
                        branches.push(self.parse_group(group)?);
                    }
                    if branches.len() == 1 {
                        patterns.push(GraphPattern::Group(branches.remove(0)));
                    } else {
                        patterns.push(GraphPattern::Union(branches));
                    }
                }
                Rule::optional_pattern => {
                    let group = inner.into_inner().next().ok_or_else(|| missing("OPTIONAL group"))?;
                    patterns.push(GraphPattern::Optional(self.parse_group(group)?));
                }
                Rule::minus_pattern => {
                    let group = inner.into_inner().next().ok_or_else(|| missing("MINUS group"))?;
                    patterns.push(GraphPattern::Minus(self.parse_group(group)?));
                }
                Rule::service_pattern => {
                    let mut silent = false;
                    let mut name = None;
                    let mut group = Vec::new();
                    for part in inner.into_inner() {
                        match part.as_rule() {
                            Rule::silent => silent = true,
                            Rule::group_graph_pattern => group = self.parse_group(part)?,
                            _ => name = Some(self.parse_term(part)?),
                        }
                    }
                    patterns.push(GraphPattern::Service {
                        name: name.ok_or_else(|| missing("service name"))?,
                        silent,
                        patterns: group,
                    });
                }
                Rule::bind => {
                    let mut parts = inner.into_inner();
                    let expression = self.parse_expression(parts.next().ok_or_else(|| missing("BIND expression"))?)?;
                    let var = variable(parts.next().ok_or_else(|| missing("BIND variable"))?)?;
                    patterns.push(GraphPattern::Bind {
                        expression,
                        variable: var,
                    });
                }
                _ => {}
            }
        }
        Ok(patterns)
    }

    fn parse_triples_block(&self, pair: Pair<Rule>) -> ParseResult<Vec<Triple>> {
        let mut triples = Vec::new();
        for same_subject in pair.into_inner() {
            let mut parts = same_subject.into_inner();
            let subject = self.parse_term(parts.next().ok_or_else(|| missing("subject"))?)?;
            for property_object in parts {
                let mut po = property_object.into_inner();
                let verb = self.parse_verb(po.next().ok_or_else(|| missing("predicate"))?)?;
                for object in po {
                    triples.push(Triple::new(subject.clone(), verb.clone(), self.parse_term(object)?));
                }
            }
        }
        Ok(triples)
    }

    fn parse_verb(&self, pair: Pair<Rule>) -> ParseResult<Verb> {
        let inner = pair.into_inner().next().ok_or_else(|| missing("predicate"))?;
        match inner.as_rule() {
            Rule::var => Ok(Verb::Term(Term::Variable(variable(inner)?))),
            Rule::path => match self.parse_path(inner)? {
                PropertyPath::Iri(iri) => Ok(Verb::Term(Term::Iri(iri))),
                path => Ok(Verb::Path(path)),
            },
            other => Err(ParseError::SemanticError(format!("Unexpected predicate: {:?}", other))),
        }
    }

    fn parse_path(&self, pair: Pair<Rule>) -> ParseResult<PropertyPath> {
        let mut alternatives = Vec::new();
        for sequence in pair.into_inner() {
            let mut steps = Vec::new();
            for elt in sequence.into_inner() {
                steps.push(self.parse_path_element(elt)?);
            }
            alternatives.push(if steps.len() == 1 {
                steps.remove(0)
            } else {
                PropertyPath::Sequence(steps)
            });
        }
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            PropertyPath::Alternative(alternatives)
        })
    }

    fn parse_path_element(&self, pair: Pair<Rule>) -> ParseResult<PropertyPath> {
        let mut inverse = false;
        let mut primary = None;
        let mut modifier = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::inverse => inverse = true,
                Rule::path_mod => modifier = Some(inner.as_str().to_string()),
                Rule::path_primary => {
                    let p = inner.into_inner().next().ok_or_else(|| missing("path step"))?;
                    primary = Some(match p.as_rule() {
                        Rule::path => self.parse_path(p)?,
                        Rule::a_keyword => PropertyPath::Iri(rdf::TYPE.into_owned()),
                        _ => PropertyPath::Iri(self.parse_iri(p)?),
                    });
                }
                _ => {}
            }
        }

        let mut path = primary.ok_or_else(|| missing("path step"))?;
        path = match modifier.as_deref() {
            Some("*") => PropertyPath::ZeroOrMore(Box::new(path)),
            Some("+") => PropertyPath::OneOrMore(Box::new(path)),
            Some("?") => PropertyPath::ZeroOrOne(Box::new(path)),
            _ => path,
        };
        if inverse {
            path = PropertyPath::Inverse(Box::new(path));
        }
        Ok(path)
    }

    fn parse_iri(&self, pair: Pair<Rule>) -> ParseResult<NamedNode> {
        let iri = match pair.as_rule() {
            Rule::iri_ref => iri_ref_value(pair)?,
            Rule::prefixed_name => self
                .namespaces
                .expand(pair.as_str())
                .map_err(|e| ParseError::InvalidTerm(e.to_string()))?,
            other => return Err(ParseError::SemanticError(format!("Expected IRI, found {:?}", other))),
        };
        NamedNode::new(iri.as_str()).map_err(|e| ParseError::InvalidTerm(format!("{}: {}", iri, e)))
    }

    fn parse_term(&self, pair: Pair<Rule>) -> ParseResult<Term> {
        match pair.as_rule() {
            Rule::var => Ok(Term::Variable(variable(pair)?)),
            Rule::iri_ref | Rule::prefixed_name => Ok(Term::Iri(self.parse_iri(pair)?)),
            Rule::literal => Ok(Term::Literal(self.parse_literal(pair)?)),
            Rule::blank_node => BlankNode::new(&pair.as_str()[2..])
                .map(Term::BlankNode)
                .map_err(|e| ParseError::InvalidTerm(e.to_string())),
            other => Err(ParseError::SemanticError(format!("Unexpected term: {:?}", other))),
        }
    }

    fn parse_literal(&self, pair: Pair<Rule>) -> ParseResult<Literal> {
        let inner = pair.into_inner().next().ok_or_else(|| missing("literal"))?;
        match inner.as_rule() {
            Rule::number => {
                let text = inner.as_str();
                let datatype = if text.contains(['e', 'E']) {
                    xsd::DOUBLE
                } else if text.contains('.') {
                    xsd::DECIMAL
                } else {
                    xsd::INTEGER
                };
                Ok(Literal::new_typed_literal(text, datatype))
            }
            Rule::boolean => Ok(Literal::new_typed_literal(inner.as_str(), xsd::BOOLEAN)),
            Rule::rdf_literal => {
                let mut parts = inner.into_inner();
                let string = parts.next().ok_or_else(|| missing("string"))?;
                let value = unescape(string.into_inner().next().map(|s| s.as_str()).unwrap_or(""));
                match parts.next() {
                    None => Ok(Literal::new_simple_literal(value)),
                    Some(tag) if tag.as_rule() == Rule::lang_tag => {
                        Literal::new_language_tagged_literal(value, &tag.as_str()[1..])
                            .map_err(|e| ParseError::InvalidTerm(e.to_string()))
                    }
                    Some(datatype) => Ok(Literal::new_typed_literal(value, self.parse_iri(datatype)?)),
                }
            }
            other => Err(ParseError::SemanticError(format!("Unexpected literal: {:?}", other))),
        }
    }

    fn parse_expression(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        PRATT_PARSER
            .map_primary(|primary| self.parse_primary(primary))
            .map_prefix(|_op, operand| Ok(Expression::Not(Box::new(operand?))))
            .map_infix(|left, op, right| {
                let left = Box::new(left?);
                let right = Box::new(right?);
                match op.as_rule() {
                    Rule::or_op => Ok(Expression::Or(left, right)),
                    Rule::and_op => Ok(Expression::And(left, right)),
                    Rule::comparison_op => {
                        let cmp = ComparisonOp::parse(op.as_str()).ok_or_else(|| {
                            ParseError::SemanticError(format!("Unknown operator: {}", op.as_str()))
                        })?;
                        Ok(Expression::Comparison {
                            op: cmp,
                            lhs: left,
                            rhs: right,
                        })
                    }
                    other => Err(ParseError::SemanticError(format!("Unexpected operator: {:?}", other))),
                }
            })
            .parse(pair.into_inner())
    }

    fn parse_primary(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        match pair.as_rule() {
            Rule::expression => self.parse_expression(pair),
            Rule::exists_expr => {
                let mut negated = false;
                let mut patterns = Vec::new();
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::not_keyword => negated = true,
                        Rule::group_graph_pattern => patterns = self.parse_group(inner)?,
                        _ => {}
                    }
                }
                Ok(Expression::Exists { negated, patterns })
            }
            Rule::function_call => self.parse_function_call(pair),
            Rule::var | Rule::iri_ref | Rule::prefixed_name | Rule::literal => {
                Ok(Expression::Term(self.parse_term(pair)?))
            }
            other => Err(ParseError::SemanticError(format!("Unexpected expression: {:?}", other))),
        }
    }

    fn parse_function_call(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        let mut name = String::new();
        let mut distinct = false;
        let mut wildcard = false;
        let mut args = Vec::new();
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::function_name => name = inner.as_str().to_lowercase(),
                Rule::distinct => distinct = true,
                Rule::wildcard => wildcard = true,
                Rule::expression => args.push(self.parse_expression(inner)?),
                _ => {}
            }
        }

        if matches!(name.as_str(), "count" | "sum" | "avg" | "min" | "max" | "sample" | "group_concat") {
            if args.len() > 1 {
                return Err(ParseError::SemanticError(format!("{} takes one argument", name)));
            }
            return Ok(Expression::Aggregate {
                name,
                distinct,
                argument: if wildcard { None } else { args.pop().map(Box::new) },
            });
        }
        if wildcard || distinct {
            return Err(ParseError::SemanticError(format!("Unexpected modifier in {}", name)));
        }
        Ok(Expression::Function { name, args })
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

fn variable(pair: Pair<Rule>) -> ParseResult<Variable> {
    let name = &pair.as_str()[1..];
    Variable::new(name).map_err(|e| ParseError::InvalidTerm(format!("{}: {}", name, e)))
}

fn iri_ref_value(pair: Pair<Rule>) -> ParseResult<String> {
    pair.into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| missing("IRI"))
}

fn integer(pair: Pair<Rule>) -> ParseResult<usize> {
    let digits = pair.into_inner().next().ok_or_else(|| missing("integer"))?;
    digits
        .as_str()
        .parse()
        .map_err(|_| ParseError::InvalidTerm(digits.as_str().to_string()))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const WD: &str = "http://www.wikidata.org/entity/";
    const WDT: &str = "http://www.wikidata.org/prop/direct/";

    #[test]
    fn test_parse_simple_select() {
        let query = parse_query("SELECT DISTINCT ?x WHERE { wd:Q42 wdt:P569 ?x . }").unwrap();
        assert!(query.is_select());
        assert!(query.distinct);
        assert_eq!(query.variables.len(), 1);
        match &query.where_clause[0] {
            GraphPattern::Bgp(triples) => {
                assert_eq!(triples.len(), 1);
                assert_eq!(triples[0].subject.as_iri(), Some(format!("{}Q42", WD).as_str()));
                assert_eq!(triples[0].predicate.as_iri(), Some(format!("{}P569", WDT).as_str()));
                assert_eq!(triples[0].object.as_variable(), Some("x"));
            }
            other => panic!("Expected BGP, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_declared_prefix_and_predicate_lists() {
        let query = parse_query(
            "PREFIX ex: <http://example.org/> SELECT ?x { ?x ex:a ex:b , ex:c ; ex:d ?y }",
        )
        .unwrap();
        assert_eq!(query.prefixes.get("ex").map(|s| s.as_str()), Some("http://example.org/"));
        match &query.where_clause[0] {
            GraphPattern::Bgp(triples) => {
                assert_eq!(triples.len(), 3);
                assert_eq!(triples[1].object.as_iri(), Some("http://example.org/c"));
                assert_eq!(triples[2].predicate.as_iri(), Some("http://example.org/d"));
            }
            other => panic!("Expected BGP, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_property_paths() {
        let query = parse_query("SELECT ?x WHERE { ?x wdt:P31/wdt:P279* wd:Q515 . ?x wdt:P131+ ?y }").unwrap();
        let GraphPattern::Bgp(triples) = &query.where_clause[0] else {
            panic!("Expected BGP");
        };
        match &triples[0].predicate {
            Verb::Path(PropertyPath::Sequence(steps)) => {
                assert_eq!(steps.len(), 2);
                assert!(matches!(&steps[1], PropertyPath::ZeroOrMore(_)));
            }
            other => panic!("Expected sequence, got {:?}", other),
        }
        assert!(matches!(&triples[1].predicate, Verb::Path(PropertyPath::OneOrMore(_))));
        assert_eq!(triples[1].object.as_variable(), Some("y"));
    }

    #[test]
    fn test_parse_alternative_path() {
        let query = parse_query("SELECT ?x WHERE { wd:Q1 wdt:P17|wdt:P131 ?x }").unwrap();
        let GraphPattern::Bgp(triples) = &query.where_clause[0] else {
            panic!("Expected BGP");
        };
        assert!(matches!(&triples[0].predicate, Verb::Path(PropertyPath::Alternative(a)) if a.len() == 2));
    }

    #[test]
    fn test_parse_filters() {
        let query = parse_query(
            r#"SELECT ?x WHERE { ?x wdt:P1082 ?p . FILTER(?p > 1000000 && !bound(?y)) FILTER(regex(?l, "abc", "i")) }"#,
        )
        .unwrap();
        assert_eq!(query.where_clause.len(), 3);
        match &query.where_clause[1] {
            GraphPattern::Filter(Expression::And(lhs, rhs)) => {
                assert!(matches!(lhs.as_ref(), Expression::Comparison { op: ComparisonOp::Greater, .. }));
                match rhs.as_ref() {
                    Expression::Not(inner) => {
                        assert!(matches!(inner.as_ref(), Expression::Function { name, .. } if name == "bound"))
                    }
                    other => panic!("Expected negation, got {:?}", other),
                }
            }
            other => panic!("Expected filter, got {:?}", other),
        }
        assert!(matches!(
            &query.where_clause[2],
            GraphPattern::Filter(Expression::Function { name, args }) if name == "regex" && args.len() == 3
        ));
    }

    #[test]
    fn test_parse_typed_literals() {
        let query = parse_query(
            r#"ASK WHERE { wd:Q1 wdt:P580 "1990-01-01T00:00:00Z"^^xsd:dateTime ; rdfs:label "Berlin"@en ; wdt:P1 5.5 }"#,
        )
        .unwrap();
        assert!(query.is_ask());
        let GraphPattern::Bgp(triples) = &query.where_clause[0] else {
            panic!("Expected BGP");
        };
        let date = triples[0].object.as_literal().unwrap();
        assert_eq!(date.datatype().as_str(), "http://www.w3.org/2001/XMLSchema#dateTime");
        assert_eq!(triples[1].object.as_literal().unwrap().language(), Some("en"));
        assert_eq!(triples[2].object.as_literal().unwrap().value(), "5.5");
    }

    #[test]
    fn test_parse_union_and_service() {
        let query = parse_query(
            r#"SELECT ?x WHERE {
                { ?x wdt:P31 wd:Q5 } UNION { ?x wdt:P31/wdt:P279* wd:Q5 }
                SERVICE wikibase:label { bd:serviceParam wikibase:language "en". }
            }"#,
        )
        .unwrap();
        assert!(matches!(&query.where_clause[0], GraphPattern::Union(branches) if branches.len() == 2));
        match &query.where_clause[1] {
            GraphPattern::Service { name, .. } => {
                assert_eq!(name.as_iri(), Some("http://wikiba.se/ontology#label"))
            }
            other => panic!("Expected service, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_aggregation_and_modifiers() {
        let query = parse_query(
            "SELECT ?x (COUNT(DISTINCT ?y) AS ?c) WHERE { ?x wdt:P166 ?y } GROUP BY ?x HAVING (COUNT(?y) > 2) ORDER BY DESC(?c) LIMIT 5 OFFSET 10",
        )
        .unwrap();
        match &query.variables[1] {
            SelectItem::Expression { expression: Expression::Aggregate { name, distinct, .. }, alias } => {
                assert_eq!(name, "count");
                assert!(*distinct);
                assert_eq!(alias.as_str(), "c");
            }
            other => panic!("Expected aggregate, got {:?}", other),
        }
        assert_eq!(query.group_by.len(), 1);
        assert_eq!(query.having.len(), 1);
        assert!(query.order_by[0].descending);
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, Some(10));
    }

    #[test]
    fn test_parse_a_keyword_and_comments() {
        let query = parse_query("SELECT ?x # people\nWHERE { ?x a wd:Q5 }").unwrap();
        let GraphPattern::Bgp(triples) = &query.where_clause[0] else {
            panic!("Expected BGP");
        };
        assert_eq!(
            triples[0].predicate.as_iri(),
            Some("http://www.w3.org/1999/02/22-rdf-syntax-ns#type")
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_query("SELECT ?x WHERE { ?x wdt:P31 }"), Err(ParseError::PestError(_))));
        assert!(matches!(
            parse_query("SELECT ?x WHERE { ?x foo:bar ?y }"),
            Err(ParseError::InvalidTerm(_))
        ));
    }
}
