//! Source query tree
//!
//! Keeps the clause structure of the query text (basic graph patterns,
//! filters, unions, services, grouping) rather than lowering to algebra;
//! the converter consumes clauses in source order.

use indexmap::IndexMap;
use oxrdf::{BlankNode, Literal, NamedNode, Variable};
use std::fmt;

/// A node position in a triple or expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Iri(NamedNode),
    Literal(Literal),
    Variable(Variable),
    BlankNode(BlankNode),
}

impl Term {
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Term::Variable(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri.as_str()),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(l) => Some(l),
            _ => None,
        }
    }

    /// Lexical value: IRI string, literal value, variable or blank node name
    pub fn value(&self) -> &str {
        match self {
            Term::Iri(iri) => iri.as_str(),
            Term::Literal(l) => l.value(),
            Term::Variable(v) => v.as_str(),
            Term::BlankNode(b) => b.as_str(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "{}", iri),
            Term::Literal(l) => write!(f, "{}", l),
            Term::Variable(v) => write!(f, "{}", v),
            Term::BlankNode(b) => write!(f, "{}", b),
        }
    }
}

/// Property path expressions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyPath {
    Iri(NamedNode),
    Sequence(Vec<PropertyPath>),
    Alternative(Vec<PropertyPath>),
    Inverse(Box<PropertyPath>),
    ZeroOrMore(Box<PropertyPath>),
    OneOrMore(Box<PropertyPath>),
    ZeroOrOne(Box<PropertyPath>),
}

impl PropertyPath {
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            PropertyPath::Iri(iri) => Some(iri.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyPath::Iri(iri) => write!(f, "{}", iri),
            PropertyPath::Sequence(items) => {
                let parts: Vec<String> = items.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", parts.join("/"))
            }
            PropertyPath::Alternative(items) => {
                let parts: Vec<String> = items.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", parts.join("|"))
            }
            PropertyPath::Inverse(p) => write!(f, "^{}", p),
            PropertyPath::ZeroOrMore(p) => write!(f, "{}*", p),
            PropertyPath::OneOrMore(p) => write!(f, "{}+", p),
            PropertyPath::ZeroOrOne(p) => write!(f, "{}?", p),
        }
    }
}

/// Predicate position: a plain term or a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verb {
    Term(Term),
    Path(PropertyPath),
}

impl Verb {
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Verb::Term(term) => term.as_iri(),
            Verb::Path(path) => path.as_iri(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Verb,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Verb, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let predicate = match &self.predicate {
            Verb::Term(t) => t.to_string(),
            Verb::Path(p) => p.to_string(),
        };
        write!(f, "{} {} {}", self.subject, predicate, self.object)
    }
}

/// Comparison operators in filter expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl ComparisonOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "=" => Some(ComparisonOp::Equal),
            "!=" => Some(ComparisonOp::NotEqual),
            "<" => Some(ComparisonOp::Less),
            "<=" => Some(ComparisonOp::LessEqual),
            ">" => Some(ComparisonOp::Greater),
            ">=" => Some(ComparisonOp::GreaterEqual),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::Less => "<",
            ComparisonOp::LessEqual => "<=",
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterEqual => ">=",
        };
        f.write_str(s)
    }
}

/// Filter, having and ordering expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Term(Term),
    Or(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Comparison {
        op: ComparisonOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// Built-in or named function call, name lowercased
    Function { name: String, args: Vec<Expression> },
    Aggregate {
        name: String,
        distinct: bool,
        /// `None` for `COUNT(*)`
        argument: Option<Box<Expression>>,
    },
    Exists {
        negated: bool,
        patterns: Vec<GraphPattern>,
    },
}

impl Expression {
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Expression::Term(term) => term.as_variable(),
            _ => None,
        }
    }

    pub fn as_term(&self) -> Option<&Term> {
        match self {
            Expression::Term(term) => Some(term),
            _ => None,
        }
    }
}

/// Group graph pattern elements
#[derive(Debug, Clone, PartialEq)]
pub enum GraphPattern {
    Bgp(Vec<Triple>),
    Filter(Expression),
    /// Each branch is its own group
    Union(Vec<Vec<GraphPattern>>),
    Group(Vec<GraphPattern>),
    Optional(Vec<GraphPattern>),
    Minus(Vec<GraphPattern>),
    Service {
        name: Term,
        silent: bool,
        patterns: Vec<GraphPattern>,
    },
    Bind {
        expression: Expression,
        variable: Variable,
    },
}

impl GraphPattern {
    /// Short name for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            GraphPattern::Bgp(_) => "bgp",
            GraphPattern::Filter(_) => "filter",
            GraphPattern::Union(_) => "union",
            GraphPattern::Group(_) => "group",
            GraphPattern::Optional(_) => "optional",
            GraphPattern::Minus(_) => "minus",
            GraphPattern::Service { .. } => "service",
            GraphPattern::Bind { .. } => "bind",
        }
    }
}

/// One entry of a SELECT clause
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Variable(Variable),
    Expression {
        expression: Expression,
        alias: Variable,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderCondition {
    pub expression: Expression,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryForm {
    Select,
    Ask,
}

/// A parsed SELECT or ASK query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub form: QueryForm,
    pub prefixes: IndexMap<String, String>,
    pub distinct: bool,
    /// Empty for `SELECT *`
    pub variables: Vec<SelectItem>,
    pub wildcard: bool,
    pub where_clause: Vec<GraphPattern>,
    pub group_by: Vec<Variable>,
    pub having: Vec<Expression>,
    pub order_by: Vec<OrderCondition>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn new(form: QueryForm) -> Self {
        Self {
            form,
            prefixes: IndexMap::new(),
            distinct: false,
            variables: Vec::new(),
            wildcard: false,
            where_clause: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn is_select(&self) -> bool {
        self.form == QueryForm::Select
    }

    pub fn is_ask(&self) -> bool {
        self.form == QueryForm::Ask
    }
}
