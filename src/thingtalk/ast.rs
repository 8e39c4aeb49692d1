//! Target expression tree
//!
//! A single-table query language: one invocation of a domain, decorated with
//! filters, projections, sorting, slicing and aggregation, or wrapped in a
//! boolean question for verification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operators of the target language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `==`
    Equal,
    /// `>=`
    GreaterEqual,
    /// `<=`
    LessEqual,
    /// `=~`, substring match
    Like,
    /// `contains`, collection membership
    Contains,
    /// `contains~`, fuzzy collection membership
    ContainsLike,
    /// `in_array`, scalar is a member of a collection
    InArray,
    /// `in_array~`
    InArrayLike,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::GreaterEqual => ">=",
            Operator::LessEqual => "<=",
            Operator::Like => "=~",
            Operator::Contains => "contains",
            Operator::ContainsLike => "contains~",
            Operator::InArray => "in_array",
            Operator::InArrayLike => "in_array~",
        }
    }

    /// Operators written as `op ( lhs , rhs )` rather than infix
    pub fn is_function_style(&self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::ContainsLike | Operator::InArray | Operator::InArrayLike
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregation operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregationOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op.to_ascii_lowercase().as_str() {
            "count" => Some(AggregationOp::Count),
            "sum" => Some(AggregationOp::Sum),
            "avg" => Some(AggregationOp::Avg),
            "min" => Some(AggregationOp::Min),
            "max" => Some(AggregationOp::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationOp::Count => "count",
            AggregationOp::Sum => "sum",
            AggregationOp::Avg => "avg",
            AggregationOp::Min => "min",
            AggregationOp::Max => "max",
        }
    }
}

impl fmt::Display for AggregationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Closure quantifier on a property path element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathQuantifier {
    /// `+`
    OneOrMore,
    /// `*`
    ZeroOrMore,
}

/// One hop of a property path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyPathElement {
    pub property: String,
    pub quantifier: Option<PathQuantifier>,
}

impl PropertyPathElement {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            quantifier: None,
        }
    }

    pub fn with_quantifier(property: impl Into<String>, quantifier: Option<PathQuantifier>) -> Self {
        Self {
            property: property.into(),
            quantifier,
        }
    }
}

pub type PropertyPath = Vec<PropertyPathElement>;

/// Calendar date; month and day are absent for a year-only date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatePiece {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl DatePiece {
    pub fn year(year: i32) -> Self {
        Self { year, month: None, day: None }
    }

    pub fn ymd(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
        }
    }

    /// The year, if the date falls on the first of January
    pub fn as_whole_year(&self) -> Option<i32> {
        match (self.month.unwrap_or(1), self.day.unwrap_or(1)) {
            (1, 1) => Some(self.year),
            _ => None,
        }
    }
}

/// Values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Entity {
        value: String,
        entity_type: String,
        display: Option<String>,
    },
    Enum(String),
    String(String),
    Number(f64),
    Measure { value: f64, unit: String },
    Date(DatePiece),
    Boolean(bool),
    Null,
    /// Reference to a property of the current table
    VarRef(String),
    Computation { operator: String, operands: Vec<Value> },
    /// A collection property restricted by a filter over its elements
    Filter {
        value: Box<Value>,
        filter: Box<BooleanExpression>,
    },
    /// A field of every element of a compound collection
    ArrayField { value: Box<Value>, field: String },
}

impl Value {
    pub fn var_ref(name: impl Into<String>) -> Self {
        Value::VarRef(name.into())
    }

    pub fn count(property: impl Into<String>) -> Self {
        Value::Computation {
            operator: AggregationOp::Count.as_str().to_string(),
            operands: vec![Value::VarRef(property.into())],
        }
    }

    pub fn filtered(value: Value, filter: BooleanExpression) -> Self {
        Value::Filter {
            value: Box::new(value),
            filter: Box::new(filter),
        }
    }

    /// The table property a derived value is computed from
    pub fn property_name(&self) -> Option<&str> {
        match self {
            Value::VarRef(name) => Some(name),
            Value::Filter { value, .. } | Value::ArrayField { value, .. } => value.property_name(),
            Value::Computation { operands, .. } => operands.first().and_then(|o| o.property_name()),
            _ => None,
        }
    }
}

/// What a projection selects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectionTarget {
    Property(String),
    Path(PropertyPath),
    /// A derived value: filtered collection or array field
    Value(Value),
}

impl ProjectionTarget {
    pub fn as_property(&self) -> Option<&str> {
        match self {
            ProjectionTarget::Property(name) => Some(name),
            _ => None,
        }
    }
}

/// One element of a projection, with an optional entity type annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionElement {
    pub target: ProjectionTarget,
    pub types: Vec<String>,
}

/// Boolean filter expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BooleanExpression {
    True,
    False,
    And(Vec<BooleanExpression>),
    Or(Vec<BooleanExpression>),
    Not(Box<BooleanExpression>),
    Atom {
        name: String,
        operator: Operator,
        value: Value,
    },
    Compute {
        lhs: Value,
        operator: Operator,
        rhs: Value,
    },
    PropertyPath {
        path: PropertyPath,
        operator: Operator,
        value: Value,
    },
    ComparisonSubquery {
        lhs: Value,
        operator: Operator,
        rhs: Box<Expression>,
    },
}

impl BooleanExpression {
    pub fn atom(name: impl Into<String>, operator: Operator, value: Value) -> Self {
        BooleanExpression::Atom {
            name: name.into(),
            operator,
            value,
        }
    }

    pub fn not(inner: BooleanExpression) -> Self {
        BooleanExpression::Not(Box::new(inner))
    }

    /// Conjunction of the operands, without a wrapper for a single operand
    pub fn and(mut operands: Vec<BooleanExpression>) -> Self {
        match operands.len() {
            0 => BooleanExpression::True,
            1 => operands.remove(0),
            _ => BooleanExpression::And(operands),
        }
    }

    /// Disjunction of the operands, without a wrapper for a single operand
    pub fn or(mut operands: Vec<BooleanExpression>) -> Self {
        match operands.len() {
            0 => BooleanExpression::False,
            1 => operands.remove(0),
            _ => BooleanExpression::Or(operands),
        }
    }

    /// `id == <entity>`
    pub fn is_id_filter(&self) -> bool {
        matches!(
            self,
            BooleanExpression::Atom { name, operator: Operator::Equal, .. } if name == "id"
        )
    }

    /// Name of the atom, if this is one
    pub fn atom_name(&self) -> Option<&str> {
        match self {
            BooleanExpression::Atom { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Table properties this filter reads
    pub fn properties(&self) -> Vec<String> {
        match self {
            BooleanExpression::Atom { name, .. } => vec![name.clone()],
            BooleanExpression::And(operands) | BooleanExpression::Or(operands) => {
                operands.iter().flat_map(|o| o.properties()).collect()
            }
            BooleanExpression::Not(inner) => inner.properties(),
            BooleanExpression::PropertyPath { path, .. } => {
                path.first().map(|e| vec![e.property.clone()]).unwrap_or_default()
            }
            BooleanExpression::Compute { lhs, .. } | BooleanExpression::ComparisonSubquery { lhs, .. } => {
                lhs.property_name().map(|p| vec![p.to_string()]).unwrap_or_default()
            }
            BooleanExpression::True | BooleanExpression::False => Vec::new(),
        }
    }
}

/// Query expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// `@device . domain ( )`
    Invocation { device: String, domain: String },
    Filter {
        expression: Box<Expression>,
        filter: BooleanExpression,
    },
    Projection {
        expression: Box<Expression>,
        elements: Vec<ProjectionElement>,
    },
    Sort {
        expression: Box<Expression>,
        value: Value,
        direction: SortDirection,
    },
    Index {
        expression: Box<Expression>,
        indices: Vec<Value>,
    },
    Slice {
        expression: Box<Expression>,
        base: Value,
        limit: Value,
    },
    /// `field` is `*` when counting rows
    Aggregation {
        expression: Box<Expression>,
        field: String,
        operator: AggregationOp,
    },
    BooleanQuestion {
        expression: Box<Expression>,
        filter: BooleanExpression,
    },
}

impl Expression {
    /// A bare invocation of a domain: no filter, no projection
    pub fn invocation(device: impl Into<String>, domain: impl Into<String>) -> Self {
        Expression::Invocation {
            device: device.into(),
            domain: domain.into(),
        }
    }

    /// Project plain property names
    pub fn project(self, properties: &[&str]) -> Self {
        Expression::Projection {
            expression: Box::new(self),
            elements: properties
                .iter()
                .map(|p| ProjectionElement {
                    target: ProjectionTarget::Property(p.to_string()),
                    types: Vec::new(),
                })
                .collect(),
        }
    }

    /// Apply a filter, skipping trivially true ones
    pub fn filter(self, filter: BooleanExpression) -> Self {
        if filter == BooleanExpression::True {
            return self;
        }
        Expression::Filter {
            expression: Box::new(self),
            filter,
        }
    }

    /// Render as a complete statement
    pub fn to_statement(&self) -> String {
        format!("{} ;", self)
    }
}
