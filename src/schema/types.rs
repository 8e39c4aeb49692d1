//! Property value types
//!
//! Types are written in the schema document with a compact syntax:
//! `Date`, `Entity(wd:human)`, `Array(Entity(wd:p_award_received))`,
//! `Compound(value: Entity(wd:p_position_held), start_time: Date)`.

use indexmap::IndexMap;
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{SchemaError, SchemaResult};

#[derive(Parser)]
#[grammar = "schema/types.pest"]
struct TypeParser;

/// The declared type of a property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Date,
    Location,
    Currency,
    /// Entity type such as `wd:human`
    Entity(String),
    Enum(Vec<String>),
    /// Measure with its base unit
    Measure(String),
    Array(Box<ValueType>),
    /// Compound with named fields; the `value` field carries the main value
    Compound(IndexMap<String, ValueType>),
}

impl ValueType {
    pub fn is_array(&self) -> bool {
        matches!(self, ValueType::Array(_))
    }

    /// Strip array wrappers and resolve compounds to the type of their
    /// `value` field.
    pub fn elem_type(&self) -> &ValueType {
        match self {
            ValueType::Array(inner) => inner.elem_type(),
            ValueType::Compound(fields) => match fields.get("value") {
                Some(value) => value.elem_type(),
                None => self,
            },
            other => other,
        }
    }

    /// Strip array wrappers only, leaving compounds intact.
    pub fn element(&self) -> &ValueType {
        match self {
            ValueType::Array(inner) => inner.element(),
            other => other,
        }
    }

    /// Fields of a compound element type, if any
    pub fn compound_fields(&self) -> Option<&IndexMap<String, ValueType>> {
        match self.element() {
            ValueType::Compound(fields) => Some(fields),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "String"),
            ValueType::Number => write!(f, "Number"),
            ValueType::Boolean => write!(f, "Boolean"),
            ValueType::Date => write!(f, "Date"),
            ValueType::Location => write!(f, "Location"),
            ValueType::Currency => write!(f, "Currency"),
            ValueType::Entity(name) => write!(f, "Entity({})", name),
            ValueType::Enum(values) => write!(f, "Enum({})", values.join(", ")),
            ValueType::Measure(unit) => write!(f, "Measure({})", unit),
            ValueType::Array(inner) => write!(f, "Array({})", inner),
            ValueType::Compound(fields) => {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|(name, ty)| format!("{}: {}", name, ty))
                    .collect();
                write!(f, "Compound({})", fields.join(", "))
            }
        }
    }
}

impl FromStr for ValueType {
    type Err = SchemaError;

    fn from_str(s: &str) -> SchemaResult<Self> {
        let mut pairs = TypeParser::parse(Rule::type_decl, s)
            .map_err(|e| SchemaError::InvalidType(format!("{}: {}", s, e)))?;
        let decl = pairs
            .next()
            .ok_or_else(|| SchemaError::InvalidType(s.to_string()))?;
        let inner = decl
            .into_inner()
            .next()
            .ok_or_else(|| SchemaError::InvalidType(s.to_string()))?;
        build_type(inner)
    }
}

impl TryFrom<String> for ValueType {
    type Error = SchemaError;

    fn try_from(value: String) -> SchemaResult<Self> {
        value.parse()
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.to_string()
    }
}

fn build_type(pair: pest::iterators::Pair<Rule>) -> SchemaResult<ValueType> {
    let text = pair.as_str().to_string();
    let missing = || SchemaError::InvalidType(text.clone());
    match pair.as_rule() {
        Rule::primitive_type => match pair.as_str() {
            "String" => Ok(ValueType::String),
            "Number" => Ok(ValueType::Number),
            "Boolean" => Ok(ValueType::Boolean),
            "Date" => Ok(ValueType::Date),
            "Location" => Ok(ValueType::Location),
            "Currency" => Ok(ValueType::Currency),
            other => Err(SchemaError::InvalidType(other.to_string())),
        },
        Rule::entity_type => {
            let name = pair.into_inner().next().ok_or_else(missing)?;
            Ok(ValueType::Entity(name.as_str().to_string()))
        }
        Rule::enum_type => Ok(ValueType::Enum(
            pair.into_inner().map(|p| p.as_str().to_string()).collect(),
        )),
        Rule::measure_type => {
            let unit = pair.into_inner().next().ok_or_else(missing)?;
            Ok(ValueType::Measure(unit.as_str().to_string()))
        }
        Rule::array_type => {
            let inner = pair.into_inner().next().ok_or_else(missing)?;
            Ok(ValueType::Array(Box::new(build_type(inner)?)))
        }
        Rule::compound_type => {
            let mut fields = IndexMap::new();
            for field in pair.into_inner() {
                let mut parts = field.into_inner();
                let name = parts.next().ok_or_else(missing)?.as_str().to_string();
                let ty = build_type(parts.next().ok_or_else(missing)?)?;
                fields.insert(name, ty);
            }
            Ok(ValueType::Compound(fields))
        }
        _ => Err(SchemaError::InvalidType(text)),
    }
}
