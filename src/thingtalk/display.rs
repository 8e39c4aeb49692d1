//! Canonical token-spaced rendering
//!
//! Every token is separated by a single space so that the output can be
//! compared with tokenized reference programs verbatim.

use std::fmt;

use super::ast::*;

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for PropertyPathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quantifier {
            Some(PathQuantifier::OneOrMore) => write!(f, "{} +", self.property),
            Some(PathQuantifier::ZeroOrMore) => write!(f, "{} *", self.property),
            None => write!(f, "{}", self.property),
        }
    }
}

struct PathDisplay<'a>(&'a [PropertyPathElement]);

impl fmt::Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "< {} >", join(self.0, " / "))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Entity { value, entity_type, display } => match display {
                Some(display) => write!(f, "\" {} \" ^^{} ( \" {} \" )", value, entity_type, display),
                None => write!(f, "\" {} \" ^^{}", value, entity_type),
            },
            Value::Enum(v) => write!(f, "enum {}", v),
            Value::String(s) => write!(f, "\" {} \"", s),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Measure { value, unit } => write!(f, "{} unit:{}", format_number(*value), unit),
            Value::Date(date) => match (date.month, date.day) {
                (Some(month), Some(day)) => {
                    write!(f, "new Date ( {} , {} , {} )", date.year, month, day)
                }
                (Some(month), None) => write!(f, "new Date ( {} , {} )", date.year, month),
                _ => write!(f, "new Date ( {} )", date.year),
            },
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::VarRef(name) => write!(f, "{}", name),
            Value::Computation { operator, operands } => {
                write!(f, "{} ( {} )", operator, join(operands, " , "))
            }
            Value::Filter { value, filter } => match filter.as_ref() {
                BooleanExpression::And(_) | BooleanExpression::Or(_) => {
                    write!(f, "{} filter ( {} )", value, filter)
                }
                _ => write!(f, "{} filter {}", value, filter),
            },
            Value::ArrayField { value, field } => write!(f, "{} of ( {} )", field, value),
        }
    }
}

/// Render the left operand of an infix comparison, bracketing values that
/// would otherwise swallow the operator.
fn infix_operand(value: &Value) -> String {
    match value {
        Value::Filter { .. } => format!("( {} )", value),
        _ => value.to_string(),
    }
}

fn comparison(f: &mut fmt::Formatter<'_>, lhs: &str, operator: Operator, rhs: &str) -> fmt::Result {
    if operator.is_function_style() {
        write!(f, "{} ( {} , {} )", operator, lhs, rhs)
    } else {
        write!(f, "{} {} {}", lhs, operator, rhs)
    }
}

impl fmt::Display for BooleanExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BooleanExpression::True => write!(f, "true"),
            BooleanExpression::False => write!(f, "false"),
            BooleanExpression::And(operands) => {
                let parts: Vec<String> = operands
                    .iter()
                    .map(|o| match o {
                        BooleanExpression::Or(_) => format!("( {} )", o),
                        _ => o.to_string(),
                    })
                    .collect();
                write!(f, "{}", parts.join(" && "))
            }
            BooleanExpression::Or(operands) => {
                let parts: Vec<String> = operands
                    .iter()
                    .map(|o| match o {
                        BooleanExpression::And(_) => format!("( {} )", o),
                        _ => o.to_string(),
                    })
                    .collect();
                write!(f, "{}", parts.join(" || "))
            }
            BooleanExpression::Not(inner) => match inner.as_ref() {
                BooleanExpression::And(_) | BooleanExpression::Or(_) => write!(f, "! ( {} )", inner),
                _ => write!(f, "! {}", inner),
            },
            BooleanExpression::Atom { name, operator, value } => {
                comparison(f, name, *operator, &value.to_string())
            }
            BooleanExpression::Compute { lhs, operator, rhs } => {
                let lhs = if operator.is_function_style() {
                    lhs.to_string()
                } else {
                    infix_operand(lhs)
                };
                comparison(f, &lhs, *operator, &rhs.to_string())
            }
            BooleanExpression::PropertyPath { path, operator, value } => {
                comparison(f, &PathDisplay(path).to_string(), *operator, &value.to_string())
            }
            BooleanExpression::ComparisonSubquery { lhs, operator, rhs } => {
                let rhs = format!("any ( {} )", rhs);
                comparison(f, &lhs.to_string(), *operator, &rhs)
            }
        }
    }
}

impl fmt::Display for ProjectionElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            ProjectionTarget::Property(name) => write!(f, "{}", name)?,
            ProjectionTarget::Path(path) => write!(f, "{}", PathDisplay(path))?,
            ProjectionTarget::Value(value) => write!(f, "{}", value)?,
        }
        if !self.types.is_empty() {
            let types: Vec<String> = self.types.iter().map(|t| format!("Entity ( {} )", t)).collect();
            write!(f, " : {}", types.join(" , "))?;
        }
        Ok(())
    }
}

/// Render an operand of a postfix or `of` construct, bracketing filters so
/// the filter does not extend over the suffix.
fn inner(expression: &Expression) -> String {
    match expression {
        Expression::Filter { .. } => format!("( {} )", expression),
        _ => expression.to_string(),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Invocation { device, domain } => write!(f, "@{} . {} ( )", device, domain),
            Expression::Filter { expression, filter } => match expression.as_ref() {
                Expression::Invocation { .. } => write!(f, "{} filter {}", expression, filter),
                _ => write!(f, "( {} ) filter {}", expression, filter),
            },
            Expression::Projection { expression, elements } => {
                write!(f, "[ {} ] of {}", join(elements, " , "), expression)
            }
            Expression::Sort { expression, value, direction } => {
                let direction = match direction {
                    SortDirection::Asc => "asc",
                    SortDirection::Desc => "desc",
                };
                write!(f, "sort ( {} {} of {} )", value, direction, expression)
            }
            Expression::Index { expression, indices } => {
                write!(f, "{} [ {} ]", inner(expression), join(indices, " , "))
            }
            Expression::Slice { expression, base, limit } => {
                write!(f, "{} [ {} : {} ]", inner(expression), base, limit)
            }
            Expression::Aggregation { expression, field, operator } => {
                if field == "*" {
                    write!(f, "{} ( {} )", operator, expression)
                } else {
                    write!(f, "{} ( {} of {} )", operator, field, expression)
                }
            }
            Expression::BooleanQuestion { expression, filter } => {
                write!(f, "[ {} ] of {}", filter, expression)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn human() -> Expression {
        Expression::invocation("wd", "human")
    }

    fn entity(qid: &str, ty: &str, display: Option<&str>) -> Value {
        Value::Entity {
            value: qid.to_string(),
            entity_type: ty.to_string(),
            display: display.map(|d| d.to_string()),
        }
    }

    #[test]
    fn test_filter_and_projection() {
        let expr = human()
            .filter(BooleanExpression::atom(
                "id",
                Operator::Equal,
                entity("Q42", "wd:human", Some("douglas adams")),
            ))
            .project(&["date_of_birth"]);
        assert_eq!(
            expr.to_statement(),
            "[ date_of_birth ] of @wd . human ( ) filter id == \" Q42 \" ^^wd:human ( \" douglas adams \" ) ;"
        );
    }

    #[test]
    fn test_function_style_operators() {
        let filter = BooleanExpression::And(vec![
            BooleanExpression::atom("award_received", Operator::Contains, entity("Q38104", "wd:p_award_received", None)),
            BooleanExpression::Or(vec![
                BooleanExpression::atom("date_of_birth", Operator::GreaterEqual, Value::Date(DatePiece::year(1950))),
                BooleanExpression::not(BooleanExpression::atom("date_of_death", Operator::Equal, Value::Null)),
            ]),
        ]);
        assert_eq!(
            filter.to_string(),
            "contains ( award_received , \" Q38104 \" ^^wd:p_award_received ) && ( date_of_birth >= new Date ( 1950 ) || ! date_of_death == null )"
        );
    }

    #[test]
    fn test_path_and_quantifier() {
        let filter = BooleanExpression::PropertyPath {
            path: vec![
                PropertyPathElement::new("instance_of"),
                PropertyPathElement::with_quantifier("subclass_of", Some(PathQuantifier::ZeroOrMore)),
            ],
            operator: Operator::Contains,
            value: entity("Q515", "wd:entity", None),
        };
        assert_eq!(
            filter.to_string(),
            "contains ( < instance_of / subclass_of * > , \" Q515 \" ^^wd:entity )"
        );
    }

    #[test]
    fn test_sort_index_and_aggregation() {
        let sorted = Expression::Sort {
            expression: Box::new(Expression::invocation("wd", "country")),
            value: Value::var_ref("area"),
            direction: SortDirection::Desc,
        };
        let indexed = Expression::Index {
            expression: Box::new(sorted),
            indices: vec![Value::Number(1.0)],
        };
        assert_eq!(indexed.to_string(), "sort ( area desc of @wd . country ( ) ) [ 1 ]");

        let count = Expression::Aggregation {
            expression: Box::new(human()),
            field: "*".to_string(),
            operator: AggregationOp::Count,
        };
        assert_eq!(count.to_string(), "count ( @wd . human ( ) )");

        let min = Expression::Aggregation {
            expression: Box::new(human()),
            field: "date_of_birth".to_string(),
            operator: AggregationOp::Min,
        };
        assert_eq!(min.to_string(), "min ( date_of_birth of @wd . human ( ) )");
    }

    #[test]
    fn test_filtered_value_and_array_field() {
        let filtered = Value::filtered(
            Value::var_ref("position_held"),
            BooleanExpression::atom("value", Operator::Equal, entity("Q11696", "wd:p_position_held", None)),
        );
        let projected = ProjectionElement {
            target: ProjectionTarget::Value(Value::ArrayField {
                value: Box::new(filtered),
                field: "start_time".to_string(),
            }),
            types: Vec::new(),
        };
        assert_eq!(
            projected.to_string(),
            "start_time of ( position_held filter value == \" Q11696 \" ^^wd:p_position_held )"
        );
    }

    #[test]
    fn test_values() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(
            Value::Measure { value: 100.0, unit: "m".to_string() }.to_string(),
            "100 unit:m"
        );
        assert_eq!(Value::Date(DatePiece::ymd(2001, 9, 11)).to_string(), "new Date ( 2001 , 9 , 11 )");
        assert_eq!(Value::count("spouse").to_string(), "count ( spouse )");
        assert_eq!(Value::Enum("female".to_string()).to_string(), "enum female");
    }

    #[test]
    fn test_subquery() {
        let sub = Expression::invocation("wd", "country").project(&["capital"]);
        let filter = BooleanExpression::ComparisonSubquery {
            lhs: Value::var_ref("id"),
            operator: Operator::Equal,
            rhs: Box::new(sub),
        };
        assert_eq!(filter.to_string(), "id == any ( [ capital ] of @wd . country ( ) )");
    }
}
