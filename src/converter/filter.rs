//! FILTER expressions
//!
//! A comparison between a projected variable and a constant becomes a
//! filter on the projecting table. A comparison between two variables is
//! kept as a [`Comparison`] and resolved when the tables are joined.
//! Constraints on statement values and qualifiers are folded back into
//! their reified statement instead.

use super::{Comparison, ConversionContext, ConversionError, ConversionResult, FiltersBySubject};
use crate::schema::{ValueType, GENERIC_DOMAIN};
use crate::sparql::{ComparisonOp, Expression, Term};
use crate::thingtalk::{BooleanExpression, Operator, ProjectionTarget, Value};
use futures::future::{BoxFuture, FutureExt};

/// Target operator for a source comparison, and whether the result must be
/// negated (`!=` has no direct counterpart)
pub(crate) fn lower_operator(op: ComparisonOp) -> (Operator, bool) {
    match op {
        ComparisonOp::Equal => (Operator::Equal, false),
        ComparisonOp::NotEqual => (Operator::Equal, true),
        ComparisonOp::Less | ComparisonOp::LessEqual => (Operator::LessEqual, false),
        ComparisonOp::Greater | ComparisonOp::GreaterEqual => (Operator::GreaterEqual, false),
    }
}

fn negated(op: ComparisonOp) -> ConversionResult<ComparisonOp> {
    match op {
        ComparisonOp::Equal => Ok(ComparisonOp::NotEqual),
        ComparisonOp::NotEqual => Ok(ComparisonOp::Equal),
        other => Err(ConversionError::UnsupportedFilter(format!("negated {}", other))),
    }
}

#[derive(Debug, Clone, Copy)]
enum FilterOp {
    Compare(ComparisonOp),
    Regex,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BindingKind {
    /// Projected by a table
    Basic,
    /// Value of a reified statement
    Statement,
    /// Value of a statement qualifier
    Qualifier,
}

#[derive(Debug, Clone)]
struct Binding {
    table: String,
    target: ProjectionTarget,
    kind: BindingKind,
}

fn flatten<'e>(expression: &'e Expression, conjunction: bool, out: &mut Vec<&'e Expression>) {
    match expression {
        Expression::And(a, b) if conjunction => {
            flatten(a, conjunction, out);
            flatten(b, conjunction, out);
        }
        Expression::Or(a, b) if !conjunction => {
            flatten(a, conjunction, out);
            flatten(b, conjunction, out);
        }
        other => out.push(other),
    }
}

impl<'a> ConversionContext<'a> {
    /// Where a variable is bound: table projections first, then statement
    /// values, then qualifiers
    fn find_binding(&self, variable: &str) -> Option<Binding> {
        if let Some((subject, projection)) = self.tables.find_projection(variable) {
            return Some(Binding {
                table: subject.to_string(),
                target: projection.property.clone(),
                kind: BindingKind::Basic,
            });
        }
        for predicate in &self.predicates {
            let (Some(table), Some(property)) = (&predicate.table, &predicate.property) else {
                continue;
            };
            if predicate.is_variable && predicate.value.as_deref() == Some(variable) {
                return Some(Binding {
                    table: table.clone(),
                    target: ProjectionTarget::Property(property.clone()),
                    kind: BindingKind::Statement,
                });
            }
            if let Some(qualifier) = predicate
                .qualifiers
                .iter()
                .find(|q| q.is_variable && q.value == variable)
            {
                return Some(Binding {
                    table: table.clone(),
                    target: ProjectionTarget::Property(format!("{}.{}", property, qualifier.property)),
                    kind: BindingKind::Qualifier,
                });
            }
        }
        None
    }

    /// Replace a variable statement value or qualifier with a constant
    fn constrain_statement(&mut self, variable: &str, operator: ComparisonOp, value: &str) -> bool {
        for predicate in &mut self.predicates {
            if predicate.is_variable && predicate.value.as_deref() == Some(variable) {
                predicate.is_variable = false;
                predicate.value = Some(value.to_string());
                predicate.operator = Some(operator);
                return true;
            }
            if let Some(qualifier) = predicate
                .qualifiers
                .iter_mut()
                .find(|q| q.is_variable && q.value == variable)
            {
                qualifier.is_variable = false;
                qualifier.value = value.to_string();
                qualifier.operator = operator;
                return true;
            }
        }
        false
    }

    /// Filters for one FILTER expression, grouped by subject
    pub fn parse_filter<'b>(
        &'b mut self,
        expression: &'b Expression,
        negate: bool,
    ) -> BoxFuture<'b, ConversionResult<FiltersBySubject>>
    where
        'a: 'b,
    {
        async move {
            match expression {
                Expression::Not(_) if negate => Err(ConversionError::UnsupportedFilter(
                    "nested negation".to_string(),
                )),
                Expression::Not(inner) => self.parse_filter(inner, true).await,
                Expression::And(..) => {
                    let mut operands = Vec::new();
                    flatten(expression, true, &mut operands);
                    let mut merged = FiltersBySubject::new();
                    for operand in operands {
                        merged.merge(self.parse_filter(operand, false).await?);
                    }
                    Ok(if negate {
                        merged.combine(|filters| BooleanExpression::not(BooleanExpression::and(filters)))
                    } else {
                        merged
                    })
                }
                Expression::Or(..) => {
                    let mut operands = Vec::new();
                    flatten(expression, false, &mut operands);
                    let mut merged = FiltersBySubject::new();
                    for operand in operands {
                        let parsed = self.parse_filter(operand, false).await?;
                        if parsed.is_empty() {
                            return Err(ConversionError::UnsupportedFilter(
                                "disjunct that does not constrain a table".to_string(),
                            ));
                        }
                        merged.merge(parsed.combine(BooleanExpression::and));
                    }
                    if merged.len() > 1 {
                        return Err(ConversionError::UnsupportedFilter(
                            "disjunction across subjects".to_string(),
                        ));
                    }
                    Ok(merged.combine(|filters| {
                        let disjunction = BooleanExpression::or(filters);
                        if negate {
                            BooleanExpression::not(disjunction)
                        } else {
                            disjunction
                        }
                    }))
                }
                Expression::Function { name, args } if name == "bound" && args.len() == 1 => {
                    self.parse_bound(&args[0], negate)
                }
                Expression::Function { name, args } if name == "regex" && args.len() == 2 => {
                    self.parse_comparison(FilterOp::Regex, &args[0], &args[1], negate).await
                }
                Expression::Function { name, args } => Err(ConversionError::UnsupportedFilter(format!(
                    "{} with {} argument(s)",
                    name,
                    args.len()
                ))),
                Expression::Comparison { op, lhs, rhs } => {
                    self.parse_comparison(FilterOp::Compare(*op), lhs, rhs, negate).await
                }
                other => Err(ConversionError::UnsupportedFilter(format!("{:?}", other))),
            }
        }
        .boxed()
    }

    async fn parse_comparison(
        &mut self,
        op: FilterOp,
        lhs: &Expression,
        rhs: &Expression,
        negate: bool,
    ) -> ConversionResult<FiltersBySubject> {
        let variable = lhs
            .as_variable()
            .ok_or_else(|| ConversionError::UnsupportedFilter(format!("left operand {:?}", lhs)))?;

        match rhs.as_term() {
            Some(Term::Variable(other)) => {
                let FilterOp::Compare(op) = op else {
                    return Err(ConversionError::UnsupportedFilter("regex against a variable".to_string()));
                };
                let (operator, inverted) = lower_operator(op);
                if inverted || negate {
                    return Err(ConversionError::UnsupportedFilter(format!(
                        "inequality between ?{} and ?{}",
                        variable, other
                    )));
                }
                self.comparisons.push(Comparison {
                    lhs: variable.to_string(),
                    operator,
                    rhs: other.as_str().to_string(),
                });
                Ok(FiltersBySubject::new())
            }
            Some(term @ (Term::Literal(_) | Term::Iri(_))) => {
                self.parse_constant_comparison(op, variable, term.value(), negate).await
            }
            _ => Err(ConversionError::UnsupportedFilter(format!("right operand {:?}", rhs))),
        }
    }

    async fn parse_constant_comparison(
        &mut self,
        op: FilterOp,
        variable: &str,
        value: &str,
        mut negate: bool,
    ) -> ConversionResult<FiltersBySubject> {
        if let Some(filter) = self.subject_comparison(op, variable, value).await? {
            let filter = if negate { BooleanExpression::not(filter) } else { filter };
            return Ok(FiltersBySubject::single(variable, filter));
        }

        let binding = self
            .find_binding(variable)
            .ok_or_else(|| ConversionError::UnresolvedVariable(variable.to_string()))?;
        let property = binding
            .target
            .as_property()
            .ok_or_else(|| ConversionError::PropertyPathNotSupported(format!("?{}", variable)))?
            .to_string();

        if binding.kind != BindingKind::Basic {
            let FilterOp::Compare(op) = op else {
                return Err(ConversionError::UnsupportedFilter(format!("regex on statement value ?{}", variable)));
            };
            let op = if negate { negated(op)? } else { op };
            self.constrain_statement(variable, op, value);
            return Ok(FiltersBySubject::new());
        }

        let atom = match (op, property.strip_suffix("Label")) {
            (FilterOp::Regex, base) | (FilterOp::Compare(ComparisonOp::Equal), base @ Some(_)) => {
                let base = base.unwrap_or(&property);
                self.make_atom(base, value, Some(Operator::Like), Some(&ValueType::String))
                    .await?
            }
            (FilterOp::Compare(op), _) => {
                let (operator, inverted) = lower_operator(op);
                negate ^= inverted;
                self.make_atom(&property, value, Some(operator), None).await?
            }
        };
        let filter = if negate { BooleanExpression::not(atom) } else { atom };
        Ok(FiltersBySubject::single(binding.table, filter))
    }

    /// Comparisons on a table's own subject: `?x = wd:Q42`, `regex(?x, "...")`
    async fn subject_comparison(
        &self,
        op: FilterOp,
        variable: &str,
        value: &str,
    ) -> ConversionResult<Option<BooleanExpression>> {
        let Some(table) = self.tables.get(variable) else {
            return Ok(None);
        };
        match op {
            FilterOp::Regex => Ok(Some(BooleanExpression::atom(
                "id",
                Operator::Like,
                Value::String(value.to_string()),
            ))),
            FilterOp::Compare(ComparisonOp::Equal) => {
                let domain = if self.schema.is_domain(&table.name) {
                    table.name.as_str()
                } else {
                    GENERIC_DOMAIN
                };
                let entity_type = ValueType::Entity(self.schema.entity_type(domain));
                let value = self.convert_value(value, &entity_type).await?;
                Ok(Some(BooleanExpression::atom("id", Operator::Equal, value)))
            }
            FilterOp::Compare(other) => Err(ConversionError::UnsupportedFilter(format!(
                "?{} {} constant",
                variable, other
            ))),
        }
    }

    fn parse_bound(&mut self, argument: &Expression, negate: bool) -> ConversionResult<FiltersBySubject> {
        let variable = argument
            .as_variable()
            .ok_or_else(|| ConversionError::UnsupportedFilter(format!("bound on {:?}", argument)))?;
        let binding = self
            .find_binding(variable)
            .ok_or_else(|| ConversionError::UnresolvedVariable(variable.to_string()))?;
        if binding.kind != BindingKind::Basic {
            return Err(ConversionError::UnsupportedFilter(format!("bound on statement value ?{}", variable)));
        }
        let filter = if negate {
            self.null_check(&binding.target)
        } else {
            self.not_null_check(&binding.target)
        };
        Ok(FiltersBySubject::single(binding.table, filter))
    }

    /// True when the projected target has no value
    pub(crate) fn null_check(&self, target: &ProjectionTarget) -> BooleanExpression {
        match target {
            ProjectionTarget::Property(name) if self.schema.is_array_property(name) => BooleanExpression::Compute {
                lhs: Value::count(name.as_str()),
                operator: Operator::Equal,
                rhs: Value::Number(0.0),
            },
            ProjectionTarget::Property(name) => BooleanExpression::atom(name.as_str(), Operator::Equal, Value::Null),
            ProjectionTarget::Path(path) => BooleanExpression::PropertyPath {
                path: path.clone(),
                operator: Operator::Equal,
                value: Value::Null,
            },
            ProjectionTarget::Value(value) => BooleanExpression::Compute {
                lhs: value.clone(),
                operator: Operator::Equal,
                rhs: Value::Null,
            },
        }
    }

    /// True when the projected target has a value
    pub(crate) fn not_null_check(&self, target: &ProjectionTarget) -> BooleanExpression {
        match target {
            ProjectionTarget::Property(name) if self.schema.is_array_property(name) => BooleanExpression::Compute {
                lhs: Value::count(name.as_str()),
                operator: Operator::GreaterEqual,
                rhs: Value::Number(1.0),
            },
            other => BooleanExpression::not(self.null_check(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::test_support::{kb, schema};
    use crate::converter::{ConverterOptions, Projection};
    use crate::sparql::{parse_query, GraphPattern};
    use crate::thingtalk::DatePiece;

    fn filter_expression(sparql: &str) -> Expression {
        let query = parse_query(sparql).unwrap();
        query
            .where_clause
            .into_iter()
            .find_map(|p| match p {
                GraphPattern::Filter(e) => Some(e),
                _ => None,
            })
            .unwrap()
    }

    fn context<'a>(
        schema: &'a crate::schema::Schema,
        kb: &'a crate::kb::InMemoryKnowledgeBase,
        options: &'a ConverterOptions,
    ) -> ConversionContext<'a> {
        let mut context = ConversionContext::new(schema, kb, options, "");
        context.set_domain("x", "Q5");
        context.add_projection("x", Projection::property("date_of_birth", "d"));
        context.add_projection("x", Projection::property("occupation", "o"));
        context.add_projection("x", Projection::property("place_of_birthLabel", "pl"));
        context
    }

    #[test]
    fn test_lower_operator() {
        assert_eq!(lower_operator(ComparisonOp::Greater), (Operator::GreaterEqual, false));
        assert_eq!(lower_operator(ComparisonOp::Less), (Operator::LessEqual, false));
        assert_eq!(lower_operator(ComparisonOp::NotEqual), (Operator::Equal, true));
    }

    #[tokio::test]
    async fn test_date_comparison() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = context(&schema, &kb, &options);
        let expression = filter_expression(
            r#"SELECT ?x WHERE { FILTER(?d > "1950-01-01T00:00:00Z"^^xsd:dateTime) }"#,
        );
        let filters = context.parse_filter(&expression, false).await.unwrap();
        assert_eq!(
            filters.get("x").unwrap(),
            &[BooleanExpression::atom(
                "date_of_birth",
                Operator::GreaterEqual,
                Value::Date(DatePiece::ymd(1950, 1, 1))
            )]
        );
    }

    #[tokio::test]
    async fn test_not_equal_is_negated_equality() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = context(&schema, &kb, &options);
        let expression = filter_expression(r#"SELECT ?x WHERE { FILTER(?d != "1950") }"#);
        let filters = context.parse_filter(&expression, false).await.unwrap();
        assert_eq!(filters.get("x").unwrap()[0].to_string(), "! date_of_birth == new Date ( 1950 )");

        let expression = filter_expression(r#"SELECT ?x WHERE { FILTER(!(?d != "1950")) }"#);
        let filters = context.parse_filter(&expression, false).await.unwrap();
        assert_eq!(filters.get("x").unwrap()[0].to_string(), "date_of_birth == new Date ( 1950 )");
    }

    #[tokio::test]
    async fn test_only_one_negation_level() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = context(&schema, &kb, &options);
        for sparql in [
            "SELECT ?x WHERE { FILTER(!!BOUND(?d)) }",
            "SELECT ?x WHERE { FILTER(!(!BOUND(?o))) }",
        ] {
            let expression = filter_expression(sparql);
            assert!(
                matches!(
                    context.parse_filter(&expression, false).await,
                    Err(ConversionError::UnsupportedFilter(_))
                ),
                "{}",
                sparql
            );
        }

        let expression = filter_expression(r#"SELECT ?x WHERE { FILTER(!(?d < "1900" && !BOUND(?o))) }"#);
        let filters = context.parse_filter(&expression, false).await.unwrap();
        assert_eq!(
            filters.get("x").unwrap()[0].to_string(),
            "! ( date_of_birth <= new Date ( 1900 ) && count ( occupation ) == 0 )"
        );
    }

    #[tokio::test]
    async fn test_bound() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = context(&schema, &kb, &options);

        let expression = filter_expression("SELECT ?x WHERE { FILTER(BOUND(?o)) }");
        let filters = context.parse_filter(&expression, false).await.unwrap();
        assert_eq!(filters.get("x").unwrap()[0].to_string(), "count ( occupation ) >= 1");

        let expression = filter_expression("SELECT ?x WHERE { FILTER(!BOUND(?o)) }");
        let filters = context.parse_filter(&expression, false).await.unwrap();
        assert_eq!(filters.get("x").unwrap()[0].to_string(), "count ( occupation ) == 0");

        let expression = filter_expression("SELECT ?x WHERE { FILTER(!BOUND(?d)) }");
        let filters = context.parse_filter(&expression, false).await.unwrap();
        assert_eq!(filters.get("x").unwrap()[0].to_string(), "date_of_birth == null");

        let expression = filter_expression("SELECT ?x WHERE { FILTER(BOUND(?d)) }");
        let filters = context.parse_filter(&expression, false).await.unwrap();
        assert_eq!(filters.get("x").unwrap()[0].to_string(), "! date_of_birth == null");
    }

    #[tokio::test]
    async fn test_regex_on_label_projection() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = context(&schema, &kb, &options);
        let expression = filter_expression(r#"SELECT ?x WHERE { FILTER(regex(?pl, "York")) }"#);
        let filters = context.parse_filter(&expression, false).await.unwrap();
        assert_eq!(filters.get("x").unwrap()[0].to_string(), "place_of_birth =~ \" York \"");
    }

    #[tokio::test]
    async fn test_disjunction_on_one_subject() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = context(&schema, &kb, &options);
        let expression = filter_expression(r#"SELECT ?x WHERE { FILTER(?d < "1900" || ?d > "2000") }"#);
        let filters = context.parse_filter(&expression, false).await.unwrap();
        assert_eq!(
            filters.get("x").unwrap()[0].to_string(),
            "date_of_birth <= new Date ( 1900 ) || date_of_birth >= new Date ( 2000 )"
        );
    }

    #[tokio::test]
    async fn test_variable_comparison_is_deferred() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = context(&schema, &kb, &options);
        let expression = filter_expression("SELECT ?x WHERE { FILTER(?d < ?other) }");
        let filters = context.parse_filter(&expression, false).await.unwrap();
        assert!(filters.is_empty());
        assert_eq!(
            context.comparisons,
            vec![Comparison {
                lhs: "d".to_string(),
                operator: Operator::LessEqual,
                rhs: "other".to_string()
            }]
        );

        let expression = filter_expression("SELECT ?x WHERE { FILTER(?d != ?other) }");
        assert!(matches!(
            context.parse_filter(&expression, false).await,
            Err(ConversionError::UnsupportedFilter(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_forms() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = context(&schema, &kb, &options);
        let expression = filter_expression(r#"SELECT ?x WHERE { FILTER(regex(?pl, "york", "i")) }"#);
        assert!(matches!(
            context.parse_filter(&expression, false).await,
            Err(ConversionError::UnsupportedFilter(_))
        ));
        let expression = filter_expression(r#"SELECT ?x WHERE { FILTER(?nowhere = "1") }"#);
        assert!(matches!(
            context.parse_filter(&expression, false).await,
            Err(ConversionError::UnresolvedVariable(v)) if v == "nowhere"
        ));
    }
}
