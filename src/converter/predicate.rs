//! Reified statements
//!
//! `?x p:P39 ?s . ?s ps:P39 wd:Q11696 . ?s pq:P580 ?start` describes one
//! statement in three triples. The triples are merged into a [`Predicate`]
//! as they are seen, and converted once the whole WHERE clause (filters
//! included) has been read.

use super::filter::lower_operator;
use super::triple::subject_key;
use super::{ConversionContext, ConversionError, ConversionResult, Predicate, Projection, Qualifier};
use crate::sparql::namespace::{is_qualifier_property, is_statement_property, local_id};
use crate::sparql::{ComparisonOp, Term};
use crate::thingtalk::{BooleanExpression, Operator, ProjectionTarget, Value};
use tracing::debug;

fn variable_of(term: &Term, role: &str) -> ConversionResult<String> {
    term.as_variable()
        .map(str::to_string)
        .ok_or_else(|| ConversionError::UnsupportedTriple(format!("{} of a statement must be a variable: {}", role, term)))
}

impl ConversionContext<'_> {
    /// Record one `p:`, `ps:` or `pq:` triple
    pub(crate) fn parse_predicate(&mut self, subject: &Term, predicate: &str, object: &Term) -> ConversionResult<()> {
        let property = self
            .schema
            .get_property(local_id(predicate))
            .ok_or_else(|| ConversionError::UnknownProperty(predicate.to_string()))?
            .to_string();

        let update = if is_qualifier_property(predicate) {
            Predicate {
                predicate_variable: Some(variable_of(subject, "subject")?),
                qualifiers: vec![Qualifier {
                    property,
                    operator: ComparisonOp::Equal,
                    value: object.value().to_string(),
                    is_variable: object.is_variable(),
                }],
                ..Default::default()
            }
        } else if is_statement_property(predicate) {
            Predicate {
                property: Some(property),
                predicate_variable: Some(variable_of(subject, "subject")?),
                value: Some(object.value().to_string()),
                is_variable: object.is_variable(),
                ..Default::default()
            }
        } else {
            Predicate {
                table: Some(subject_key(subject)?),
                property: Some(property),
                predicate_variable: Some(variable_of(object, "object")?),
                ..Default::default()
            }
        };
        self.add_or_update_predicate(update);
        Ok(())
    }

    pub async fn convert_predicates(&mut self) -> ConversionResult<()> {
        let predicates = std::mem::take(&mut self.predicates);
        for predicate in &predicates {
            self.convert_predicate(predicate).await?;
        }
        self.predicates = predicates;
        Ok(())
    }

    async fn qualifier_atom(&self, name: &str, field: &str, qualifier: &Qualifier) -> ConversionResult<BooleanExpression> {
        let field_type = self
            .schema
            .get_property_type(field)
            .cloned()
            .ok_or_else(|| ConversionError::UnknownProperty(field.to_string()))?;
        let (operator, negate) = lower_operator(qualifier.operator);
        let atom = self
            .make_typed_atom(name, &field_type, &qualifier.value, Some(operator), None)
            .await?;
        Ok(if negate { BooleanExpression::not(atom) } else { atom })
    }

    async fn convert_predicate(&mut self, predicate: &Predicate) -> ConversionResult<()> {
        let describe = || {
            predicate
                .predicate_variable
                .clone()
                .or_else(|| predicate.property.clone())
                .unwrap_or_default()
        };
        let table = predicate
            .table
            .clone()
            .ok_or_else(|| ConversionError::IncompletePredicate(describe()))?;
        let property = predicate
            .property
            .clone()
            .ok_or_else(|| ConversionError::IncompletePredicate(describe()))?;
        let property_type = self
            .schema
            .get_property_type(&property)
            .cloned()
            .ok_or_else(|| ConversionError::UnknownProperty(property.clone()))?;
        debug!("Statement {} on {}: {:?}", property, table, predicate);

        let (operator, negate) = lower_operator(predicate.operator.unwrap_or(ComparisonOp::Equal));

        // a plain statement reads like the direct property
        if predicate.qualifiers.is_empty() {
            match (&predicate.value, predicate.is_variable) {
                (Some(variable), true) => {
                    self.add_projection(&table, Projection::property(property, variable.as_str()));
                }
                (Some(value), false) => {
                    let atom = self
                        .make_typed_atom(&property, &property_type, value, Some(operator), None)
                        .await?;
                    let atom = if negate { BooleanExpression::not(atom) } else { atom };
                    self.add_filter(&table, atom);
                }
                (None, _) => {}
            }
            return Ok(());
        }

        let mut filters = Vec::new();
        for qualifier in &predicate.qualifiers {
            let field = format!("{}.{}", property, qualifier.property);
            if qualifier.is_variable {
                self.add_projection(&table, Projection::property(field, qualifier.value.as_str()));
                continue;
            }
            let name = if predicate.value.is_some() {
                qualifier.property.as_str()
            } else {
                field.as_str()
            };
            filters.push(self.qualifier_atom(name, &field, qualifier).await?);
        }

        let Some(value) = &predicate.value else {
            for filter in filters {
                self.add_filter(&table, filter);
            }
            return Ok(());
        };

        let element = |filters: Vec<BooleanExpression>| {
            if filters.is_empty() {
                Value::var_ref(property.as_str())
            } else {
                Value::filtered(Value::var_ref(property.as_str()), BooleanExpression::and(filters))
            }
        };

        if predicate.is_variable {
            self.add_projection(
                &table,
                Projection::new(ProjectionTarget::Value(element(filters)), value.as_str()),
            );
            return Ok(());
        }

        let value = self.convert_value(value, property_type.elem_type()).await?;
        let prefix = format!("{}.", property);
        let fields: Vec<(String, String)> = self
            .tables
            .get(&table)
            .map(|t| {
                t.projections
                    .iter()
                    .filter_map(|p| {
                        let field = p.property.as_property()?.strip_prefix(&prefix)?;
                        Some((field.to_string(), p.variable.clone()?))
                    })
                    .collect()
            })
            .unwrap_or_default();

        // `?s ps:P39 wd:Q11696 ; pq:P580 ?start`: the start time of that position
        if !fields.is_empty() {
            filters.push(BooleanExpression::atom("value", Operator::Equal, value));
            let filtered = element(filters);
            for (field, variable) in fields {
                self.tables.remove_projection(&table, &variable);
                let target = ProjectionTarget::Value(Value::ArrayField {
                    value: Box::new(filtered.clone()),
                    field,
                });
                self.add_projection(&table, Projection::new(target, variable));
            }
            return Ok(());
        }

        let operator = match operator {
            Operator::Equal if property_type.is_array() => Operator::Contains,
            other => other,
        };
        let compute = BooleanExpression::Compute {
            lhs: element(filters),
            operator,
            rhs: value,
        };
        self.add_filter(&table, if negate { BooleanExpression::not(compute) } else { compute });
        Ok(())
    }
}
