//! GROUP BY / HAVING
//!
//! Only the "subjects with at least N values" shape is understood:
//! `GROUP BY ?x HAVING (COUNT(?v) > N)` with `?v` projected by `?x`.

use super::filter::lower_operator;
use super::{ConversionContext, ConversionError, ConversionResult};
use crate::sparql::{Expression, Query, Term};
use crate::thingtalk::{AggregationOp, BooleanExpression, Value};

impl ConversionContext<'_> {
    pub fn parse_group(&mut self, query: &Query) -> ConversionResult<()> {
        let subject = match query.group_by.as_slice() {
            [] => return Ok(()),
            [variable] => variable.as_str(),
            _ => return Err(ConversionError::MultipleGrouping),
        };
        if !self.tables.contains(subject) {
            return Err(ConversionError::UnsupportedAggregation(format!(
                "grouping by ?{} which is not a subject",
                subject
            )));
        }
        for having in &query.having {
            let filter = self.parse_having(subject, having)?;
            self.add_filter(subject, filter);
        }
        Ok(())
    }

    fn parse_having(&self, subject: &str, having: &Expression) -> ConversionResult<BooleanExpression> {
        let unsupported = || ConversionError::UnsupportedAggregation(format!("{:?}", having));
        let Expression::Comparison { op, lhs, rhs } = having else {
            return Err(unsupported());
        };
        let Expression::Aggregate { name, distinct, argument } = lhs.as_ref() else {
            return Err(unsupported());
        };
        if AggregationOp::parse(name) != Some(AggregationOp::Count) || *distinct {
            return Err(unsupported());
        }
        let variable = argument
            .as_deref()
            .and_then(Expression::as_variable)
            .ok_or_else(unsupported)?;

        let projection = self
            .tables
            .get(subject)
            .and_then(|t| t.projection_of(variable))
            .ok_or_else(|| ConversionError::UnresolvedVariable(variable.to_string()))?;
        let property = projection
            .property
            .as_property()
            .ok_or_else(|| ConversionError::PropertyPathNotSupported(format!("count of ?{}", variable)))?;

        let (operator, negated) = lower_operator(*op);
        if negated {
            return Err(ConversionError::UnsupportedFilter(format!("count {}", op)));
        }
        let count = rhs
            .as_term()
            .and_then(Term::as_literal)
            .and_then(|l| l.value().parse::<f64>().ok())
            .ok_or_else(|| ConversionError::InvalidValue(format!("count bound {:?}", rhs)))?;

        Ok(BooleanExpression::Compute {
            lhs: Value::count(property),
            operator,
            rhs: Value::Number(count),
        })
    }
}
