//! Structural simplification
//!
//! Flattens nested conjunctions and disjunctions, unwraps single-operand
//! ones, cancels double negation and drops trivially true filters.

use std::mem;

use super::ast::*;
use super::visitor::{walk_boolean_expression, walk_expression, VisitorMut};

struct Optimizer;

fn flatten(operands: Vec<BooleanExpression>, conjunction: bool) -> Vec<BooleanExpression> {
    let mut flat = Vec::with_capacity(operands.len());
    for operand in operands {
        match operand {
            BooleanExpression::And(inner) if conjunction => flat.extend(inner),
            BooleanExpression::Or(inner) if !conjunction => flat.extend(inner),
            BooleanExpression::True if conjunction => {}
            BooleanExpression::False if !conjunction => {}
            other => flat.push(other),
        }
    }
    flat
}

fn simplify(filter: BooleanExpression) -> BooleanExpression {
    match filter {
        BooleanExpression::And(operands) => {
            let operands = flatten(operands, true);
            if operands.contains(&BooleanExpression::False) {
                return BooleanExpression::False;
            }
            BooleanExpression::and(operands)
        }
        BooleanExpression::Or(operands) => {
            let operands = flatten(operands, false);
            if operands.contains(&BooleanExpression::True) {
                return BooleanExpression::True;
            }
            BooleanExpression::or(operands)
        }
        BooleanExpression::Not(inner) => match *inner {
            BooleanExpression::Not(inner) => *inner,
            BooleanExpression::True => BooleanExpression::False,
            BooleanExpression::False => BooleanExpression::True,
            other => BooleanExpression::not(other),
        },
        other => other,
    }
}

impl VisitorMut for Optimizer {
    fn visit_expression(&mut self, expression: &mut Expression) {
        walk_expression(self, expression);
        if let Expression::Filter { filter: BooleanExpression::True, expression: inner } = expression {
            let inner = mem::replace(inner.as_mut(), Expression::invocation("", ""));
            *expression = inner;
        }
    }

    fn visit_boolean_expression(&mut self, filter: &mut BooleanExpression) {
        walk_boolean_expression(self, filter);
        let owned = mem::replace(filter, BooleanExpression::True);
        *filter = simplify(owned);
    }
}

impl Expression {
    /// Simplify the tree bottom-up
    pub fn optimize(mut self) -> Self {
        Optimizer.visit_expression(&mut self);
        self
    }
}

impl BooleanExpression {
    /// Simplify the filter bottom-up
    pub fn optimize(mut self) -> Self {
        Optimizer.visit_boolean_expression(&mut self);
        self
    }
}
