//! In-place traversal of expression trees
//!
//! Implementors override the hooks they care about and call the matching
//! `walk_*` function to continue into children. Hooks run before their
//! children unless the implementor walks first.

use super::ast::*;

pub trait VisitorMut {
    fn visit_expression(&mut self, expression: &mut Expression) {
        walk_expression(self, expression);
    }

    fn visit_boolean_expression(&mut self, filter: &mut BooleanExpression) {
        walk_boolean_expression(self, filter);
    }

    fn visit_value(&mut self, value: &mut Value) {
        walk_value(self, value);
    }

    fn visit_projection_element(&mut self, element: &mut ProjectionElement) {
        walk_projection_element(self, element);
    }

    fn visit_property_path_element(&mut self, _element: &mut PropertyPathElement) {}
}

pub fn walk_expression<V: VisitorMut + ?Sized>(visitor: &mut V, expression: &mut Expression) {
    match expression {
        Expression::Invocation { .. } => {}
        Expression::Filter { expression, filter } | Expression::BooleanQuestion { expression, filter } => {
            visitor.visit_expression(expression);
            visitor.visit_boolean_expression(filter);
        }
        Expression::Projection { expression, elements } => {
            visitor.visit_expression(expression);
            for element in elements {
                visitor.visit_projection_element(element);
            }
        }
        Expression::Sort { expression, value, .. } => {
            visitor.visit_expression(expression);
            visitor.visit_value(value);
        }
        Expression::Index { expression, indices } => {
            visitor.visit_expression(expression);
            for index in indices {
                visitor.visit_value(index);
            }
        }
        Expression::Slice { expression, base, limit } => {
            visitor.visit_expression(expression);
            visitor.visit_value(base);
            visitor.visit_value(limit);
        }
        Expression::Aggregation { expression, .. } => visitor.visit_expression(expression),
    }
}

pub fn walk_boolean_expression<V: VisitorMut + ?Sized>(visitor: &mut V, filter: &mut BooleanExpression) {
    match filter {
        BooleanExpression::True | BooleanExpression::False => {}
        BooleanExpression::And(operands) | BooleanExpression::Or(operands) => {
            for operand in operands {
                visitor.visit_boolean_expression(operand);
            }
        }
        BooleanExpression::Not(inner) => visitor.visit_boolean_expression(inner),
        BooleanExpression::Atom { value, .. } => visitor.visit_value(value),
        BooleanExpression::Compute { lhs, rhs, .. } => {
            visitor.visit_value(lhs);
            visitor.visit_value(rhs);
        }
        BooleanExpression::PropertyPath { path, value, .. } => {
            for element in path {
                visitor.visit_property_path_element(element);
            }
            visitor.visit_value(value);
        }
        BooleanExpression::ComparisonSubquery { lhs, rhs, .. } => {
            visitor.visit_value(lhs);
            visitor.visit_expression(rhs);
        }
    }
}

pub fn walk_value<V: VisitorMut + ?Sized>(visitor: &mut V, value: &mut Value) {
    match value {
        Value::Computation { operands, .. } => {
            for operand in operands {
                visitor.visit_value(operand);
            }
        }
        Value::Filter { value, filter } => {
            visitor.visit_value(value);
            visitor.visit_boolean_expression(filter);
        }
        Value::ArrayField { value, .. } => visitor.visit_value(value),
        _ => {}
    }
}

pub fn walk_projection_element<V: VisitorMut + ?Sized>(visitor: &mut V, element: &mut ProjectionElement) {
    match &mut element.target {
        ProjectionTarget::Property(_) => {}
        ProjectionTarget::Path(path) => {
            for step in path {
                visitor.visit_property_path_element(step);
            }
        }
        ProjectionTarget::Value(value) => visitor.visit_value(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct VarRefCollector(Vec<String>);

    impl VisitorMut for VarRefCollector {
        fn visit_value(&mut self, value: &mut Value) {
            if let Value::VarRef(name) = value {
                self.0.push(name.clone());
            }
            walk_value(self, value);
        }
    }

    #[test]
    fn test_walk_reaches_nested_values() {
        let mut expr = Expression::invocation("wd", "human").filter(BooleanExpression::And(vec![
            BooleanExpression::Compute {
                lhs: Value::count("spouse"),
                operator: Operator::GreaterEqual,
                rhs: Value::Number(2.0),
            },
            BooleanExpression::not(BooleanExpression::Compute {
                lhs: Value::filtered(
                    Value::var_ref("position_held"),
                    BooleanExpression::atom("value", Operator::Equal, Value::Null),
                ),
                operator: Operator::Equal,
                rhs: Value::Null,
            }),
        ]));
        let mut collector = VarRefCollector::default();
        collector.visit_expression(&mut expr);
        assert_eq!(collector.0, vec!["spouse", "position_held"]);
    }
}
