//! Date range folding
//!
//! `start_time >= new Date ( 1990 ) && end_time <= new Date ( 1991 )` spans
//! exactly one year and is rewritten to `point_in_time == new Date ( 1990 )`.

use crate::thingtalk::visitor::{walk_boolean_expression, VisitorMut};
use crate::thingtalk::{BooleanExpression, DatePiece, Operator, Value};

const DATE_FIELDS: [&str; 3] = ["start_time", "end_time", "point_in_time"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

struct Endpoint<'e> {
    property: &'e str,
    side: Side,
    date: &'e DatePiece,
}

fn endpoint(filter: &BooleanExpression) -> Option<Endpoint<'_>> {
    let BooleanExpression::Atom {
        name,
        operator,
        value: Value::Date(date),
    } = filter
    else {
        return None;
    };
    if !DATE_FIELDS.contains(&name.as_str()) {
        return None;
    }
    let side = match operator {
        Operator::GreaterEqual => Side::Left,
        Operator::LessEqual => Side::Right,
        _ => return None,
    };
    Some(Endpoint {
        property: name,
        side,
        date,
    })
}

/// The single-year filter equivalent to a pair of bounds, if any
fn fold(first: &BooleanExpression, second: &BooleanExpression) -> Option<BooleanExpression> {
    let (a, b) = (endpoint(first)?, endpoint(second)?);
    let (left, right) = match (a.side, b.side) {
        (Side::Left, Side::Right) => (a, b),
        (Side::Right, Side::Left) => (b, a),
        _ => return None,
    };
    let paired = matches!(
        (left.property, right.property),
        ("point_in_time", "point_in_time") | ("start_time", "end_time") | ("end_time", "start_time")
    );
    if !paired {
        return None;
    }
    let (from, to) = (left.date.as_whole_year()?, right.date.as_whole_year()?);
    if from + 1 != to {
        return None;
    }
    Some(BooleanExpression::atom(
        "point_in_time",
        Operator::Equal,
        Value::Date(*left.date),
    ))
}

pub struct DateRangeFolder;

impl VisitorMut for DateRangeFolder {
    fn visit_boolean_expression(&mut self, filter: &mut BooleanExpression) {
        walk_boolean_expression(self, filter);
        let BooleanExpression::And(operands) = filter else {
            return;
        };
        let (candidates, mut rest): (Vec<BooleanExpression>, Vec<BooleanExpression>) =
            std::mem::take(operands).into_iter().partition(|o| endpoint(o).is_some());
        match candidates.as_slice() {
            [first, second] => match fold(first, second) {
                Some(folded) => rest.push(folded),
                None => rest.extend(candidates),
            },
            _ => rest.extend(candidates),
        }
        *operands = rest;
    }
}
