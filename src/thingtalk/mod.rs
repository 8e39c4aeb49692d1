//! Target language: expression tree, traversal, rendering and simplification

pub mod ast;
pub mod display;
pub mod optimize;
pub mod visitor;

pub use ast::{
    AggregationOp, BooleanExpression, DatePiece, Expression, Operator, PathQuantifier,
    ProjectionElement, ProjectionTarget, PropertyPath, PropertyPathElement, SortDirection, Value,
};
pub use visitor::VisitorMut;
