//! XPath 1.0 expressions: tokenizer, parser, arena representation and
//! printer.
//!
//! The arena form lets a caller rewrite one path sub-expression in place
//! while every other holder of its [`ExprId`] keeps seeing the same node.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;

pub use ast::{
    Axis, BinaryOp, Expr, ExprArena, ExprId, InitialContext, NodeTest, PathExpr, Step, StepAxis,
};
pub use parser::{parse, ParsedExpr};
pub use printer::{path_without_predicates, to_xpath};
