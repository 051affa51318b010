//! Logic properties: expression wrappers, rename matching and the
//! reference graph that keeps cross-references consistent.

pub mod expression;
pub mod path_match;
pub mod references;

pub use expression::{ExpressionStatus, LogicExpression};
pub use path_match::{MatchMode, PathMatcher};
pub use references::{Reference, ReferenceGraph, RenameEntry, RenameMap};
