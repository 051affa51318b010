//! Serializes arena expressions back to XPath text.

use crate::xpath::ast::{Expr, ExprArena, ExprId, InitialContext, NodeTest, PathExpr, Step, StepAxis};
use crate::xpath::parser::ParsedExpr;

/// Prints the expression rooted at `id`.
pub fn to_xpath(arena: &ExprArena, id: ExprId) -> String {
    let mut printer = Printer::new(arena, true);
    printer.expr(id);
    printer.out
}

/// Prints a path with every step predicate left out.
///
/// A filter-rooted path still prints its filter expression in full.
pub fn path_without_predicates(arena: &ExprArena, path: &PathExpr) -> String {
    let mut printer = Printer::new(arena, false);
    printer.path(path);
    printer.out
}

impl ParsedExpr {
    pub fn to_xpath(&self) -> String {
        to_xpath(&self.arena, self.root)
    }
}

struct Printer<'a> {
    arena: &'a ExprArena,
    step_predicates: bool,
    out: String,
}

impl<'a> Printer<'a> {
    fn new(arena: &'a ExprArena, step_predicates: bool) -> Self {
        Self {
            arena,
            step_predicates,
            out: String::new(),
        }
    }

    fn expr(&mut self, id: ExprId) {
        match self.arena.get(id) {
            Expr::Binary { op, left, right } => {
                self.expr(*left);
                self.out.push(' ');
                self.out.push_str(op.as_str());
                self.out.push(' ');
                self.expr(*right);
            }
            Expr::Negate(operand) => {
                self.out.push('-');
                self.expr(*operand);
            }
            Expr::Path(path) => self.path(path),
            Expr::Filter {
                primary,
                predicates,
            } => {
                self.expr(*primary);
                self.predicates(predicates);
            }
            Expr::Function { name, args } => {
                self.out.push_str(name);
                self.out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(*arg);
                }
                self.out.push(')');
            }
            Expr::Literal { value, quote } => {
                self.out.push(*quote);
                self.out.push_str(value);
                self.out.push(*quote);
            }
            Expr::Number(n) => self.out.push_str(n),
            Expr::Variable(name) => {
                self.out.push('$');
                self.out.push_str(name);
            }
            Expr::Paren(inner) => {
                self.out.push('(');
                self.expr(*inner);
                self.out.push(')');
            }
        }
    }

    fn path(&mut self, path: &PathExpr) {
        match path.initial_context {
            InitialContext::Root => self.out.push('/'),
            InitialContext::Relative => {}
            InitialContext::Expr => {
                // Predicates of the filter belong to the filter, not to a step.
                if let Some(filter) = path.filter {
                    let keep = self.step_predicates;
                    self.step_predicates = true;
                    self.expr(filter);
                    self.step_predicates = keep;
                }
                self.out.push('/');
            }
        }
        for (i, step) in path.steps.iter().enumerate() {
            if i > 0 {
                self.out.push('/');
            }
            self.step(step);
        }
    }

    fn step(&mut self, step: &Step) {
        match step.axis {
            StepAxis::Implicit => {}
            StepAxis::AttributeAbbrev => self.out.push('@'),
            StepAxis::Explicit(axis) => {
                self.out.push_str(axis.as_str());
                self.out.push_str("::");
            }
            StepAxis::SelfAbbrev => self.out.push('.'),
            StepAxis::ParentAbbrev => self.out.push_str(".."),
            StepAxis::DescendantAbbrev => {}
        }
        match &step.test {
            NodeTest::Name(name) => self.out.push_str(name),
            NodeTest::Any => self.out.push('*'),
            NodeTest::NamespaceAny(prefix) => {
                self.out.push_str(prefix);
                self.out.push_str(":*");
            }
            NodeTest::NodeType { name, literal } => {
                self.out.push_str(name);
                self.out.push('(');
                if let Some(literal) = literal {
                    self.out.push_str(literal);
                }
                self.out.push(')');
            }
            NodeTest::None => {}
        }
        if self.step_predicates {
            self.predicates(&step.predicates);
        }
    }

    fn predicates(&mut self, predicates: &[ExprId]) {
        // Expressions inside a predicate always print their own predicates.
        let keep = self.step_predicates;
        self.step_predicates = true;
        for pred in predicates {
            self.out.push('[');
            self.expr(*pred);
            self.out.push(']');
        }
        self.step_predicates = keep;
    }
}
