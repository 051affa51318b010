//! Arena-backed structural form of an XPath expression.
//!
//! Sub-expressions are addressed by [`ExprId`] handles into an [`ExprArena`].
//! Rewriting a path in place means overwriting the fields stored at its
//! handle, so every other holder of that handle observes the new path.

use std::fmt;

/// Handle to a node in an [`ExprArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Binary operators, in source spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Union,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Union => "|",
        }
    }
}

/// XPath axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Ancestor,
    AncestorOrSelf,
    Attribute,
    Child,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Namespace,
    Parent,
    Preceding,
    PrecedingSibling,
    SelfAxis,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Axis> {
        Some(match name {
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "attribute" => Axis::Attribute,
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "following" => Axis::Following,
            "following-sibling" => Axis::FollowingSibling,
            "namespace" => Axis::Namespace,
            "parent" => Axis::Parent,
            "preceding" => Axis::Preceding,
            "preceding-sibling" => Axis::PrecedingSibling,
            "self" => Axis::SelfAxis,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::Attribute => "attribute",
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Following => "following",
            Axis::FollowingSibling => "following-sibling",
            Axis::Namespace => "namespace",
            Axis::Parent => "parent",
            Axis::Preceding => "preceding",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::SelfAxis => "self",
        }
    }
}

/// How a step's axis was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepAxis {
    /// No axis given (`name`), meaning `child::`.
    Implicit,
    /// `@name`
    AttributeAbbrev,
    /// `axis::name`
    Explicit(Axis),
    /// `.`
    SelfAbbrev,
    /// `..`
    ParentAbbrev,
    /// The empty step between the slashes of `//`.
    DescendantAbbrev,
}

/// Node test of a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeTest {
    /// `name` or `prefix:name`
    Name(String),
    /// `*`
    Any,
    /// `prefix:*`
    NamespaceAny(String),
    /// `node()`, `text()`, `comment()`, `processing-instruction('x')`
    NodeType { name: String, literal: Option<String> },
    /// Abbreviated steps (`.`, `..`, `//`) carry no test of their own.
    None,
}

/// One location step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub axis: StepAxis,
    pub test: NodeTest,
    pub predicates: Vec<ExprId>,
}

impl Step {
    pub fn new(axis: StepAxis, test: NodeTest) -> Self {
        Self {
            axis,
            test,
            predicates: Vec::new(),
        }
    }
}

/// Where a path expression starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitialContext {
    /// `/...` (also `//...`, whose first step is [`StepAxis::DescendantAbbrev`])
    Root,
    /// `step/step`
    Relative,
    /// `filter/step`, the filter expression lives in [`PathExpr::filter`]
    Expr,
}

/// A location path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub initial_context: InitialContext,
    pub filter: Option<ExprId>,
    pub steps: Vec<Step>,
}

/// A node of the expression arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Negate(ExprId),
    Path(PathExpr),
    /// A primary expression followed by predicates, e.g. `$nodes[1]`.
    Filter {
        primary: ExprId,
        predicates: Vec<ExprId>,
    },
    Function {
        name: String,
        args: Vec<ExprId>,
    },
    Literal {
        value: String,
        quote: char,
    },
    /// Number literal, kept in its source spelling.
    Number(String),
    Variable(String),
    Paren(ExprId),
}

/// Storage for the nodes of one or more expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExprArena {
    nodes: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stores a node and returns its handle.
    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(expr);
        id
    }

    pub fn get(&self, id: ExprId) -> &Expr {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.nodes[id.index()]
    }

    /// Returns the path stored at `id`, if that node is a path.
    pub fn path(&self, id: ExprId) -> Option<&PathExpr> {
        match self.get(id) {
            Expr::Path(path) => Some(path),
            _ => None,
        }
    }

    /// Direct children of a node, in declaration order.
    pub fn children(&self, id: ExprId) -> Vec<ExprId> {
        match self.get(id) {
            Expr::Binary { left, right, .. } => vec![*left, *right],
            Expr::Negate(operand) | Expr::Paren(operand) => vec![*operand],
            Expr::Path(path) => path
                .filter
                .iter()
                .copied()
                .chain(path.steps.iter().flat_map(|s| s.predicates.iter().copied()))
                .collect(),
            Expr::Filter {
                primary,
                predicates,
            } => std::iter::once(*primary)
                .chain(predicates.iter().copied())
                .collect(),
            Expr::Function { args, .. } => args.clone(),
            Expr::Literal { .. } | Expr::Number(_) | Expr::Variable(_) => Vec::new(),
        }
    }

    /// Deep-copies the subtree rooted at `id` in `other` into this arena and
    /// returns the handle of the copied root.
    pub fn graft(&mut self, other: &ExprArena, id: ExprId) -> ExprId {
        let copied = match other.get(id) {
            Expr::Binary { op, left, right } => {
                let left = self.graft(other, *left);
                let right = self.graft(other, *right);
                Expr::Binary {
                    op: *op,
                    left,
                    right,
                }
            }
            Expr::Negate(operand) => Expr::Negate(self.graft(other, *operand)),
            Expr::Paren(inner) => Expr::Paren(self.graft(other, *inner)),
            Expr::Path(path) => Expr::Path(self.graft_path(other, path)),
            Expr::Filter {
                primary,
                predicates,
            } => {
                let primary = self.graft(other, *primary);
                let predicates = predicates.iter().map(|p| self.graft(other, *p)).collect();
                Expr::Filter {
                    primary,
                    predicates,
                }
            }
            Expr::Function { name, args } => {
                let args = args.iter().map(|a| self.graft(other, *a)).collect();
                Expr::Function {
                    name: name.clone(),
                    args,
                }
            }
            leaf => leaf.clone(),
        };
        self.alloc(copied)
    }

    /// Copies a path's fields from `other`, re-homing every handle it holds.
    pub fn graft_path(&mut self, other: &ExprArena, path: &PathExpr) -> PathExpr {
        let filter = path.filter.map(|f| self.graft(other, f));
        let steps = path
            .steps
            .iter()
            .map(|step| Step {
                axis: step.axis,
                test: step.test.clone(),
                predicates: step
                    .predicates
                    .iter()
                    .map(|p| self.graft(other, *p))
                    .collect(),
            })
            .collect();
        PathExpr {
            initial_context: path.initial_context,
            filter,
            steps,
        }
    }
}
