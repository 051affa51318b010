//! Recursive-descent parser for XPath 1.0 expressions.

use crate::error::ParseError;
use crate::xpath::ast::{
    Axis, BinaryOp, Expr, ExprArena, ExprId, InitialContext, NodeTest, PathExpr, Step, StepAxis,
};
use crate::xpath::lexer::{tokenize, Spanned, Token};

const NODE_TYPES: &[&str] = &["node", "text", "comment", "processing-instruction"];

/// A parsed expression: its arena and the handle of the root node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExpr {
    pub arena: ExprArena,
    pub root: ExprId,
}

/// Parses an XPath expression.
pub fn parse(src: &str) -> Result<ParsedExpr, ParseError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        arena: ExprArena::new(),
    };
    let root = parser.parse_or()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(ParseError::TrailingInput {
            found: extra.token.describe(),
            offset: extra.offset,
        });
    }
    Ok(ParsedExpr {
        arena: parser.arena,
        root,
    })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    arena: ExprArena,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(spanned) => ParseError::UnexpectedToken {
                found: spanned.token.describe(),
                offset: spanned.offset,
                expected,
            },
            None => ParseError::UnexpectedEnd { context: expected },
        }
    }

    fn expect(&mut self, expected: Token, context: &'static str) -> Result<(), ParseError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(context))
        }
    }

    fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.arena.alloc(Expr::Binary { op, left, right })
    }

    // =========================================================================
    // Operators, lowest precedence first
    // =========================================================================

    fn parse_or(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = self.binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = self.binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = self.binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::LtEq) => BinaryOp::LtEq,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::GtEq) => BinaryOp::GtEq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = self.binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Multiply) => BinaryOp::Mul,
                Some(Token::Div) => BinaryOp::Div,
                Some(Token::Mod) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = self.binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<ExprId, ParseError> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(self.arena.alloc(Expr::Negate(operand)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_path()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_path()?;
            left = self.binary(BinaryOp::Union, left, right);
        }
        Ok(left)
    }

    // =========================================================================
    // Paths
    // =========================================================================

    fn starts_filter_expr(&self) -> bool {
        match self.peek() {
            Some(Token::Variable(_) | Token::LParen | Token::Literal { .. } | Token::Number(_)) => {
                true
            }
            Some(Token::Name(name)) => {
                self.peek_nth(1) == Some(&Token::LParen) && !NODE_TYPES.contains(&name.as_str())
            }
            _ => false,
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Name(_)
                    | Token::Star
                    | Token::NamespaceWildcard(_)
                    | Token::At
                    | Token::Dot
                    | Token::DotDot
            )
        )
    }

    fn parse_path(&mut self) -> Result<ExprId, ParseError> {
        if self.starts_filter_expr() {
            let filter = self.parse_filter()?;
            let mut steps = Vec::new();
            if !self.parse_separator_into(&mut steps) {
                return Ok(filter);
            }
            self.parse_relative_into(&mut steps)?;
            return Ok(self.arena.alloc(Expr::Path(PathExpr {
                initial_context: InitialContext::Expr,
                filter: Some(filter),
                steps,
            })));
        }

        let mut steps = Vec::new();
        let initial_context = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if self.starts_step() {
                    self.parse_relative_into(&mut steps)?;
                }
                InitialContext::Root
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::new(StepAxis::DescendantAbbrev, NodeTest::None));
                self.parse_relative_into(&mut steps)?;
                InitialContext::Root
            }
            _ => {
                self.parse_relative_into(&mut steps)?;
                InitialContext::Relative
            }
        };
        Ok(self.arena.alloc(Expr::Path(PathExpr {
            initial_context,
            filter: None,
            steps,
        })))
    }

    /// Consumes a `/` or `//` separator, pushing the implied step for `//`.
    fn parse_separator_into(&mut self, steps: &mut Vec<Step>) -> bool {
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::new(StepAxis::DescendantAbbrev, NodeTest::None));
                true
            }
            _ => false,
        }
    }

    fn parse_relative_into(&mut self, steps: &mut Vec<Step>) -> Result<(), ParseError> {
        steps.push(self.parse_step()?);
        while self.parse_separator_into(steps) {
            steps.push(self.parse_step()?);
        }
        Ok(())
    }

    fn parse_step(&mut self) -> Result<Step, ParseError> {
        if self.eat(&Token::Dot) {
            return Ok(Step::new(StepAxis::SelfAbbrev, NodeTest::None));
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step::new(StepAxis::ParentAbbrev, NodeTest::None));
        }

        let axis = if self.eat(&Token::At) {
            StepAxis::AttributeAbbrev
        } else if let (Some(Token::Name(name)), Some(Token::DoubleColon)) =
            (self.peek(), self.peek_nth(1))
        {
            let offset = self.tokens[self.pos].offset;
            let axis = Axis::from_name(name).ok_or_else(|| ParseError::UnknownAxis {
                name: name.clone(),
                offset,
            })?;
            self.pos += 2;
            StepAxis::Explicit(axis)
        } else {
            StepAxis::Implicit
        };

        let test = self.parse_node_test()?;
        let mut step = Step::new(axis, test);
        while self.peek() == Some(&Token::LBracket) {
            step.predicates.push(self.parse_predicate()?);
        }
        Ok(step)
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, ParseError> {
        match self.peek().cloned() {
            Some(Token::Star) => {
                self.pos += 1;
                Ok(NodeTest::Any)
            }
            Some(Token::NamespaceWildcard(prefix)) => {
                self.pos += 1;
                Ok(NodeTest::NamespaceAny(prefix))
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                if NODE_TYPES.contains(&name.as_str()) && self.eat(&Token::LParen) {
                    let literal = match self.peek() {
                        Some(Token::Literal { value, quote }) => {
                            let raw = format!("{quote}{value}{quote}");
                            self.pos += 1;
                            Some(raw)
                        }
                        _ => None,
                    };
                    self.expect(Token::RParen, "')' closing node type test")?;
                    Ok(NodeTest::NodeType { name, literal })
                } else {
                    Ok(NodeTest::Name(name))
                }
            }
            _ => Err(self.unexpected("a node test")),
        }
    }

    fn parse_predicate(&mut self) -> Result<ExprId, ParseError> {
        self.expect(Token::LBracket, "'['")?;
        let expr = self.parse_or()?;
        self.expect(Token::RBracket, "']' closing predicate")?;
        Ok(expr)
    }

    // =========================================================================
    // Primary expressions
    // =========================================================================

    fn parse_filter(&mut self) -> Result<ExprId, ParseError> {
        let primary = self.parse_primary()?;
        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            predicates.push(self.parse_predicate()?);
        }
        if predicates.is_empty() {
            Ok(primary)
        } else {
            Ok(self.arena.alloc(Expr::Filter {
                primary,
                predicates,
            }))
        }
    }

    fn parse_primary(&mut self) -> Result<ExprId, ParseError> {
        let expr = match self.advance() {
            Some(Token::Variable(name)) => Expr::Variable(name),
            Some(Token::Number(n)) => Expr::Number(n),
            Some(Token::Literal { value, quote }) => Expr::Literal { value, quote },
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')' closing parenthesis")?;
                Expr::Paren(inner)
            }
            Some(Token::Name(name)) => {
                self.expect(Token::LParen, "'(' after function name")?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RParen, "')' closing argument list")?;
                        break;
                    }
                }
                Expr::Function { name, args }
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                return Err(self.unexpected("an expression"));
            }
        };
        Ok(self.arena.alloc(expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute_path() {
        let parsed = parse("/data/age").unwrap();
        let path = parsed.arena.path(parsed.root).unwrap();
        assert_eq!(path.initial_context, InitialContext::Root);
        assert_eq!(path.steps.len(), 2);
        assert_eq!(path.steps[1].test, NodeTest::Name("age".into()));
    }

    #[test]
    fn test_parse_precedence() {
        let parsed = parse("1 + 2 * 3 = 7 and /a or false()").unwrap();
        match parsed.arena.get(parsed.root) {
            Expr::Binary { op, left, .. } => {
                assert_eq!(*op, BinaryOp::Or);
                assert!(matches!(
                    parsed.arena.get(*left),
                    Expr::Binary {
                        op: BinaryOp::And,
                        ..
                    }
                ));
            }
            other => panic!("Expected Binary, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_filter_rooted_path() {
        let parsed = parse("instance('casedb')/casedb/case[@id = /data/id]/name").unwrap();
        let path = parsed.arena.path(parsed.root).unwrap();
        assert_eq!(path.initial_context, InitialContext::Expr);
        assert!(path.filter.is_some());
        assert_eq!(path.steps.len(), 3);
        assert_eq!(path.steps[1].predicates.len(), 1);
    }

    #[test]
    fn test_parse_descendant_and_abbreviations() {
        let parsed = parse("//item/../@value").unwrap();
        let path = parsed.arena.path(parsed.root).unwrap();
        assert_eq!(path.initial_context, InitialContext::Root);
        assert_eq!(path.steps[0].axis, StepAxis::DescendantAbbrev);
        assert_eq!(path.steps[2].axis, StepAxis::ParentAbbrev);
        assert_eq!(path.steps[3].axis, StepAxis::AttributeAbbrev);
    }

    #[test]
    fn test_parse_node_type_is_step_not_function() {
        let parsed = parse("text()").unwrap();
        assert!(parsed.arena.path(parsed.root).is_some());
        let parsed = parse("string(.)").unwrap();
        assert!(matches!(
            parsed.arena.get(parsed.root),
            Expr::Function { .. }
        ));
    }

    #[test]
    fn test_parse_root_only() {
        let parsed = parse("/").unwrap();
        let path = parsed.arena.path(parsed.root).unwrap();
        assert!(path.steps.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert!(matches!(
            parse("/data/age >"),
            Err(ParseError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            parse("(1 + 2"),
            Err(ParseError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            parse("a b"),
            Err(ParseError::TrailingInput { .. })
        ));
        assert!(matches!(
            parse("sideways::a"),
            Err(ParseError::UnknownAxis { .. })
        ));
    }
}
