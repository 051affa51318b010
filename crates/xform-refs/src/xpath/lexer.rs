//! Tokenizer for XPath expressions.
//!
//! Applies the XPath 1.0 disambiguation rule: when the preceding token is
//! not one of `@`, `::`, `(`, `[`, `,` or an operator, a `*` is the multiply
//! operator and a bare name is an operator name (`and`, `or`, `div`, `mod`).

use crate::error::ParseError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Number literal in its source spelling.
    Number(String),
    /// String literal and its quote character.
    Literal { value: String, quote: char },
    /// `name` or `prefix:name`
    Name(String),
    /// `prefix:*`
    NamespaceWildcard(String),
    /// `$name`
    Variable(String),
    /// `*` used as a name test
    Star,
    Multiply,
    And,
    Or,
    Div,
    Mod,
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Comma,
    DoubleColon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Pipe,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl Token {
    fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::And
                | Token::Or
                | Token::Div
                | Token::Mod
                | Token::Multiply
                | Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::LtEq
                | Token::Gt
                | Token::GtEq
        )
    }

    /// Whether a following `*` or name must be read as an operator.
    fn forces_operator(&self) -> bool {
        !(self.is_operator()
            || matches!(
                self,
                Token::At | Token::DoubleColon | Token::LParen | Token::LBracket | Token::Comma
            ))
    }

    /// Source text of the token, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.clone(),
            Token::Literal { value, quote } => format!("{quote}{value}{quote}"),
            Token::Name(n) => n.clone(),
            Token::NamespaceWildcard(p) => format!("{p}:*"),
            Token::Variable(v) => format!("${v}"),
            Token::Star | Token::Multiply => "*".into(),
            Token::And => "and".into(),
            Token::Or => "or".into(),
            Token::Div => "div".into(),
            Token::Mod => "mod".into(),
            Token::Slash => "/".into(),
            Token::DoubleSlash => "//".into(),
            Token::Dot => ".".into(),
            Token::DotDot => "..".into(),
            Token::At => "@".into(),
            Token::Comma => ",".into(),
            Token::DoubleColon => "::".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::LBracket => "[".into(),
            Token::RBracket => "]".into(),
            Token::Pipe => "|".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Eq => "=".into(),
            Token::NotEq => "!=".into(),
            Token::Lt => "<".into(),
            Token::LtEq => "<=".into(),
            Token::Gt => ">".into(),
            Token::GtEq => ">=".into(),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Cursor over the source text.
#[derive(Debug, Clone)]
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Splits an expression into tokens.
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut cursor = Cursor::new(src);
    let mut tokens: Vec<Spanned> = Vec::new();

    loop {
        cursor.eat_while(char::is_whitespace);
        let offset = cursor.pos;
        let Some(c) = cursor.peek() else {
            break;
        };
        let operator_position = tokens.last().is_some_and(|t| t.token.forces_operator());

        let token = match c {
            '(' => single(&mut cursor, Token::LParen),
            ')' => single(&mut cursor, Token::RParen),
            '[' => single(&mut cursor, Token::LBracket),
            ']' => single(&mut cursor, Token::RBracket),
            ',' => single(&mut cursor, Token::Comma),
            '@' => single(&mut cursor, Token::At),
            '|' => single(&mut cursor, Token::Pipe),
            '+' => single(&mut cursor, Token::Plus),
            '-' => single(&mut cursor, Token::Minus),
            '=' => single(&mut cursor, Token::Eq),
            '*' => {
                cursor.bump();
                if operator_position {
                    Token::Multiply
                } else {
                    Token::Star
                }
            }
            '/' => {
                cursor.bump();
                if cursor.peek() == Some('/') {
                    cursor.bump();
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            '!' => {
                cursor.bump();
                if cursor.peek() == Some('=') {
                    cursor.bump();
                    Token::NotEq
                } else {
                    return Err(ParseError::UnexpectedChar { found: '!', offset });
                }
            }
            '<' | '>' => {
                cursor.bump();
                let or_equal = cursor.peek() == Some('=');
                if or_equal {
                    cursor.bump();
                }
                match (c, or_equal) {
                    ('<', false) => Token::Lt,
                    ('<', true) => Token::LtEq,
                    ('>', false) => Token::Gt,
                    _ => Token::GtEq,
                }
            }
            ':' => {
                if cursor.peek_nth(1) == Some(':') {
                    cursor.bump();
                    cursor.bump();
                    Token::DoubleColon
                } else {
                    return Err(ParseError::UnexpectedChar { found: ':', offset });
                }
            }
            '.' => {
                if cursor.peek_nth(1).is_some_and(|d| d.is_ascii_digit()) {
                    read_number(&mut cursor)
                } else if cursor.peek_nth(1) == Some('.') {
                    cursor.bump();
                    cursor.bump();
                    Token::DotDot
                } else {
                    cursor.bump();
                    Token::Dot
                }
            }
            '"' | '\'' => {
                cursor.bump();
                let value = cursor.eat_while(|ch| ch != c).to_string();
                if cursor.bump().is_none() {
                    return Err(ParseError::UnterminatedString { offset });
                }
                Token::Literal { value, quote: c }
            }
            '$' => {
                cursor.bump();
                if !cursor.peek().is_some_and(is_name_start) {
                    return Err(ParseError::UnexpectedChar { found: '$', offset });
                }
                match read_name(&mut cursor) {
                    Token::Name(name) => Token::Variable(name),
                    _ => return Err(ParseError::UnexpectedChar { found: '*', offset }),
                }
            }
            c if c.is_ascii_digit() => read_number(&mut cursor),
            c if is_name_start(c) => match read_name(&mut cursor) {
                Token::Name(name) if operator_position => {
                    operator_name(&name).unwrap_or(Token::Name(name))
                }
                token => token,
            },
            other => return Err(ParseError::UnexpectedChar { found: other, offset }),
        };

        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

fn operator_name(name: &str) -> Option<Token> {
    match name {
        "and" => Some(Token::And),
        "or" => Some(Token::Or),
        "div" => Some(Token::Div),
        "mod" => Some(Token::Mod),
        _ => None,
    }
}

fn single(cursor: &mut Cursor<'_>, token: Token) -> Token {
    cursor.bump();
    token
}

fn read_number(cursor: &mut Cursor<'_>) -> Token {
    let start = cursor.pos;
    cursor.eat_while(|c| c.is_ascii_digit());
    if cursor.peek() == Some('.') {
        cursor.bump();
        cursor.eat_while(|c| c.is_ascii_digit());
    }
    Token::Number(cursor.src[start..cursor.pos].to_string())
}

/// Reads `name`, `prefix:name` or `prefix:*`.
fn read_name(cursor: &mut Cursor<'_>) -> Token {
    let start = cursor.pos;
    cursor.eat_while(is_name_char);
    if cursor.peek() == Some(':') && cursor.peek_nth(1) != Some(':') {
        match cursor.peek_nth(1) {
            Some('*') => {
                let prefix = cursor.src[start..cursor.pos].to_string();
                cursor.bump();
                cursor.bump();
                return Token::NamespaceWildcard(prefix);
            }
            Some(c) if is_name_start(c) => {
                cursor.bump();
                cursor.eat_while(is_name_char);
            }
            _ => {}
        }
    }
    Token::Name(cursor.src[start..cursor.pos].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_absolute_path_comparison() {
        assert_eq!(
            kinds("/data/age > 5"),
            vec![
                Token::Slash,
                Token::Name("data".into()),
                Token::Slash,
                Token::Name("age".into()),
                Token::Gt,
                Token::Number("5".into()),
            ]
        );
    }

    #[test]
    fn test_star_and_operator_names() {
        assert_eq!(
            kinds("* * div"),
            vec![Token::Star, Token::Multiply, Token::Name("div".into())]
        );
        assert_eq!(
            kinds("a and b"),
            vec![
                Token::Name("a".into()),
                Token::And,
                Token::Name("b".into())
            ]
        );
        // a name right after `(` is never an operator
        assert_eq!(
            kinds("(and)"),
            vec![Token::LParen, Token::Name("and".into()), Token::RParen]
        );
    }

    #[test]
    fn test_hyphenated_names_and_minus() {
        assert_eq!(kinds("a-b"), vec![Token::Name("a-b".into())]);
        assert_eq!(
            kinds("5-3"),
            vec![
                Token::Number("5".into()),
                Token::Minus,
                Token::Number("3".into())
            ]
        );
    }

    #[test]
    fn test_qualified_names_and_axes() {
        assert_eq!(
            kinds("jr:itext('x') child::a @b c:*"),
            vec![
                Token::Name("jr:itext".into()),
                Token::LParen,
                Token::Literal {
                    value: "x".into(),
                    quote: '\''
                },
                Token::RParen,
                Token::Name("child".into()),
                Token::DoubleColon,
                Token::Name("a".into()),
                Token::At,
                Token::Name("b".into()),
                Token::NamespaceWildcard("c".into()),
            ]
        );
    }

    #[test]
    fn test_dots_and_numbers() {
        assert_eq!(
            kinds("../.5 .//x"),
            vec![
                Token::DotDot,
                Token::Slash,
                Token::Number(".5".into()),
                Token::Dot,
                Token::DoubleSlash,
                Token::Name("x".into()),
            ]
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            tokenize("'open"),
            Err(ParseError::UnterminatedString { offset: 0 })
        ));
        assert!(matches!(
            tokenize("a ! b"),
            Err(ParseError::UnexpectedChar { found: '!', offset: 2 })
        ));
        assert!(matches!(
            tokenize("a # b"),
            Err(ParseError::UnexpectedChar { found: '#', .. })
        ));
    }
}
