//! Recursive descent parser for permission rule strings.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr     := and_expr ( OR and_expr )*
//! and_expr := unary ( AND unary )*
//! unary    := NOT unary | primary
//! primary  := '(' expr ')' | name
//! name     := word+
//! ```
//!
//! Keywords are `AND`, `OR` and `NOT`, in upper or lower case.  A check name
//! is every consecutive non-keyword word, joined by single spaces, so
//! `user   has all access` names the check `user has all access`.

use thiserror::Error;

use warden_contracts::rule::RuleExpr;

/// Maximum nesting of parentheses and `NOT`s.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Maximum depth of the parsed tree.  Each `AND`/`OR` in a flat chain adds a
/// level, since chains associate to the left.
pub const MAX_RULE_DEPTH: usize = 128;

/// Errors that can occur while parsing a rule string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("empty rule")]
    Empty,

    #[error("unexpected token '{found}' at offset {at}")]
    UnexpectedToken { found: String, at: usize },

    #[error("unbalanced parenthesis at offset {at}")]
    UnbalancedParens { at: usize },

    #[error("unexpected end of rule")]
    UnexpectedEnd,

    #[error("nesting too deep (max {max})")]
    NestingTooDeep { max: usize },

    #[error("rule too deep (max {max} levels)")]
    RuleTooDeep { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Word,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    /// Byte offset into the source.
    at: usize,
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(at, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' => {
                chars.next();
                tokens.push(Token {
                    kind: if ch == '(' { TokenKind::LParen } else { TokenKind::RParen },
                    text: ch.to_string(),
                    at,
                });
            }
            _ => {
                let mut text = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    text.push(c);
                    chars.next();
                }
                let kind = match text.as_str() {
                    "AND" | "and" => TokenKind::And,
                    "OR" | "or" => TokenKind::Or,
                    "NOT" | "not" => TokenKind::Not,
                    _ => TokenKind::Word,
                };
                tokens.push(Token { kind, text, at });
            }
        }
    }
    tokens
}

/// Parse `input` into a [`RuleExpr`].
pub fn parse_rule(input: &str) -> Result<RuleExpr, RuleParseError> {
    let tokens = tokenize(input);
    if tokens.is_empty() {
        return Err(RuleParseError::Empty);
    }

    let mut parser = Parser {
        tokens,
        position: 0,
        depth: 0,
    };
    let (expr, _) = parser.parse_expr()?;

    match parser.current() {
        None => Ok(expr),
        Some(token) if token.kind == TokenKind::RParen => {
            Err(RuleParseError::UnbalancedParens { at: token.at })
        }
        Some(token) => Err(RuleParseError::UnexpectedToken {
            found: token.text.clone(),
            at: token.at,
        }),
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn current_is(&self, kind: TokenKind) -> bool {
        self.current().map(|t| t.kind == kind).unwrap_or(false)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn enter(&mut self) -> Result<(), RuleParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(RuleParseError::NestingTooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Depth of a junction over children of depth `left` and `right`.
    fn joined(left: usize, right: usize) -> Result<usize, RuleParseError> {
        let depth = left.max(right) + 1;
        if depth > MAX_RULE_DEPTH {
            return Err(RuleParseError::RuleTooDeep {
                max: MAX_RULE_DEPTH,
            });
        }
        Ok(depth)
    }

    // Each parse step returns the node with its tree depth.

    fn parse_expr(&mut self) -> Result<(RuleExpr, usize), RuleParseError> {
        let (mut left, mut depth) = self.parse_and()?;
        while self.current_is(TokenKind::Or) {
            self.advance();
            let (right, right_depth) = self.parse_and()?;
            depth = Self::joined(depth, right_depth)?;
            left = left.or(right);
        }
        Ok((left, depth))
    }

    fn parse_and(&mut self) -> Result<(RuleExpr, usize), RuleParseError> {
        let (mut left, mut depth) = self.parse_unary()?;
        while self.current_is(TokenKind::And) {
            self.advance();
            let (right, right_depth) = self.parse_unary()?;
            depth = Self::joined(depth, right_depth)?;
            left = left.and(right);
        }
        Ok((left, depth))
    }

    fn parse_unary(&mut self) -> Result<(RuleExpr, usize), RuleParseError> {
        if self.current_is(TokenKind::Not) {
            self.advance();
            self.enter()?;
            let (inner, depth) = self.parse_unary()?;
            self.leave();
            return Ok((inner.negate(), Self::joined(depth, 0)?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<(RuleExpr, usize), RuleParseError> {
        let token = self.current().cloned().ok_or(RuleParseError::UnexpectedEnd)?;

        match token.kind {
            TokenKind::LParen => {
                self.advance();
                self.enter()?;
                let inner = self.parse_expr()?;
                match self.current().cloned() {
                    Some(t) if t.kind == TokenKind::RParen => self.advance(),
                    Some(t) => {
                        return Err(RuleParseError::UnexpectedToken {
                            found: t.text,
                            at: t.at,
                        })
                    }
                    None => return Err(RuleParseError::UnbalancedParens { at: token.at }),
                }
                self.leave();
                Ok(inner)
            }
            TokenKind::Word => {
                let mut words = Vec::new();
                while let Some(t) = self.current() {
                    if t.kind != TokenKind::Word {
                        break;
                    }
                    words.push(t.text.clone());
                    self.advance();
                }
                Ok((RuleExpr::check(words.join(" ")), 1))
            }
            TokenKind::RParen | TokenKind::And | TokenKind::Or | TokenKind::Not => {
                Err(RuleParseError::UnexpectedToken {
                    found: token.text,
                    at: token.at,
                })
            }
        }
    }
}
