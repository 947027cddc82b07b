//! Recursive-descent parser producing an expression tree.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! conditional := comparison ( '?' conditional ':' conditional )?
//! comparison  := additive ( ('<' | '>' | '<=' | '>=' | '==' | '!=') additive )*
//! additive    := term ( ('+' | '-') term )*
//! term        := unary ( ('*' | '/') unary )*
//! unary       := ('+' | '-') unary | primary
//! primary     := NUMBER | IDENT | '(' conditional ')'
//! ```
//!
//! A unary minus is lowered to `0 - operand` so that no negative literal
//! token exists and `a -1` is never ambiguous.

use crate::error::{EvalError, Result};
use crate::lexer::{tokenize, Spanned, Token};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal.
    Number(f64),
    /// A variable reference.
    Ident(String),
    /// A binary operation.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `cond ? then : otherwise`; only the selected branch is evaluated.
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

/// Parse an expression into a tree.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.conditional()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(EvalError::syntax(
            source,
            extra.offset,
            format!("unexpected trailing token {:?}", extra.token),
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.offset)
            .unwrap_or(self.source.len())
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(EvalError::syntax(
                self.source,
                self.offset(),
                format!("expected {what}"),
            ))
        }
    }

    fn conditional(&mut self) -> Result<Expr> {
        let cond = self.comparison()?;
        if self.peek() != Some(&Token::Question) {
            return Ok(cond);
        }
        self.pos += 1;
        let then = self.conditional()?;
        self.expect(Token::Colon, "':' in conditional expression")?;
        let otherwise = self.conditional()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.additive()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            Some(Token::Minus) => {
                self.pos += 1;
                let operand = self.unary()?;
                Ok(Expr::binary(BinaryOp::Sub, Expr::Number(0.0), operand))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::LParen) => {
                let inner = self.conditional()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(other) => Err(EvalError::syntax(
                self.source,
                offset,
                format!("unexpected token {other:?}"),
            )),
            None => Err(EvalError::syntax(
                self.source,
                offset,
                "unexpected end of expression",
            )),
        }
    }
}
