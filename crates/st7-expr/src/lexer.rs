//! Tokenizer for equation expressions.

use crate::error::{EvalError, Result};

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Question,
    Colon,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    NotEq,
}

/// A token together with its byte offset in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Split an expression into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let token = match c {
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'?' => Token::Question,
            b':' => Token::Colon,
            b'<' if bytes.get(i + 1) == Some(&b'=') => {
                i += 1;
                Token::Le
            }
            b'<' => Token::Lt,
            b'>' if bytes.get(i + 1) == Some(&b'=') => {
                i += 1;
                Token::Ge
            }
            b'>' => Token::Gt,
            b'=' if bytes.get(i + 1) == Some(&b'=') => {
                i += 1;
                Token::EqEq
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 1;
                Token::NotEq
            }
            b'0'..=b'9' | b'.' => {
                let end = scan_number(bytes, i);
                let text = &source[i..end];
                let value = text.parse::<f64>().map_err(|_| {
                    EvalError::syntax(source, start, format!("malformed number '{text}'"))
                })?;
                tokens.push(Spanned {
                    token: Token::Number(value),
                    offset: start,
                });
                i = end;
                continue;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let mut end = i + 1;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                tokens.push(Spanned {
                    token: Token::Ident(source[i..end].to_string()),
                    offset: start,
                });
                i = end;
                continue;
            }
            _ => {
                let ch = source[i..].chars().next().unwrap_or('?');
                return Err(EvalError::syntax(
                    source,
                    start,
                    format!("unexpected character '{ch}'"),
                ));
            }
        };
        tokens.push(Spanned {
            token,
            offset: start,
        });
        i += 1;
    }

    Ok(tokens)
}

/// Return the end offset of the numeric literal starting at `start`.
///
/// Accepts `12`, `1.5`, `.25` and an exponent such as `1e-9` when the `e`
/// is followed by digits.
fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
        end += 1;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            end = exp;
        }
    }
    end
}
