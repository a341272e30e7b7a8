//! Tokenizer for matcher expressions

use crate::error::{Result, WardenError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    In,
    True,
    False,
    Null,
}

/// A token with its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn error(offset: usize, message: impl Into<String>) -> WardenError {
    WardenError::ExpressionParse {
        offset,
        message: message.into(),
    }
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let two = bytes.get(i + 1).copied();
        let token = match (c, two) {
            (b'&', Some(b'&')) => {
                i += 2;
                Token::And
            }
            (b'|', Some(b'|')) => {
                i += 2;
                Token::Or
            }
            (b'=', Some(b'=')) => {
                i += 2;
                Token::Eq
            }
            (b'!', Some(b'=')) => {
                i += 2;
                Token::Ne
            }
            (b'<', Some(b'=')) => {
                i += 2;
                Token::Le
            }
            (b'>', Some(b'=')) => {
                i += 2;
                Token::Ge
            }
            (b'!', _) => {
                i += 1;
                Token::Not
            }
            (b'<', _) => {
                i += 1;
                Token::Lt
            }
            (b'>', _) => {
                i += 1;
                Token::Gt
            }
            (b'(', _) => {
                i += 1;
                Token::LParen
            }
            (b')', _) => {
                i += 1;
                Token::RParen
            }
            (b'[', _) => {
                i += 1;
                Token::LBracket
            }
            (b']', _) => {
                i += 1;
                Token::RBracket
            }
            (b',', _) => {
                i += 1;
                Token::Comma
            }
            (b'.', _) => {
                i += 1;
                Token::Dot
            }
            (b'+', _) => {
                i += 1;
                Token::Plus
            }
            (b'-', _) => {
                i += 1;
                Token::Minus
            }
            (b'*', _) => {
                i += 1;
                Token::Star
            }
            (b'/', _) => {
                i += 1;
                Token::Slash
            }
            (b'%', _) => {
                i += 1;
                Token::Percent
            }
            (b'\'' | b'"', _) => {
                let (s, end) = lex_string(src, i)?;
                i = end;
                Token::Str(s)
            }
            (b'0'..=b'9', _) => {
                let (t, end) = lex_number(src, i)?;
                i = end;
                t
            }
            (c, _) if c == b'_' || c == b'$' || c.is_ascii_alphabetic() => {
                while i < bytes.len()
                    && (bytes[i] == b'_' || bytes[i] == b'$' || bytes[i].is_ascii_alphanumeric())
                {
                    i += 1;
                }
                match &src[start..i] {
                    "in" => Token::In,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" | "nil" => Token::Null,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    ident => Token::Ident(ident.to_string()),
                }
            }
            _ => {
                let ch = src[i..].chars().next().unwrap_or('?');
                return Err(error(i, format!("unexpected character '{}'", ch)));
            }
        };

        tokens.push(Spanned {
            token,
            offset: start,
        });
    }

    Ok(tokens)
}

fn lex_string(src: &str, start: usize) -> Result<(String, usize)> {
    let bytes = src.as_bytes();
    let quote = bytes[start];
    let mut out = String::new();
    let mut i = start + 1;
    let mut chunk_start = i;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                out.push_str(&src[chunk_start..i]);
                let escaped = bytes
                    .get(i + 1)
                    .ok_or_else(|| error(i, "unterminated escape"))?;
                let unescaped = match escaped {
                    b'n' => Some('\n'),
                    b't' => Some('\t'),
                    b'\\' => Some('\\'),
                    b'\'' => Some('\''),
                    b'"' => Some('"'),
                    _ => None,
                };
                match unescaped {
                    Some(ch) => {
                        out.push(ch);
                        i += 2;
                    }
                    // Unknown escapes keep the backslash
                    None => {
                        out.push('\\');
                        i += 1;
                    }
                }
                chunk_start = i;
            }
            b if b == quote => {
                out.push_str(&src[chunk_start..i]);
                return Ok((out, i + 1));
            }
            _ => i += 1,
        }
    }

    Err(error(start, "unterminated string literal"))
}

fn lex_number(src: &str, start: usize) -> Result<(Token, usize)> {
    let bytes = src.as_bytes();
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }

    let is_float = i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit();
    if is_float {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let text = &src[start..i];
        let f = text
            .parse::<f64>()
            .map_err(|_| error(start, format!("invalid number '{}'", text)))?;
        return Ok((Token::Float(f), i));
    }

    let text = &src[start..i];
    let n = text
        .parse::<i64>()
        .map_err(|_| error(start, format!("invalid number '{}'", text)))?;
    Ok((Token::Int(n), i))
}
