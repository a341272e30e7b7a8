//! Recursive-descent parser for matcher expressions
//!
//! Precedence, lowest first: `||`, `&&`, `==`/`!=`, `<`/`<=`/`>`/`>=`/`in`,
//! `+`/`-`, `*`/`/`/`%`, unary `!`/`-`, then member access and calls.
//!
//! `x in ('a', 'b')` parses directly into [`Expr::In`], so no textual
//! rewrite of the `in` operator is needed.

use super::lexer::{tokenize, Spanned, Token};
use super::value::Value;
use crate::error::{Result, WardenError};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Parsed matcher expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value<'static>),
    Ident(String),
    Member(Box<Expr>, String),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
}

/// Parse a matcher expression
///
/// # Examples
/// ```
/// use warden_rs::expr::{parse, Expr};
///
/// let expr = parse("r.sub == p.sub && keyMatch(r.obj, p.obj)").unwrap();
/// assert!(matches!(expr, Expr::Binary(..)));
/// ```
pub fn parse(src: &str) -> Result<Expr> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        len: src.len(),
    };
    let expr = parser.expression()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(WardenError::ExpressionParse {
            offset: extra.offset,
            message: format!("unexpected trailing token {:?}", extra.token),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|s| s.offset).unwrap_or(self.len)
    }

    fn next(&mut self) -> Option<Token> {
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

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}", expected)))
        }
    }

    fn error(&self, message: String) -> WardenError {
        let found = match self.peek() {
            Some(t) => format!("{:?}", t),
            None => "end of input".to_string(),
        };
        WardenError::ExpressionParse {
            offset: self.offset(),
            message: format!("{}, found {}", message, found),
        }
    }

    fn expression(&mut self) -> Result<Expr> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr> {
        let mut lhs = self.and()?;
        while self.eat(&Token::Or) {
            let rhs = self.and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut lhs = self.equality()?;
        while self.eat(&Token::And) {
            let rhs = self.equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::In) => {
                    self.pos += 1;
                    let list = self.in_list()?;
                    lhs = Expr::In(Box::new(lhs), list);
                    continue;
                }
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn in_list(&mut self) -> Result<Vec<Expr>> {
        let close = match self.peek() {
            Some(Token::LParen) => Token::RParen,
            Some(Token::LBracket) => Token::RBracket,
            _ => return Err(self.error("expected '(' or '[' after 'in'".to_string())),
        };
        self.pos += 1;
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(&close) {
                return Ok(items);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        while self.eat(&Token::Dot) {
            match self.peek() {
                Some(Token::Ident(name)) => {
                    expr = Expr::Member(Box::new(expr), name.clone());
                    self.pos += 1;
                }
                _ => return Err(self.error("expected member name after '.'".to_string())),
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        let Some(token) = self.next() else {
            return Err(self.error("expected expression".to_string()));
        };
        match token {
            Token::Str(s) => Ok(Expr::Literal(Value::Str(Cow::Owned(s)))),
            Token::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if self.eat(&Token::RParen) {
                                break;
                            }
                            self.expect(Token::Comma)?;
                        }
                    }
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            _ => {
                self.pos -= 1;
                Err(self.error("expected expression".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(section: &str, name: &str) -> Expr {
        Expr::Member(Box::new(Expr::Ident(section.into())), name.into())
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse("a || b && c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Or,
                Box::new(Expr::Ident("a".into())),
                Box::new(Expr::Binary(
                    BinaryOp::And,
                    Box::new(Expr::Ident("b".into())),
                    Box::new(Expr::Ident("c".into())),
                )),
            )
        );
    }

    #[test]
    fn test_parse_call_and_members() {
        let expr = parse("g(r.sub, p.sub, r.dom)").unwrap();
        assert_eq!(
            expr,
            Expr::Call(
                "g".into(),
                vec![field("r", "sub"), field("p", "sub"), field("r", "dom")]
            )
        );
    }

    #[test]
    fn test_parse_nested_member() {
        let expr = parse("r.sub.Owner.Name == 'alice'").unwrap();
        match expr {
            Expr::Binary(BinaryOp::Eq, lhs, _) => {
                assert_eq!(
                    *lhs,
                    Expr::Member(Box::new(field("r", "sub")), "Owner".into())
                        .member("Name")
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_in_operator() {
        let expr = parse("r.obj in ('data1', 'data2')").unwrap();
        assert_eq!(
            expr,
            Expr::In(
                Box::new(field("r", "obj")),
                vec![
                    Expr::Literal(Value::from("data1".to_string())),
                    Expr::Literal(Value::from("data2".to_string())),
                ]
            )
        );

        assert!(matches!(parse("r.obj in ()").unwrap(), Expr::In(_, v) if v.is_empty()));
        assert!(matches!(parse("r.obj in ['a']").unwrap(), Expr::In(_, v) if v.len() == 1));
    }

    #[test]
    fn test_parse_unary_and_arithmetic() {
        assert!(matches!(
            parse("!(a == b)").unwrap(),
            Expr::Unary(UnaryOp::Not, _)
        ));
        assert!(matches!(
            parse("r.age + 1 > 18").unwrap(),
            Expr::Binary(BinaryOp::Gt, _, _)
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("a ==").is_err());
        assert!(parse("f(a,").is_err());
        assert!(parse("(a").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("r.").is_err());
        assert!(parse("a in b").is_err());
    }

    impl Expr {
        fn member(self, name: &str) -> Expr {
            Expr::Member(Box::new(self), name.into())
        }
    }
}
