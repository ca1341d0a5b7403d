//! Expression parsing
//!
//! One method per precedence level, loosest first:
//! `OR` < `AND` < comparison < `+ -` < `* / MOD` < unary `- NOT`.
//! Comparisons are non-associative: `a < b < c` is rejected.

use super::Parser;
use super::lexer::{SourceLocation, Token};
use crate::ast::{BinaryOp, Expression, UnaryOp, Value};
use crate::error::ParseError;

const LOC: SourceLocation = SourceLocation { line: 0, column: 0 };

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_logical_and()?;
        while self.match_token(&Token::Or(LOC)) {
            let right = self.parse_logical_and()?;
            left = Expression::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.match_token(&Token::And(LOC)) {
            let right = self.parse_comparison()?;
            left = Expression::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_additive()?;
        let Some(op) = self.comparison_operator() else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_additive()?;

        if self.comparison_operator().is_some() {
            return Err(self.error_here("Comparison operators cannot be chained; add parentheses"));
        }
        Ok(Expression::binary(op, left, right))
    }

    fn comparison_operator(&self) -> Option<BinaryOp> {
        match self.peek() {
            Token::EqEq(_) => Some(BinaryOp::Equal),
            Token::NotEq(_) => Some(BinaryOp::NotEqual),
            Token::Lt(_) => Some(BinaryOp::Less),
            Token::Le(_) => Some(BinaryOp::LessEqual),
            Token::Gt(_) => Some(BinaryOp::Greater),
            Token::Ge(_) => Some(BinaryOp::GreaterEqual),
            _ => None,
        }
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus(_) => BinaryOp::Add,
                Token::Minus(_) => BinaryOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star(_) => BinaryOp::Multiply,
                Token::Slash(_) => BinaryOp::Divide,
                Token::Mod(_) => BinaryOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        if self.match_token(&Token::Not(LOC)) {
            let operand = self.parse_unary()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }

        if self.match_token(&Token::Minus(LOC)) {
            // Fold `-3` into a negative literal
            if let Token::Number(n, _) = self.peek() {
                let n = *n;
                self.advance();
                return Ok(Expression::number(-n));
            }
            let operand = self.parse_unary()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(operand),
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let token = self.peek().clone();
        match token {
            Token::Number(n, _) => {
                self.advance();
                Ok(Expression::number(n))
            }
            Token::Str(s, _) => {
                self.advance();
                Ok(Expression::Literal(Value::Text(s)))
            }
            Token::True(_) => {
                self.advance();
                Ok(Expression::boolean(true))
            }
            Token::False(_) => {
                self.advance();
                Ok(Expression::boolean(false))
            }
            Token::Ident(name, _) => {
                self.advance();
                if self.match_token(&Token::LParen(LOC)) {
                    let args = self.parse_arguments()?;
                    Ok(Expression::Call { name, args })
                } else {
                    Ok(Expression::Variable(name))
                }
            }
            Token::Input(_) => {
                self.advance();
                self.expect_token(&Token::LParen(LOC), "Expected '(' after INPUT in an expression")?;
                let args = self.parse_arguments()?;
                Ok(Expression::Call {
                    name: "INPUT".to_string(),
                    args,
                })
            }
            Token::LParen(_) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_token(&Token::RParen(LOC), "Expected ')' to close parenthesis")?;
                Ok(expr)
            }
            other => Err(self.error_here(format!("Expected expression, found {}", other))),
        }
    }

    /// Parse a call's argument list; the opening `(` is already consumed.
    pub(crate) fn parse_arguments(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut args = Vec::new();
        if self.match_token(&Token::RParen(LOC)) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.match_token(&Token::Comma(LOC)) {
                continue;
            }
            self.expect_token(&Token::RParen(LOC), "Expected ',' or ')' in argument list")?;
            return Ok(args);
        }
    }
}
