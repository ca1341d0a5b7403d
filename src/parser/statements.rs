//! Statement parsing
//!
//! Blocks are parsed until one of the caller's terminator keywords; statements
//! on one line need no separator, so `IF c THEN BREAK ENDIF` is accepted.

use super::Parser;
use super::lexer::{SourceLocation, Token};
use crate::ast::{Expression, Statement};
use crate::error::ParseError;

const LOC: SourceLocation = SourceLocation { line: 0, column: 0 };

impl Parser {
    /// Parse statements up to (not including) one of `terminators` or end of input.
    pub(crate) fn parse_block(&mut self, terminators: &[Token]) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();

        loop {
            self.skip_newlines();
            if self.is_at_end() || terminators.iter().any(|t| self.check(t)) {
                break;
            }
            statements.push(self.parse_statement()?);
        }

        Ok(statements)
    }

    pub(crate) fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.peek() {
            Token::If(_) => {
                self.advance();
                self.parse_if_statement()
            }
            Token::While(_) => {
                self.advance();
                let condition = self.parse_expression()?;
                self.expect_token(&Token::Do(LOC), "Expected 'DO' after WHILE condition")?;
                let body = self.parse_block(&[Token::EndLoop(LOC)])?;
                self.expect_token(&Token::EndLoop(LOC), "Expected 'ENDLOOP' to close WHILE")?;
                Ok(Statement::while_loop(condition, Statement::Sequence(body)))
            }
            Token::Loop(_) => {
                self.advance();
                let body = self.parse_block(&[Token::EndLoop(LOC)])?;
                self.expect_token(&Token::EndLoop(LOC), "Expected 'ENDLOOP' to close LOOP")?;
                Ok(Statement::while_loop(
                    Expression::boolean(true),
                    Statement::Sequence(body),
                ))
            }
            Token::Break(_) => {
                self.advance();
                Ok(Statement::Break)
            }
            Token::Continue(_) => {
                self.advance();
                Ok(Statement::Continue)
            }
            Token::Output(_) => {
                self.advance();
                Ok(Statement::Output(self.parse_expression()?))
            }
            Token::Input(_) => {
                self.advance();
                let target = self.expect_identifier()?;
                Ok(Statement::Input {
                    target,
                    prompt: None,
                })
            }
            Token::Ident(..) => self.parse_identifier_statement(),
            other => Err(self.error_here(format!("Expected a statement, found {}", other))),
        }
    }

    fn parse_if_statement(&mut self) -> Result<Statement, ParseError> {
        let condition = self.parse_expression()?;
        self.expect_token(&Token::Then(LOC), "Expected 'THEN' after IF condition")?;
        let then_branch = self.parse_block(&[Token::Else(LOC), Token::EndIf(LOC)])?;

        let else_branch = if self.match_token(&Token::Else(LOC)) {
            Some(self.parse_block(&[Token::EndIf(LOC)])?)
        } else {
            None
        };

        self.expect_token(&Token::EndIf(LOC), "Expected 'ENDIF' to close IF")?;
        Ok(Statement::If {
            condition,
            then_branch: Box::new(Statement::Sequence(then_branch)),
            else_branch: else_branch.map(|items| Box::new(Statement::Sequence(items))),
        })
    }

    /// `x := INPUT(...)`, `x := expr` or `name(args)`.
    fn parse_identifier_statement(&mut self) -> Result<Statement, ParseError> {
        let name = self.expect_identifier()?;

        if self.match_token(&Token::Assign(LOC)) {
            let value = self.parse_expression()?;
            return Ok(Statement::assign(name, value));
        }

        if self.match_token(&Token::LParen(LOC)) {
            let args = self.parse_arguments()?;
            return Ok(Statement::Call { name, args });
        }

        Err(self.error_here(format!(
            "Expected ':=' or '(' after '{}', found {}",
            name,
            self.peek()
        )))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinaryOp, Expression, Statement};
    use crate::parser::parse_program;

    #[test]
    fn loop_keyword_is_an_infinite_while() {
        let program = parse_program("LOOP\n  BREAK\nENDLOOP\n").unwrap();
        let expected = Statement::Sequence(vec![Statement::while_loop(
            Expression::boolean(true),
            Statement::Sequence(vec![Statement::Break]),
        )]);
        assert_eq!(program, expected);
    }

    #[test]
    fn input_with_prompt_is_a_statement() {
        let program = parse_program("age := INPUT(\"Age?\")").unwrap();
        assert_eq!(
            program,
            Statement::Sequence(vec![Statement::Input {
                target: "age".into(),
                prompt: Some("Age?".into()),
            }])
        );
    }

    #[test]
    fn input_inside_an_expression_is_a_call() {
        let program = parse_program("n := INPUT() + 1").unwrap();
        let Statement::Sequence(items) = program else {
            panic!("expected a sequence");
        };
        match &items[0] {
            Statement::Assign {
                value: Expression::Binary { op, left, .. },
                ..
            } => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(**left, Expression::Call { ref name, .. } if name == "INPUT"));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn single_line_if_is_accepted() {
        let program = parse_program("IF x > 3 THEN BREAK ENDIF").unwrap();
        assert_eq!(
            program,
            Statement::Sequence(vec![Statement::if_then(
                Expression::binary(
                    BinaryOp::Greater,
                    Expression::variable("x"),
                    Expression::number(3.0)
                ),
                Statement::Sequence(vec![Statement::Break]),
            )])
        );
    }

    #[test]
    fn missing_endif_points_at_end_of_input() {
        let err = parse_program("IF TRUE THEN\n  OUTPUT 1\n").unwrap_err();
        assert!(err.message.contains("ENDIF"));
        assert_eq!(err.line, 3);
    }
}
