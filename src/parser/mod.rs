//! Rapcode source parser
//!
//! Transforms rapcode text into the shared syntax tree:
//! - [`lexer`]: tokenization (source text → tokens)
//! - `statements`: recursive descent over statements and blocks
//! - `expressions`: precedence climbing over operators
//!
//! The same parser reads flowchart node payloads, so the helpers at the bottom
//! of this module parse the small fragments a node carries (an assignment, a
//! condition, a call).
//!
//! # Grammar
//!
//! ```text
//! statement := IF expr THEN block [ELSE block] ENDIF
//!            | WHILE expr DO block ENDLOOP
//!            | LOOP block ENDLOOP
//!            | BREAK | CONTINUE
//!            | OUTPUT expr
//!            | INPUT ident
//!            | ident := INPUT ( [string] )
//!            | ident := expr
//!            | ident ( [args] )
//! ```

pub mod lexer;
mod expressions;
mod statements;

use crate::ast::{Expression, Statement};
use crate::error::ParseError;
use lexer::{Lexer, SourceLocation, Token};
use std::mem::discriminant;

/// Recursive descent parser for rapcode
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse a whole program into a single `Sequence`.
    pub fn parse_program(&mut self) -> Result<Statement, ParseError> {
        let items = self.parse_block(&[])?;
        if !self.is_at_end() {
            return Err(self.error_here(format!("Unexpected {}", self.peek())));
        }
        Ok(Statement::Sequence(items))
    }

    /// Parse exactly one expression spanning the rest of the input.
    pub fn parse_standalone_expression(&mut self) -> Result<Expression, ParseError> {
        self.skip_newlines();
        let expr = self.parse_expression()?;
        self.expect_end_of_input()?;
        Ok(expr)
    }

    // ===== Helper methods =====

    pub(crate) fn check(&self, token: &Token) -> bool {
        discriminant(self.peek()) == discriminant(token)
    }

    pub(crate) fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.position += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof(_))
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.position]
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1)]
    }

    pub(crate) fn current_location(&self) -> SourceLocation {
        self.peek().location()
    }

    pub(crate) fn error_here(&self, message: impl Into<String>) -> ParseError {
        let loc = self.current_location();
        ParseError::new(message, loc.line, loc.column)
    }

    pub(crate) fn expect_token(&mut self, token: &Token, message: &str) -> Result<(), ParseError> {
        if self.check(token) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!("{}, found {}", message, self.peek())))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if let Token::Ident(name, _) = self.peek() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_here(format!("Expected identifier, found {}", self.peek())))
        }
    }

    pub(crate) fn skip_newlines(&mut self) {
        while matches!(self.peek(), Token::Newline(_)) {
            self.advance();
        }
    }

    fn expect_end_of_input(&mut self) -> Result<(), ParseError> {
        self.skip_newlines();
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.error_here(format!("Unexpected {} after expression", self.peek())))
        }
    }
}

/// Parse rapcode program text.
pub fn parse_program(source: &str) -> Result<Statement, ParseError> {
    Parser::new(source)?.parse_program()
}

/// Parse a single expression, e.g. a decision node's condition.
pub fn parse_expression(source: &str) -> Result<Expression, ParseError> {
    Parser::new(source)?.parse_standalone_expression()
}

/// Parse an assignment fragment `target := expr`.
pub fn parse_assignment(source: &str) -> Result<(String, Expression), ParseError> {
    let mut parser = Parser::new(source)?;
    parser.skip_newlines();
    let target = parser.expect_identifier()?;
    parser.expect_token(&Token::Assign(SourceLocation::default()), "Expected ':='")?;
    let value = parser.parse_expression()?;
    parser.expect_end_of_input()?;
    Ok((target, value))
}

/// Parse a call fragment, `name(args)` or a bare `name`.
pub fn parse_call(source: &str) -> Result<(String, Vec<Expression>), ParseError> {
    let mut parser = Parser::new(source)?;
    parser.skip_newlines();
    let name = parser.expect_identifier()?;
    let args = if parser.match_token(&Token::LParen(SourceLocation::default())) {
        parser.parse_arguments()?
    } else {
        Vec::new()
    };
    parser.expect_end_of_input()?;
    Ok((name, args))
}

/// Parse a lone identifier, e.g. the target of an input node.
pub fn parse_identifier(source: &str) -> Result<String, ParseError> {
    let mut parser = Parser::new(source)?;
    parser.skip_newlines();
    let name = parser.expect_identifier()?;
    parser.expect_end_of_input()?;
    Ok(name)
}
