//! Lexer (tokenizer) for rapcode source text
//!
//! Converts raw source text into a flat [`Token`] stream consumed by the parser.
//! Line breaks are significant outside parentheses and are emitted as
//! [`Token::Newline`]; inside parentheses they are plain whitespace.

use crate::error::ParseError;
use std::fmt;

/// A position in source text, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// All token variants produced by the lexer.
///
/// Every variant carries a [`SourceLocation`] so parse errors can point at the
/// offending token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64, SourceLocation),
    Str(String, SourceLocation),
    Ident(String, SourceLocation),

    // Keywords
    If(SourceLocation),
    Then(SourceLocation),
    Else(SourceLocation),
    EndIf(SourceLocation),
    While(SourceLocation),
    Do(SourceLocation),
    Loop(SourceLocation),
    EndLoop(SourceLocation),
    Break(SourceLocation),
    Continue(SourceLocation),
    Input(SourceLocation),
    Output(SourceLocation),
    True(SourceLocation),
    False(SourceLocation),
    Not(SourceLocation),
    And(SourceLocation),
    Or(SourceLocation),
    Mod(SourceLocation),

    // Operators
    Assign(SourceLocation), // :=
    Plus(SourceLocation),
    Minus(SourceLocation),
    Star(SourceLocation),
    Slash(SourceLocation),
    EqEq(SourceLocation), // == (or a single =)
    NotEq(SourceLocation),
    Lt(SourceLocation),
    Le(SourceLocation),
    Gt(SourceLocation),
    Ge(SourceLocation),

    // Punctuation
    LParen(SourceLocation),
    RParen(SourceLocation),
    Comma(SourceLocation),
    Newline(SourceLocation),

    Eof(SourceLocation),
}

impl Token {
    pub fn location(&self) -> SourceLocation {
        match self {
            Token::Number(_, loc) | Token::Str(_, loc) | Token::Ident(_, loc) => *loc,
            Token::If(loc)
            | Token::Then(loc)
            | Token::Else(loc)
            | Token::EndIf(loc)
            | Token::While(loc)
            | Token::Do(loc)
            | Token::Loop(loc)
            | Token::EndLoop(loc)
            | Token::Break(loc)
            | Token::Continue(loc)
            | Token::Input(loc)
            | Token::Output(loc)
            | Token::True(loc)
            | Token::False(loc)
            | Token::Not(loc)
            | Token::And(loc)
            | Token::Or(loc)
            | Token::Mod(loc)
            | Token::Assign(loc)
            | Token::Plus(loc)
            | Token::Minus(loc)
            | Token::Star(loc)
            | Token::Slash(loc)
            | Token::EqEq(loc)
            | Token::NotEq(loc)
            | Token::Lt(loc)
            | Token::Le(loc)
            | Token::Gt(loc)
            | Token::Ge(loc)
            | Token::LParen(loc)
            | Token::RParen(loc)
            | Token::Comma(loc)
            | Token::Newline(loc)
            | Token::Eof(loc) => *loc,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n, _) => write!(f, "number {}", n),
            Token::Str(s, _) => write!(f, "string \"{}\"", s),
            Token::Ident(s, _) => write!(f, "identifier '{}'", s),
            Token::If(_) => write!(f, "'IF'"),
            Token::Then(_) => write!(f, "'THEN'"),
            Token::Else(_) => write!(f, "'ELSE'"),
            Token::EndIf(_) => write!(f, "'ENDIF'"),
            Token::While(_) => write!(f, "'WHILE'"),
            Token::Do(_) => write!(f, "'DO'"),
            Token::Loop(_) => write!(f, "'LOOP'"),
            Token::EndLoop(_) => write!(f, "'ENDLOOP'"),
            Token::Break(_) => write!(f, "'BREAK'"),
            Token::Continue(_) => write!(f, "'CONTINUE'"),
            Token::Input(_) => write!(f, "'INPUT'"),
            Token::Output(_) => write!(f, "'OUTPUT'"),
            Token::True(_) => write!(f, "'TRUE'"),
            Token::False(_) => write!(f, "'FALSE'"),
            Token::Not(_) => write!(f, "'NOT'"),
            Token::And(_) => write!(f, "'AND'"),
            Token::Or(_) => write!(f, "'OR'"),
            Token::Mod(_) => write!(f, "'MOD'"),
            Token::Assign(_) => write!(f, "':='"),
            Token::Plus(_) => write!(f, "'+'"),
            Token::Minus(_) => write!(f, "'-'"),
            Token::Star(_) => write!(f, "'*'"),
            Token::Slash(_) => write!(f, "'/'"),
            Token::EqEq(_) => write!(f, "'=='"),
            Token::NotEq(_) => write!(f, "'!='"),
            Token::Lt(_) => write!(f, "'<'"),
            Token::Le(_) => write!(f, "'<='"),
            Token::Gt(_) => write!(f, "'>'"),
            Token::Ge(_) => write!(f, "'>='"),
            Token::LParen(_) => write!(f, "'('"),
            Token::RParen(_) => write!(f, "')'"),
            Token::Comma(_) => write!(f, "','"),
            Token::Newline(_) => write!(f, "end of line"),
            Token::Eof(_) => write!(f, "end of input"),
        }
    }
}

fn lex_error(message: impl Into<String>, location: SourceLocation) -> ParseError {
    ParseError::new(message, location.line, location.column)
}

/// Lexer for rapcode source text
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    paren_depth: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            paren_depth: 0,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();

            if self.is_at_end() {
                tokens.push(Token::Eof(self.current_location()));
                break;
            }

            if self.peek() == Some('\n') {
                let loc = self.current_location();
                self.advance();
                // Collapse runs of blank lines into a single separator
                if !matches!(tokens.last(), Some(Token::Newline(_)) | None) {
                    tokens.push(Token::Newline(loc));
                }
                continue;
            }

            tokens.push(self.next_token()?);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        let loc = self.current_location();
        let ch = self
            .advance()
            .ok_or_else(|| lex_error("Unexpected end of input", loc))?;

        match ch {
            '"' => self.string_literal(loc),
            '0'..='9' => self.number_literal(ch, loc),
            'a'..='z' | 'A'..='Z' | '_' => Ok(self.identifier_or_keyword(ch, loc)),

            '+' => Ok(Token::Plus(loc)),
            '-' => Ok(Token::Minus(loc)),
            '*' => Ok(Token::Star(loc)),
            '/' => Ok(Token::Slash(loc)),
            ':' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::Assign(loc))
                } else {
                    Err(lex_error("Expected '=' after ':'", loc))
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                }
                Ok(Token::EqEq(loc))
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::NotEq(loc))
                } else {
                    Err(lex_error("Expected '=' after '!'", loc))
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::Le(loc))
                } else if self.peek() == Some('>') {
                    self.advance();
                    Ok(Token::NotEq(loc))
                } else {
                    Ok(Token::Lt(loc))
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::Ge(loc))
                } else {
                    Ok(Token::Gt(loc))
                }
            }
            '(' => {
                self.paren_depth += 1;
                Ok(Token::LParen(loc))
            }
            ')' => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                Ok(Token::RParen(loc))
            }
            ',' => Ok(Token::Comma(loc)),

            _ => Err(lex_error(format!("Unexpected character: '{}'", ch), loc)),
        }
    }

    fn string_literal(&mut self, loc: SourceLocation) -> Result<Token, ParseError> {
        let mut string = String::new();

        while let Some(ch) = self.peek() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(Token::Str(string, loc));
                }
                '\n' => break,
                '\\' => {
                    self.advance();
                    let escape_loc = self.current_location();
                    let escaped = self.advance().ok_or_else(|| {
                        lex_error("Unexpected end of input in string literal", escape_loc)
                    })?;
                    let unescaped = match escaped {
                        '"' => '"',
                        '\\' => '\\',
                        'n' => '\n',
                        't' => '\t',
                        _ => {
                            return Err(lex_error(
                                format!("Unknown escape sequence: \\{}", escaped),
                                escape_loc,
                            ));
                        }
                    };
                    string.push(unescaped);
                }
                _ => {
                    string.push(ch);
                    self.advance();
                }
            }
        }

        Err(lex_error("Unterminated string literal", loc))
    }

    fn number_literal(&mut self, first_digit: char, loc: SourceLocation) -> Result<Token, ParseError> {
        let mut num_str = String::new();
        num_str.push(first_digit);

        let mut seen_dot = false;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let value = num_str
            .parse::<f64>()
            .map_err(|_| lex_error(format!("Invalid number literal: {}", num_str), loc))?;

        Ok(Token::Number(value, loc))
    }

    fn identifier_or_keyword(&mut self, first_char: char, loc: SourceLocation) -> Token {
        let mut ident = String::new();
        ident.push(first_char);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match ident.as_str() {
            "IF" => Token::If(loc),
            "THEN" => Token::Then(loc),
            "ELSE" => Token::Else(loc),
            "ENDIF" => Token::EndIf(loc),
            "WHILE" => Token::While(loc),
            "DO" => Token::Do(loc),
            "LOOP" => Token::Loop(loc),
            "ENDLOOP" => Token::EndLoop(loc),
            "BREAK" => Token::Break(loc),
            "CONTINUE" => Token::Continue(loc),
            "INPUT" => Token::Input(loc),
            "OUTPUT" => Token::Output(loc),
            "TRUE" => Token::True(loc),
            "FALSE" => Token::False(loc),
            "NOT" => Token::Not(loc),
            "AND" => Token::And(loc),
            "OR" => Token::Or(loc),
            "MOD" => Token::Mod(loc),
            _ => Token::Ident(ident, loc),
        }
    }

    /// Skips spaces, tabs, `--` comments, and line breaks inside parentheses.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('\n') if self.paren_depth > 0 => {
                    self.advance();
                }
                Some('-') if self.peek_ahead(1) == Some('-') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<String> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let tokens = kinds("x := 1 -- set x\n\n\nOUTPUT x");
        assert_eq!(
            tokens,
            vec![
                "identifier 'x'",
                "':='",
                "number 1",
                "end of line",
                "'OUTPUT'",
                "identifier 'x'",
                "end of input"
            ]
        );
    }

    #[test]
    fn newlines_inside_parentheses_are_whitespace() {
        let tokens = kinds("MAX(1,\n 2)");
        assert!(!tokens.iter().any(|t| t == "end of line"));
    }

    #[test]
    fn string_escapes_are_decoded() {
        let tokens = Lexer::new(r#""say \"hi\" \\ ok""#).tokenize().unwrap();
        assert_eq!(tokens[0], Token::Str("say \"hi\" \\ ok".into(), SourceLocation::new(1, 1)));
    }

    #[test]
    fn unterminated_string_reports_its_start() {
        let err = Lexer::new("x := \"abc").tokenize().unwrap_err();
        assert_eq!((err.line, err.column), (1, 6));
    }
}
