//! Rapcode pretty-printer.
//!
//! [`emit`] renders a statement tree as rapcode text: two-space indentation,
//! one statement per line, `LOOP` for an unconditional `While`, and only the
//! parentheses operator precedence requires. Output re-parses to a
//! structurally equal tree.

use crate::ast::{Expression, Statement, UNARY_PRECEDENCE, UnaryOp, Value};
use itertools::Itertools;

const INDENT: &str = "  ";

/// Render a statement tree as rapcode text.
pub fn emit(program: &Statement) -> String {
    let mut emitter = Emitter::default();
    emitter.statement(program);
    emitter.out
}

#[derive(Default)]
struct Emitter {
    out: String,
    depth: usize,
}

impl Emitter {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, body: &Statement) {
        self.depth += 1;
        self.statement(body);
        self.depth -= 1;
    }

    fn statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Sequence(items) => {
                for item in items {
                    self.statement(item);
                }
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.line(&format!("IF {} THEN", ExpressionFormatter::format(condition)));
                self.block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.line("ELSE");
                    self.block(else_branch);
                }
                self.line("ENDIF");
            }
            Statement::While { condition, body } => {
                if condition.is_true_literal() {
                    self.line("LOOP");
                } else {
                    self.line(&format!("WHILE {} DO", ExpressionFormatter::format(condition)));
                }
                self.block(body);
                self.line("ENDLOOP");
            }
            Statement::Assign { target, value } => {
                self.line(&format!("{} := {}", target, ExpressionFormatter::format(value)));
            }
            Statement::Input {
                target,
                prompt: Some(prompt),
            } => {
                self.line(&format!("{} := INPUT({})", target, quote(prompt)));
            }
            Statement::Input {
                target,
                prompt: None,
            } => self.line(&format!("INPUT {}", target)),
            Statement::Output(value) => {
                self.line(&format!("OUTPUT {}", ExpressionFormatter::format(value)));
            }
            Statement::Call { name, args } => {
                self.line(&format!("{}({})", name, format_arguments(args)));
            }
            Statement::Break => self.line("BREAK"),
            Statement::Continue => self.line("CONTINUE"),
        }
    }
}

/// Formats expressions, adding parentheses only when necessary.
pub struct ExpressionFormatter;

impl ExpressionFormatter {
    pub fn format(expr: &Expression) -> String {
        // Start with the lowest possible parent precedence.
        Self::format_recursive(expr, 0)
    }

    /// `parent_precedence` is the minimum precedence this position accepts
    /// without parentheses.
    fn format_recursive(expr: &Expression, parent_precedence: u8) -> String {
        let needs_parens = expr.precedence() < parent_precedence;

        let body = match expr {
            Expression::Literal(Value::Text(s)) => quote(s),
            Expression::Literal(value) => value.to_string(),
            Expression::Variable(name) => name.clone(),
            Expression::Binary { op, left, right } => {
                let prec = op.precedence();
                // Comparisons do not chain, and every other operator is left-associative.
                let left_min = if op.is_comparison() { prec + 1 } else { prec };
                format!(
                    "{} {} {}",
                    Self::format_recursive(left, left_min),
                    op.symbol(),
                    Self::format_recursive(right, prec + 1)
                )
            }
            Expression::Unary { op, operand } => match op {
                UnaryOp::Not => {
                    format!("NOT {}", Self::format_recursive(operand, UNARY_PRECEDENCE))
                }
                // `--` would start a comment
                UnaryOp::Negate => {
                    format!("-{}", Self::format_recursive(operand, UNARY_PRECEDENCE + 1))
                }
            },
            Expression::Call { name, args } => format!("{}({})", name, format_arguments(args)),
        };

        if needs_parens {
            format!("({})", body)
        } else {
            body
        }
    }
}

fn format_arguments(args: &[Expression]) -> String {
    args.iter().map(ExpressionFormatter::format).join(", ")
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for ch in s.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}
