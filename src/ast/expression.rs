use super::Value;
use crate::emitter::ExpressionFormatter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Binary operators of the rapcode language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "MOD",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    /// Binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => 3,
            BinaryOp::Add | BinaryOp::Subtract => 4,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 5,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "NOT",
        }
    }
}

pub const UNARY_PRECEDENCE: u8 = 6;
pub const ATOM_PRECEDENCE: u8 = 7;

/// Expression sub-tree of the shared syntax tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    Literal(Value),
    Variable(String),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Call {
        name: String,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn number(n: f64) -> Self {
        Expression::Literal(Value::Number(n))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Expression::Literal(Value::Text(s.into()))
    }

    pub fn boolean(b: bool) -> Self {
        Expression::Literal(Value::Bool(b))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(operand: Expression) -> Self {
        Expression::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        }
    }

    pub fn is_true_literal(&self) -> bool {
        matches!(self, Expression::Literal(Value::Bool(true)))
    }

    pub fn precedence(&self) -> u8 {
        match self {
            Expression::Binary { op, .. } => op.precedence(),
            Expression::Unary { .. } => UNARY_PRECEDENCE,
            Expression::Literal(Value::Number(n)) if n.is_sign_negative() => UNARY_PRECEDENCE,
            Expression::Literal(_) | Expression::Variable(_) | Expression::Call { .. } => {
                ATOM_PRECEDENCE
            }
        }
    }

    /// The prompt of a bare `INPUT()` / `INPUT("prompt")` call, which as the
    /// whole right-hand side of an assignment is an input statement.
    pub fn input_prompt(&self) -> Option<Option<String>> {
        match self {
            Expression::Call { name, args } if name.eq_ignore_ascii_case("INPUT") => match args.as_slice() {
                [] => Some(None),
                [Expression::Literal(Value::Text(prompt))] => Some(Some(prompt.clone())),
                _ => None,
            },
            _ => None,
        }
    }

    /// Collects the names of all variables this expression reads.
    pub fn collect_variables(&self, names: &mut HashSet<String>) {
        match self {
            Expression::Variable(name) => {
                names.insert(name.clone());
            }
            Expression::Binary { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expression::Unary { operand, .. } => operand.collect_variables(names),
            Expression::Call { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
            Expression::Literal(_) => {}
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&ExpressionFormatter::format(self))
    }
}
