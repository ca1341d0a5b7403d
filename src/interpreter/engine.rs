use super::builtins::NativeFunction;
use super::cancel::CancellationToken;
use super::environment::{Environment, coerce};
use super::io::{InputSource, OutputSink};
use crate::ast::{BinaryOp, Expression, Statement, UnaryOp, Value};
use crate::error::RuntimeError;
use ahash::AHashMap;
use tracing::trace;

// This macro generates a match arm for a numeric binary operation.
macro_rules! eval_op {
    ($self:ident, $l:ident, $r:ident, $op:expr, $op_fn:expr, number) => {
        $self.eval_arithmetic($l, $r, $op, $op_fn)
    };
    ($self:ident, $l:ident, $r:ident, $op:expr, $op_fn:expr, ordering) => {
        $self.eval_ordering($l, $r, $op, $op_fn)
    };
}

/// How control leaves a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    Normal,
    Break,
    Continue,
}

/// Walks one program with its own environment and I/O endpoints.
pub(super) struct Executor<'a> {
    functions: &'a AHashMap<String, Box<dyn NativeFunction>>,
    output: &'a mut dyn OutputSink,
    input: &'a mut dyn InputSource,
    cancel: &'a CancellationToken,
    env: Environment,
    executed: usize,
}

impl<'a> Executor<'a> {
    pub(super) fn new(
        functions: &'a AHashMap<String, Box<dyn NativeFunction>>,
        output: &'a mut dyn OutputSink,
        input: &'a mut dyn InputSource,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            functions,
            output,
            input,
            cancel,
            env: Environment::default(),
            executed: 0,
        }
    }

    /// Final bindings sorted by name, and the number of statements executed.
    pub(super) fn finish(self) -> (Vec<(String, Value)>, usize) {
        (self.env.into_sorted(), self.executed)
    }

    fn check_cancelled(&self) -> Result<(), RuntimeError> {
        if self.cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        Ok(())
    }

    pub(super) fn execute(&mut self, stmt: &Statement) -> Result<Flow, RuntimeError> {
        if let Statement::Sequence(items) = stmt {
            for item in items {
                self.check_cancelled()?;
                match self.execute(item)? {
                    Flow::Normal => {}
                    jump => return Ok(jump),
                }
            }
            return Ok(Flow::Normal);
        }

        self.executed += 1;
        match stmt {
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.condition(condition, "IF")? {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::While { condition, body } => {
                loop {
                    self.check_cancelled()?;
                    if !self.condition(condition, "WHILE")? {
                        break;
                    }
                    if self.execute(body)? == Flow::Break {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::Assign { target, value } => {
                if let Some(prompt) = value.input_prompt() {
                    self.read_into(target, prompt.as_deref())?;
                    return Ok(Flow::Normal);
                }
                let value = self.evaluate(value)?;
                trace!(variable = %target, value = %value, "Assign");
                self.env.set(target, value);
                Ok(Flow::Normal)
            }
            Statement::Input { target, prompt } => {
                self.read_into(target, prompt.as_deref())?;
                Ok(Flow::Normal)
            }
            Statement::Output(value) => {
                let line = self.evaluate(value)?.to_string();
                self.output
                    .emit(&line)
                    .map_err(|e| RuntimeError::Sink(e.to_string()))?;
                Ok(Flow::Normal)
            }
            Statement::Call { name, args } => {
                self.call(name, args)?;
                Ok(Flow::Normal)
            }
            Statement::Break => Ok(Flow::Break),
            Statement::Continue => Ok(Flow::Continue),
            Statement::Sequence(_) => Ok(Flow::Normal),
        }
    }

    fn read_into(&mut self, target: &str, prompt: Option<&str>) -> Result<(), RuntimeError> {
        let raw = self.input.read(prompt).ok_or_else(|| RuntimeError::EndOfInput {
            target: target.to_string(),
        })?;
        let value = self.env.coerce_input(target, &raw)?;
        trace!(variable = %target, value = %value, "Input");
        self.env.set(target, value);
        Ok(())
    }

    fn condition(&mut self, condition: &Expression, op: &str) -> Result<bool, RuntimeError> {
        match self.evaluate(condition)? {
            Value::Bool(b) => Ok(b),
            other => Err(type_mismatch(op, "Bool", other)),
        }
    }

    pub(super) fn evaluate(&mut self, expr: &Expression) -> Result<Value, RuntimeError> {
        match expr {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Variable(name) => self.env.get(name).cloned(),
            Expression::Call { name, args } => self.call(name, args),
            Expression::Unary { op, operand } => {
                let value = self.evaluate(operand)?;
                match (op, value) {
                    (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Negate, other) => Err(type_mismatch("-", "Number", other)),
                    (UnaryOp::Not, other) => Err(type_mismatch("NOT", "Bool", other)),
                }
            }
            Expression::Binary { op, left, right } => match op {
                BinaryOp::And => self.eval_logical(left, right, "AND", false),
                BinaryOp::Or => self.eval_logical(left, right, "OR", true),
                BinaryOp::Add => self.eval_add(left, right),
                BinaryOp::Subtract => eval_op!(self, left, right, "-", |a, b| a - b, number),
                BinaryOp::Multiply => eval_op!(self, left, right, "*", |a, b| a * b, number),
                BinaryOp::Divide => self.eval_division(left, right, "/", |a, b| a / b),
                BinaryOp::Modulo => self.eval_division(left, right, "MOD", |a, b| a - b * (a / b).floor()),
                BinaryOp::Less => eval_op!(self, left, right, "<", |o| o.is_lt(), ordering),
                BinaryOp::LessEqual => eval_op!(self, left, right, "<=", |o| o.is_le(), ordering),
                BinaryOp::Greater => eval_op!(self, left, right, ">", |o| o.is_gt(), ordering),
                BinaryOp::GreaterEqual => eval_op!(self, left, right, ">=", |o| o.is_ge(), ordering),
                BinaryOp::Equal => self.eval_equality(left, right, "==").map(Value::Bool),
                BinaryOp::NotEqual => self.eval_equality(left, right, "!=").map(|eq| Value::Bool(!eq)),
            },
        }
    }

    fn call(&mut self, name: &str, args: &[Expression]) -> Result<Value, RuntimeError> {
        let key = name.to_ascii_uppercase();
        if key == "INPUT" {
            return self.read_input_expression(args);
        }
        let functions = self.functions;
        let function = functions
            .get(&key)
            .ok_or_else(|| RuntimeError::UnboundCall { name: name.to_string() })?;
        let values = args
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<Result<Vec<_>, _>>()?;
        trace!(function = %key, args = values.len(), "Call");
        function.call(&values)
    }

    /// `INPUT()` or `INPUT("prompt")` used as a value.
    fn read_input_expression(&mut self, args: &[Expression]) -> Result<Value, RuntimeError> {
        let prompt = match args {
            [] => None,
            [prompt] => Some(self.evaluate(prompt)?.to_string()),
            _ => {
                return Err(RuntimeError::ArityMismatch {
                    name: "INPUT".to_string(),
                    expected: "0 or 1".to_string(),
                    found: args.len(),
                });
            }
        };
        let raw = self
            .input
            .read(prompt.as_deref())
            .ok_or_else(|| RuntimeError::EndOfInput {
                target: "INPUT".to_string(),
            })?;
        coerce(None, &raw)
    }

    fn eval_logical(
        &mut self,
        l: &Expression,
        r: &Expression,
        op: &str,
        short_circuit_on: bool,
    ) -> Result<Value, RuntimeError> {
        let left = match self.evaluate(l)? {
            Value::Bool(b) => b,
            other => return Err(type_mismatch(op, "Bool", other)),
        };
        if left == short_circuit_on {
            return Ok(Value::Bool(left));
        }
        match self.evaluate(r)? {
            Value::Bool(b) => Ok(Value::Bool(b)),
            other => Err(type_mismatch(op, "Bool", other)),
        }
    }

    fn eval_add(&mut self, l: &Expression, r: &Expression) -> Result<Value, RuntimeError> {
        let left = self.evaluate(l)?;
        let right = self.evaluate(r)?;
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (left @ Value::Text(_), right) | (left, right @ Value::Text(_)) => {
                Ok(Value::Text(format!("{}{}", left, right)))
            }
            (Value::Number(_), other) | (other, _) => Err(type_mismatch("+", "Number", other)),
        }
    }

    fn eval_arithmetic<F>(&mut self, l: &Expression, r: &Expression, op: &str, f: F) -> Result<Value, RuntimeError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let left = self.evaluate(l)?;
        let right = self.evaluate(r)?;
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(a, b))),
            (Value::Number(_), other) | (other, _) => Err(type_mismatch(op, "Number", other)),
        }
    }

    /// Like arithmetic, but a zero divisor fails before the left operand's kind is checked.
    fn eval_division<F>(&mut self, l: &Expression, r: &Expression, op: &str, f: F) -> Result<Value, RuntimeError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let left = self.evaluate(l)?;
        let right = self.evaluate(r)?;
        if right == Value::Number(0.0) {
            return Err(RuntimeError::DivisionByZero {
                operation: op.to_string(),
            });
        }
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(a, b))),
            (Value::Number(_), other) | (other, _) => Err(type_mismatch(op, "Number", other)),
        }
    }

    fn eval_ordering<F>(&mut self, l: &Expression, r: &Expression, op: &str, f: F) -> Result<Value, RuntimeError>
    where
        F: Fn(std::cmp::Ordering) -> bool,
    {
        let left = self.evaluate(l)?;
        let right = self.evaluate(r)?;
        let ordering = match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Number(_), _) => return Err(type_mismatch(op, "Number", right.clone())),
            (Value::Text(_), _) => return Err(type_mismatch(op, "Text", right.clone())),
            (Value::Bool(_), _) => return Err(type_mismatch(op, "Number or Text", left.clone())),
        };
        // NaN compares false against everything
        Ok(Value::Bool(ordering.is_some_and(f)))
    }

    fn eval_equality(&mut self, l: &Expression, r: &Expression, op: &str) -> Result<bool, RuntimeError> {
        let left = self.evaluate(l)?;
        let right = self.evaluate(r)?;
        if !left.same_kind(&right) {
            return Err(type_mismatch(op, left.kind_name(), right));
        }
        Ok(left == right)
    }
}

fn type_mismatch(op: &str, expected: &str, found: Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        operation: op.to_string(),
        expected: expected.to_string(),
        found,
    }
}
