use crate::ast::Value;
use crate::error::RuntimeError;
use ahash::AHashMap;

/// Variable bindings of one run. A single flat scope.
#[derive(Debug, Default)]
pub(super) struct Environment {
    vars: AHashMap<String, Value>,
}

impl Environment {
    pub(super) fn get(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.vars.get(name).ok_or_else(|| RuntimeError::UndefinedVariable {
            name: name.to_string(),
        })
    }

    pub(super) fn set(&mut self, name: &str, value: Value) {
        match self.vars.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.vars.insert(name.to_string(), value);
            }
        }
    }

    /// Converts raw input text for `target`: to the kind `target` already
    /// holds, or to a Number if it parses as one and Text otherwise.
    pub(super) fn coerce_input(&self, target: &str, raw: &str) -> Result<Value, RuntimeError> {
        coerce(self.vars.get(target), raw)
    }

    pub(super) fn into_sorted(self) -> Vec<(String, Value)> {
        let mut vars: Vec<_> = self.vars.into_iter().collect();
        vars.sort_by(|(a, _), (b, _)| a.cmp(b));
        vars
    }
}

pub(super) fn coerce(current: Option<&Value>, raw: &str) -> Result<Value, RuntimeError> {
    let text = raw.trim();
    let mismatch = |expected: &str| RuntimeError::TypeMismatch {
        operation: "INPUT".to_string(),
        expected: expected.to_string(),
        found: Value::Text(raw.to_string()),
    };
    match current {
        Some(Value::Number(_)) => parse_number(text).map(Value::Number).ok_or_else(|| mismatch("Number")),
        Some(Value::Bool(_)) => match text.to_ascii_uppercase().as_str() {
            "TRUE" => Ok(Value::Bool(true)),
            "FALSE" => Ok(Value::Bool(false)),
            _ => Err(mismatch("Bool")),
        },
        Some(Value::Text(_)) => Ok(Value::Text(raw.to_string())),
        None => Ok(parse_number(text)
            .map(Value::Number)
            .unwrap_or_else(|| Value::Text(raw.to_string()))),
    }
}

/// Finite numbers only; `NaN` and `inf` are not numeric input.
fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}
