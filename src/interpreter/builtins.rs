use crate::ast::Value;
use crate::error::RuntimeError;
use ahash::AHashMap;

/// A function callable from rapcode, either built in or registered by the host.
///
/// Names are matched case-insensitively; `name` should return the upper-case form.
pub trait NativeFunction: Send + Sync {
    fn name(&self) -> &str;
    fn call(&self, args: &[Value]) -> Result<Value, RuntimeError>;
}

fn type_mismatch(op: &str, expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        operation: op.to_string(),
        expected: expected.to_string(),
        found: found.clone(),
    }
}

fn single<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, RuntimeError> {
    match args {
        [arg] => Ok(arg),
        _ => Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected: "1".to_string(),
            found: args.len(),
        }),
    }
}

fn number(name: &str, value: &Value) -> Result<f64, RuntimeError> {
    value.as_number().ok_or_else(|| type_mismatch(name, "Number", value))
}

fn unary_numeric(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, RuntimeError> {
    let n = number(name, single(name, args)?)?;
    Ok(Value::Number(f(n)))
}

fn fold_numeric(name: &str, args: &[Value], pick: fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
    let Some((first, rest)) = args.split_first() else {
        return Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected: "at least 1".to_string(),
            found: 0,
        });
    };
    let mut acc = number(name, first)?;
    for arg in rest {
        acc = pick(acc, number(name, arg)?);
    }
    Ok(Value::Number(acc))
}

fn abs(args: &[Value]) -> Result<Value, RuntimeError> {
    unary_numeric("ABS", args, f64::abs)
}

fn sqrt(args: &[Value]) -> Result<Value, RuntimeError> {
    unary_numeric("SQRT", args, f64::sqrt)
}

fn floor(args: &[Value]) -> Result<Value, RuntimeError> {
    unary_numeric("FLOOR", args, f64::floor)
}

fn ceiling(args: &[Value]) -> Result<Value, RuntimeError> {
    unary_numeric("CEILING", args, f64::ceil)
}

fn round(args: &[Value]) -> Result<Value, RuntimeError> {
    unary_numeric("ROUND", args, f64::round)
}

fn min(args: &[Value]) -> Result<Value, RuntimeError> {
    fold_numeric("MIN", args, f64::min)
}

fn max(args: &[Value]) -> Result<Value, RuntimeError> {
    fold_numeric("MAX", args, f64::max)
}

fn length_of(args: &[Value]) -> Result<Value, RuntimeError> {
    match single("LENGTH_OF", args)? {
        Value::Text(s) => Ok(Value::Number(s.chars().count() as f64)),
        other => Err(type_mismatch("LENGTH_OF", "Text", other)),
    }
}

/// Defines the built-in function structs and their registration.
macro_rules! define_builtins {
    ( $( ($struct_name:ident, $name:literal, $call_fn:path) ),* $(,)? ) => {
        $(
            struct $struct_name;
            impl NativeFunction for $struct_name {
                fn name(&self) -> &str { $name }
                fn call(&self, args: &[Value]) -> Result<Value, RuntimeError> {
                    $call_fn(args)
                }
            }
        )*

        pub(super) fn register_builtins(registry: &mut AHashMap<String, Box<dyn NativeFunction>>) {
            $( registry.insert($name.to_string(), Box::new($struct_name)); )*
        }
    };
}

define_builtins! {
    (AbsFunction, "ABS", abs),
    (SqrtFunction, "SQRT", sqrt),
    (FloorFunction, "FLOOR", floor),
    (CeilingFunction, "CEILING", ceiling),
    (RoundFunction, "ROUND", round),
    (MinFunction, "MIN", min),
    (MaxFunction, "MAX", max),
    (LengthOfFunction, "LENGTH_OF", length_of),
}
