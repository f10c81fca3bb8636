//! AST evaluation against a binding set.

use crate::{Binding, Bindings, Expr, ExprError, Value};

pub(crate) fn eval(expr: &Expr, bindings: &Bindings<'_>) -> Result<Value, ExprError> {
    match expr {
        Expr::Number(value) => Ok(Value::Scalar(*value)),
        Expr::Ident(name) => match bindings.get(name) {
            Some(Binding::Scalar(s)) => Ok(Value::Scalar(*s)),
            Some(Binding::Slice(v)) => Ok(Value::Vector(v.to_vec())),
            None => Err(ExprError::UnknownIdentifier(name.clone())),
        },
        Expr::Neg(inner) => Ok(map_unary(eval(inner, bindings)?, |x| -x)),
        Expr::Add(lhs, rhs) => binary(eval(lhs, bindings)?, eval(rhs, bindings)?, |a, b| a + b),
        Expr::Sub(lhs, rhs) => binary(eval(lhs, bindings)?, eval(rhs, bindings)?, |a, b| a - b),
        Expr::Mul(lhs, rhs) => binary(eval(lhs, bindings)?, eval(rhs, bindings)?, |a, b| a * b),
        Expr::Div(lhs, rhs) => binary(eval(lhs, bindings)?, eval(rhs, bindings)?, |a, b| a / b),
        Expr::Pow(lhs, rhs) => binary(eval(lhs, bindings)?, eval(rhs, bindings)?, f64::powf),
        Expr::Call(name, args) => call(name, args, bindings),
    }
}

fn map_unary(value: Value, f: impl Fn(f64) -> f64) -> Value {
    match value {
        Value::Scalar(s) => Value::Scalar(f(s)),
        Value::Vector(v) => Value::Vector(v.into_iter().map(f).collect()),
    }
}

fn binary(lhs: Value, rhs: Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, ExprError> {
    match (lhs, rhs) {
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(a, b))),
        (Value::Scalar(a), Value::Vector(b)) => {
            Ok(Value::Vector(b.into_iter().map(|x| f(a, x)).collect()))
        }
        (Value::Vector(a), Value::Scalar(b)) => {
            Ok(Value::Vector(a.into_iter().map(|x| f(x, b)).collect()))
        }
        (Value::Vector(a), Value::Vector(b)) => {
            if a.len() != b.len() {
                return Err(ExprError::Shape {
                    left: a.len(),
                    right: b.len(),
                });
            }
            Ok(Value::Vector(
                a.into_iter().zip(b).map(|(x, y)| f(x, y)).collect(),
            ))
        }
    }
}

fn call(name: &str, args: &[Expr], bindings: &Bindings<'_>) -> Result<Value, ExprError> {
    let elementwise: Option<fn(f64) -> f64> = match name {
        "exp" => Some(f64::exp),
        "ln" | "log" => Some(f64::ln),
        "log10" => Some(f64::log10),
        "sqrt" => Some(f64::sqrt),
        "abs" => Some(f64::abs),
        "sin" => Some(f64::sin),
        "cos" => Some(f64::cos),
        "tan" => Some(f64::tan),
        _ => None,
    };
    let reduction: Option<fn(&[f64]) -> f64> = match name {
        "sum" => Some(|v| v.iter().sum()),
        "mean" => Some(|v| {
            if v.is_empty() {
                f64::NAN
            } else {
                v.iter().sum::<f64>() / v.len() as f64
            }
        }),
        "min" => Some(|v| v.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" => Some(|v| v.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        _ => None,
    };
    if elementwise.is_none() && reduction.is_none() {
        return Err(ExprError::UnknownFunction(name.to_string()));
    }
    if args.len() != 1 {
        return Err(ExprError::Arity {
            function: name.to_string(),
            expected: 1,
            got: args.len(),
        });
    }
    let value = eval(&args[0], bindings)?;
    if let Some(f) = elementwise {
        return Ok(map_unary(value, f));
    }
    let f = reduction.ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;
    match value {
        Value::Scalar(s) => Ok(Value::Scalar(f(&[s]))),
        Value::Vector(v) => Ok(Value::Scalar(f(&v))),
    }
}
