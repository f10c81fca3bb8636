#![deny(missing_docs)]
//! Arithmetic expression evaluator over dense vectors with named bindings.
//!
//! Expressions combine numeric literals, identifiers and the operators
//! `+ - * / ^` (with parentheses and unary minus). Identifiers are bound to
//! scalars or to borrowed slices; binding a sub-range is just re-slicing the
//! caller's buffer, so evaluating the same expression over a window never
//! copies data. Binary operations broadcast scalars against vectors;
//! vector-vector operations require equal lengths.
//!
//! Elementwise functions: `exp ln log log10 sqrt abs sin cos tan`.
//! Reductions (vector to scalar): `sum mean min max`.

use std::collections::BTreeMap;

use thiserror::Error;

mod eval;
mod parse;

pub use parse::parse;

/// Errors reported by the parser and evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// The source text is not a valid expression.
    #[error("parse error at {position}: {message}")]
    Parse {
        /// Description of the problem.
        message: String,
        /// Byte offset into the source text.
        position: usize,
    },
    /// An identifier has no binding.
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    /// A call names a function the evaluator does not provide.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    /// A function was called with the wrong number of arguments.
    #[error("function '{function}' expects {expected} argument(s), got {got}")]
    Arity {
        /// Function name.
        function: String,
        /// Required argument count.
        expected: usize,
        /// Supplied argument count.
        got: usize,
    },
    /// Two vector operands have different lengths.
    #[error("shape mismatch: {left} vs {right}")]
    Shape {
        /// Length of the left operand.
        left: usize,
        /// Length of the right operand.
        right: usize,
    },
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// Bound identifier.
    Ident(String),
    /// Unary negation.
    Neg(Box<Expr>),
    /// Elementwise addition.
    Add(Box<Expr>, Box<Expr>),
    /// Elementwise subtraction.
    Sub(Box<Expr>, Box<Expr>),
    /// Elementwise multiplication.
    Mul(Box<Expr>, Box<Expr>),
    /// Elementwise division.
    Div(Box<Expr>, Box<Expr>),
    /// Elementwise power.
    Pow(Box<Expr>, Box<Expr>),
    /// Function call.
    Call(String, Vec<Expr>),
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A single number.
    Scalar(f64),
    /// A dense vector.
    Vector(Vec<f64>),
}

impl Value {
    /// Number of elements (1 for scalars).
    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Vector(v) => v.len(),
        }
    }

    /// True for an empty vector.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Vector(v) if v.is_empty())
    }

    /// Returns the scalar value, treating one-element vectors as scalars.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(s) => Some(*s),
            Value::Vector(v) if v.len() == 1 => Some(v[0]),
            Value::Vector(_) => None,
        }
    }

    /// Adds `self * scale` into `out` in place.
    ///
    /// Scalars broadcast over the whole slice; vectors must match its length.
    pub fn add_scaled_into(&self, out: &mut [f64], scale: f64) -> Result<(), ExprError> {
        match self {
            Value::Scalar(s) => {
                for y in out.iter_mut() {
                    *y += s * scale;
                }
            }
            Value::Vector(v) => {
                if v.len() != out.len() {
                    return Err(ExprError::Shape {
                        left: v.len(),
                        right: out.len(),
                    });
                }
                for (y, x) in out.iter_mut().zip(v) {
                    *y += x * scale;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Binding<'a> {
    Scalar(f64),
    Slice(&'a [f64]),
}

/// Named variable bindings borrowed from caller buffers.
///
/// Slice bindings are alias views: the evaluator reads the caller's memory
/// directly, and re-binding a name to a sub-range replaces the view without
/// copying.
#[derive(Debug, Clone, Default)]
pub struct Bindings<'a> {
    vars: BTreeMap<String, Binding<'a>>,
}

impl<'a> Bindings<'a> {
    /// Creates an empty binding set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to a scalar value.
    pub fn set_scalar(&mut self, name: impl Into<String>, value: f64) {
        self.vars.insert(name.into(), Binding::Scalar(value));
    }

    /// Binds `name` to a borrowed slice (alias view, no copy).
    pub fn set_slice(&mut self, name: impl Into<String>, values: &'a [f64]) {
        self.vars.insert(name.into(), Binding::Slice(values));
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.vars.clear();
    }

    fn get(&self, name: &str) -> Option<&Binding<'a>> {
        self.vars.get(name)
    }
}

impl Expr {
    /// Evaluates the expression against the provided bindings.
    pub fn eval(&self, bindings: &Bindings<'_>) -> Result<Value, ExprError> {
        eval::eval(self, bindings)
    }
}

/// Parses and evaluates `src` in one step.
pub fn eval(src: &str, bindings: &Bindings<'_>) -> Result<Value, ExprError> {
    parse(src)?.eval(bindings)
}
