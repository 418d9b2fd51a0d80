//! Deep equality between observed values and expectations.
//!
//! The engine is consumed through the [`DeepEquals`] trait so another
//! implementation can be injected. [`StructuralEquality`] is the default:
//!
//! - **Strict**: same kind and equal content; structured data compares
//!   with `serde_json::Value` equality (`26` and `26.0` differ). Text and
//!   a JSON string are the same kind, bytes are not.
//! - **Lax**: text, bytes and JSON strings compare by content, numbers by
//!   numeric value
//!
//! In both modes an [`Expectation::Operator`] decides for itself.

use crate::expectation::{Expectation, Value};

/// Comparison mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Strict,
    /// Relaxes exact-type requirements between convertible values
    Lax,
}

/// A deep-equality engine.
pub trait DeepEquals: Send + Sync {
    fn deep_equals(&self, got: &Value, expected: &Expectation, mode: Mode) -> bool;
}

/// Handle passed to operators for comparing nested values with the active
/// engine and mode.
#[derive(Clone, Copy)]
pub struct Comparison<'a> {
    engine: &'a dyn DeepEquals,
    mode: Mode,
}

impl<'a> Comparison<'a> {
    pub fn new(engine: &'a dyn DeepEquals, mode: Mode) -> Self {
        Self { engine, mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Compare a nested value against a nested expectation.
    pub fn eq(&self, got: &Value, expected: &Expectation) -> bool {
        self.engine.deep_equals(got, expected, self.mode)
    }

    /// Compare a nested structured value against a nested expectation.
    pub fn eq_data(&self, got: &serde_json::Value, expected: &Expectation) -> bool {
        self.eq(&Value::Data(got.clone()), expected)
    }
}

/// Default structural equality engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralEquality;

impl DeepEquals for StructuralEquality {
    fn deep_equals(&self, got: &Value, expected: &Expectation, mode: Mode) -> bool {
        match expected {
            Expectation::Untyped => matches!(got, Value::Data(serde_json::Value::Null)),
            Expectation::Operator(operator) => operator.matches(got, &Comparison::new(self, mode)),
            Expectation::Literal { value, .. } => values_equal(got, value, mode),
        }
    }
}

/// Compare two plain values.
pub fn values_equal(got: &Value, expected: &Value, mode: Mode) -> bool {
    match (got, expected, mode) {
        (Value::Data(a), Value::Data(b), Mode::Strict) => a == b,
        (Value::Data(a), Value::Data(b), Mode::Lax) => json_lax_equals(a, b),
        (Value::Text(a), Value::Text(b), _) => a == b,
        (Value::Text(a), Value::Data(serde_json::Value::String(b)), _)
        | (Value::Data(serde_json::Value::String(a)), Value::Text(b), _) => a == b,
        (Value::Bytes(a), Value::Bytes(b), _) => a == b,
        (_, _, Mode::Lax) => match (got.as_text_bytes(), expected.as_text_bytes()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => false,
    }
}

/// Exact structural equality, except numbers compare by value.
fn json_lax_equals(actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
    use serde_json::Value;

    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => {
            if a.is_f64() || b.is_f64() {
                a.as_f64() == b.as_f64()
            } else {
                a == b
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| json_lax_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && b.iter().all(|(key, expected_val)| {
                    a.get(key)
                        .is_some_and(|actual_val| json_lax_equals(actual_val, expected_val))
                })
        }
        (a, b) => a == b,
    }
}
