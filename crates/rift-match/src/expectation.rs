//! Expectations: what a matcher accepts.
//!
//! An [`Expectation`] is either a literal value, an opaque pattern
//! [`Operator`], or untyped. Literals carry the [`TypeDescriptor`] the
//! observed body is decoded into; operators may declare one through
//! [`Operator::type_behind`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::descriptor::TypeDescriptor;
use crate::engine::Comparison;

/// An observed value: a decoded request body, or a projection of request
/// metadata (headers, cookies).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(Bytes),
    /// Structured data (JSON/XML decodes, header multimaps, cookie lists)
    Data(serde_json::Value),
}

impl Value {
    /// Content bytes of textual values (`Text`, `Bytes`, or a `Data` string).
    pub fn as_text_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Text(text) => Some(text.as_bytes()),
            Value::Bytes(bytes) => Some(&bytes[..]),
            Value::Data(serde_json::Value::String(text)) => Some(text.as_bytes()),
            Value::Data(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    /// JSON view of this value. Bytes become an array of numbers, which is
    /// what `Vec<u8>` deserializes from.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Text(text) => serde_json::Value::String(text.clone()),
            Value::Bytes(bytes) => bytes.iter().map(|b| serde_json::Value::from(*b)).collect(),
            Value::Data(data) => data.clone(),
        }
    }
}

/// A pattern that decides for itself whether an observed value matches.
///
/// Operators compare nested values through the [`Comparison`] handle so the
/// active equality engine and mode apply recursively.
pub trait Operator: fmt::Debug + Send + Sync {
    /// Short operator name, used in logs.
    fn name(&self) -> &'static str;

    /// The concrete type this operator expects to be compared against, if any.
    fn type_behind(&self) -> Option<TypeDescriptor> {
        None
    }

    fn matches(&self, got: &Value, cmp: &Comparison<'_>) -> bool;
}

/// What a matcher should accept.
#[derive(Debug, Clone)]
pub enum Expectation {
    /// A literal value and the type the observed value is decoded into.
    Literal {
        value: Value,
        descriptor: TypeDescriptor,
    },
    /// An opaque pattern operator.
    Operator(Arc<dyn Operator>),
    /// No value at all; only matches a decoded `null`.
    Untyped,
}

impl Expectation {
    pub fn text(text: impl Into<String>) -> Self {
        Expectation::Literal {
            value: Value::Text(text.into()),
            descriptor: TypeDescriptor::String,
        }
    }

    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Expectation::Literal {
            value: Value::Bytes(bytes.into()),
            descriptor: TypeDescriptor::Bytes,
        }
    }

    /// An untyped structured literal; the body is decoded into `Any`.
    pub fn json(value: serde_json::Value) -> Self {
        Expectation::Literal {
            value: Value::Data(value),
            descriptor: TypeDescriptor::Any,
        }
    }

    /// A typed literal. The observed body is decoded into `T` before being
    /// compared, so fields `T` does not know about are ignored.
    pub fn of<T>(value: T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let descriptor = TypeDescriptor::of::<T>();
        let any: &dyn Any = &value;
        let value = if let Some(text) = any.downcast_ref::<String>() {
            Value::Text(text.clone())
        } else if let Some(bytes) = any.downcast_ref::<Vec<u8>>() {
            Value::Bytes(Bytes::copy_from_slice(bytes))
        } else if let Some(bytes) = any.downcast_ref::<Bytes>() {
            Value::Bytes(bytes.clone())
        } else {
            Value::Data(serde_json::to_value(&value)?)
        };
        Ok(Expectation::Literal { value, descriptor })
    }

    pub fn operator(operator: impl Operator + 'static) -> Self {
        Expectation::Operator(Arc::new(operator))
    }

    /// The declared target type: a literal's own type, or whatever the
    /// operator reports.
    pub fn type_behind(&self) -> Option<TypeDescriptor> {
        match self {
            Expectation::Literal { descriptor, .. } => Some(descriptor.clone()),
            Expectation::Operator(operator) => operator.type_behind(),
            Expectation::Untyped => None,
        }
    }
}

impl From<&str> for Expectation {
    fn from(text: &str) -> Self {
        Expectation::text(text)
    }
}

impl From<String> for Expectation {
    fn from(text: String) -> Self {
        Expectation::text(text)
    }
}

impl From<&[u8]> for Expectation {
    fn from(bytes: &[u8]) -> Self {
        Expectation::bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<Vec<u8>> for Expectation {
    fn from(bytes: Vec<u8>) -> Self {
        Expectation::bytes(bytes)
    }
}

impl From<Bytes> for Expectation {
    fn from(bytes: Bytes) -> Self {
        Expectation::bytes(bytes)
    }
}

impl From<serde_json::Value> for Expectation {
    fn from(value: serde_json::Value) -> Self {
        Expectation::json(value)
    }
}

impl From<Arc<dyn Operator>> for Expectation {
    fn from(operator: Arc<dyn Operator>) -> Self {
        Expectation::Operator(operator)
    }
}
