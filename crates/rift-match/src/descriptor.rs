//! Target type descriptors and type resolution.
//!
//! A [`TypeDescriptor`] names the shape a request body is decoded into before
//! comparison. Typed targets carry monomorphized decode functions, so
//! decoding "into a fresh value of type `T`" needs no reflection.

use std::any::TypeId;
use std::fmt;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::decode::xml::XmlNode;
use crate::error::DecodeError;
use crate::expectation::Expectation;

/// The shape a request body is decoded into.
#[derive(Clone, PartialEq)]
pub enum TypeDescriptor {
    /// Untyped: raw bytes for plain bodies, `serde_json::Value` for
    /// structured ones.
    Any,
    String,
    Bytes,
    Typed(TypedTarget),
}

impl TypeDescriptor {
    /// Descriptor for `T`. `String`, byte vectors and `serde_json::Value`
    /// map onto the dedicated variants.
    pub fn of<T>() -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let id = TypeId::of::<T>();
        if id == TypeId::of::<String>() {
            TypeDescriptor::String
        } else if id == TypeId::of::<Vec<u8>>() || id == TypeId::of::<Bytes>() {
            TypeDescriptor::Bytes
        } else if id == TypeId::of::<serde_json::Value>() {
            TypeDescriptor::Any
        } else {
            TypeDescriptor::Typed(TypedTarget::of::<T>())
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TypeDescriptor::Any => "any",
            TypeDescriptor::String => "string",
            TypeDescriptor::Bytes => "bytes",
            TypeDescriptor::Typed(target) => target.type_name,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Typed(target) => f.debug_tuple("Typed").field(target).finish(),
            other => f.write_str(other.type_name()),
        }
    }
}

/// A concrete Rust type to decode structured bodies into.
#[derive(Clone, Copy)]
pub struct TypedTarget {
    type_name: &'static str,
    json: fn(&[u8]) -> Result<serde_json::Value, DecodeError>,
    xml: fn(XmlNode) -> Result<serde_json::Value, DecodeError>,
}

impl TypedTarget {
    pub fn of<T>() -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        TypedTarget {
            type_name: std::any::type_name::<T>(),
            json: decode_json_as::<T>,
            xml: decode_xml_as::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Deserialize a JSON body into the target type and return its data view.
    pub fn decode_json(&self, body: &[u8]) -> Result<serde_json::Value, DecodeError> {
        (self.json)(body)
    }

    /// Deserialize a parsed XML tree into the target type and return its data view.
    pub fn decode_xml(&self, tree: XmlNode) -> Result<serde_json::Value, DecodeError> {
        (self.xml)(tree)
    }
}

impl PartialEq for TypedTarget {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
    }
}

impl fmt::Debug for TypedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

// Round-tripping through `T` drops unknown fields and applies serde defaults.
fn decode_json_as<T>(body: &[u8]) -> Result<serde_json::Value, DecodeError>
where
    T: Serialize + DeserializeOwned,
{
    let decoded: T = serde_json::from_slice(body)?;
    Ok(serde_json::to_value(&decoded)?)
}

fn decode_xml_as<T>(tree: XmlNode) -> Result<serde_json::Value, DecodeError>
where
    T: Serialize + DeserializeOwned,
{
    let decoded = T::deserialize(tree)?;
    Ok(serde_json::to_value(&decoded)?)
}

/// Resolve the type an observed body must be decoded into for `expectation`.
///
/// Uses the operator's declared type, else the literal's type, else `Any`.
/// Never fails.
pub fn resolve_type(expectation: &Expectation) -> TypeDescriptor {
    expectation.type_behind().unwrap_or(TypeDescriptor::Any)
}
