//! Body decoding strategies.
//!
//! A [`DecodeStrategy`] turns raw body bytes into a [`Value`] shaped by a
//! [`TypeDescriptor`]:
//!
//! | Strategy | `Any`                | `String`        | `Bytes`              | `Typed(T)`       |
//! |----------|----------------------|-----------------|----------------------|------------------|
//! | Raw      | bytes                | UTF-8 text      | bytes                | error            |
//! | Json     | `serde_json::Value`  | JSON string     | base64 JSON string   | deserialize `T`  |
//! | Xml      | element tree as data | root text       | root text bytes      | deserialize `T`  |

pub mod xml;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use crate::descriptor::TypeDescriptor;
use crate::error::DecodeError;
use crate::expectation::Value;

/// How a request body is decoded before comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// Identity copy; only string, bytes and untyped targets are supported
    #[default]
    Raw,
    /// `serde_json` deserialization
    Json,
    /// XML element tree, deserialized through serde
    Xml,
}

impl DecodeStrategy {
    /// Whether an empty body is handed to the decoder at all.
    ///
    /// Structured formats reject empty bodies up front; the raw strategy lets
    /// an explicit empty expectation match.
    pub fn accepts_empty_body(self) -> bool {
        matches!(self, DecodeStrategy::Raw)
    }

    pub fn name(self) -> &'static str {
        match self {
            DecodeStrategy::Raw => "raw",
            DecodeStrategy::Json => "json",
            DecodeStrategy::Xml => "xml",
        }
    }

    /// Decode `body` into a fresh value of `target`.
    pub fn decode(self, body: &[u8], target: &TypeDescriptor) -> Result<Value, DecodeError> {
        match self {
            DecodeStrategy::Raw => decode_raw(body, target),
            DecodeStrategy::Json => decode_json(body, target),
            DecodeStrategy::Xml => decode_xml(body, target),
        }
    }
}

/// Decode `body` with `strategy` into `target`.
pub fn decode(
    body: &[u8],
    strategy: DecodeStrategy,
    target: &TypeDescriptor,
) -> Result<Value, DecodeError> {
    strategy.decode(body, target)
}

fn decode_raw(body: &[u8], target: &TypeDescriptor) -> Result<Value, DecodeError> {
    match target {
        TypeDescriptor::String => String::from_utf8(body.to_vec())
            .map(Value::Text)
            .map_err(|_| DecodeError::InvalidUtf8),
        TypeDescriptor::Bytes | TypeDescriptor::Any => {
            Ok(Value::Bytes(Bytes::copy_from_slice(body)))
        }
        TypeDescriptor::Typed(target) => Err(DecodeError::UnsupportedRawTarget {
            type_name: target.type_name(),
        }),
    }
}

fn decode_json(body: &[u8], target: &TypeDescriptor) -> Result<Value, DecodeError> {
    match target {
        TypeDescriptor::Any => Ok(Value::Data(serde_json::from_slice(body)?)),
        TypeDescriptor::String => Ok(Value::Text(serde_json::from_slice(body)?)),
        TypeDescriptor::Bytes => {
            let encoded: String = serde_json::from_slice(body)?;
            Ok(Value::Bytes(STANDARD.decode(encoded)?.into()))
        }
        TypeDescriptor::Typed(target) => target.decode_json(body).map(Value::Data),
    }
}

fn decode_xml(body: &[u8], target: &TypeDescriptor) -> Result<Value, DecodeError> {
    let document = xml::parse(body)?;
    match target {
        TypeDescriptor::Any => Ok(Value::Data(document.tree.into_json())),
        TypeDescriptor::String => Ok(Value::Text(document.text)),
        TypeDescriptor::Bytes => Ok(Value::Bytes(document.text.into_bytes().into())),
        TypeDescriptor::Typed(target) => target.decode_xml(document.tree).map(Value::Data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Person {
        id: u64,
        name: String,
        #[serde(default)]
        age: u32,
    }

    #[test]
    fn test_raw_string_target() {
        let value = decode(b"42 test", DecodeStrategy::Raw, &TypeDescriptor::String).unwrap();
        assert_eq!(value, Value::Text("42 test".to_string()));
    }

    #[test]
    fn test_raw_bytes_and_any_targets() {
        for target in [TypeDescriptor::Bytes, TypeDescriptor::Any] {
            let value = decode(b"\x00\xff", DecodeStrategy::Raw, &target).unwrap();
            assert_eq!(value, Value::Bytes(Bytes::from_static(b"\x00\xff")));
        }
    }

    #[test]
    fn test_raw_string_rejects_invalid_utf8() {
        let err = decode(b"\xff", DecodeStrategy::Raw, &TypeDescriptor::String).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_raw_unsupported_target() {
        let err = decode(b"42", DecodeStrategy::Raw, &TypeDescriptor::of::<i64>()).unwrap_err();
        match err {
            DecodeError::UnsupportedRawTarget { type_name } => assert_eq!(type_name, "i64"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_json_any_target() {
        let value = decode(
            br#"{"name": "Bob", "tags": [1, 2]}"#,
            DecodeStrategy::Json,
            &TypeDescriptor::Any,
        )
        .unwrap();
        assert_eq!(value, Value::Data(json!({"name": "Bob", "tags": [1, 2]})));
    }

    #[test]
    fn test_json_string_target() {
        let value = decode(br#""hello""#, DecodeStrategy::Json, &TypeDescriptor::String).unwrap();
        assert_eq!(value, Value::Text("hello".to_string()));
        assert!(decode(b"42", DecodeStrategy::Json, &TypeDescriptor::String).is_err());
    }

    #[test]
    fn test_json_bytes_target_is_base64() {
        let value = decode(br#""aGVsbG8=""#, DecodeStrategy::Json, &TypeDescriptor::Bytes).unwrap();
        assert_eq!(value, Value::Bytes(Bytes::from_static(b"hello")));

        let err = decode(br#""***""#, DecodeStrategy::Json, &TypeDescriptor::Bytes).unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn test_json_typed_target() {
        let value = decode(
            br#"{"id": 42, "name": "Bob", "unknown": "dropped"}"#,
            DecodeStrategy::Json,
            &TypeDescriptor::of::<Person>(),
        )
        .unwrap();
        assert_eq!(value, Value::Data(json!({"id": 42, "name": "Bob", "age": 0})));
    }

    #[test]
    fn test_json_malformed() {
        let err = decode(b"{nope", DecodeStrategy::Json, &TypeDescriptor::Any).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_xml_any_target() {
        let value = decode(
            b"<person><id>42</id><name>Bob</name></person>",
            DecodeStrategy::Xml,
            &TypeDescriptor::Any,
        )
        .unwrap();
        assert_eq!(value, Value::Data(json!({"id": "42", "name": "Bob"})));
    }

    #[test]
    fn test_xml_typed_target() {
        let value = decode(
            b"<person><id> 42 </id><name>Bob</name><age>26</age></person>",
            DecodeStrategy::Xml,
            &TypeDescriptor::of::<Person>(),
        )
        .unwrap();
        assert_eq!(value, Value::Data(json!({"id": 42, "name": "Bob", "age": 26})));
    }

    #[test]
    fn test_xml_string_target() {
        let value = decode(b"<msg>hello</msg>", DecodeStrategy::Xml, &TypeDescriptor::String).unwrap();
        assert_eq!(value, Value::Text("hello".to_string()));
    }

    #[test]
    fn test_xml_bytes_target() {
        let value = decode(b"<blob>abc</blob>", DecodeStrategy::Xml, &TypeDescriptor::Bytes).unwrap();
        assert_eq!(value, Value::Bytes(Bytes::from_static(b"abc")));
    }

    #[test]
    fn test_xml_malformed() {
        let err = decode(b"<open>", DecodeStrategy::Xml, &TypeDescriptor::Any).unwrap_err();
        assert!(matches!(err, DecodeError::Xml(_)));
    }

    #[test]
    fn test_empty_body_policy() {
        assert!(DecodeStrategy::Raw.accepts_empty_body());
        assert!(!DecodeStrategy::Json.accepts_empty_body());
        assert!(!DecodeStrategy::Xml.accepts_empty_body());
    }

    #[test]
    fn test_default_strategy_is_raw() {
        assert_eq!(DecodeStrategy::default(), DecodeStrategy::Raw);
    }

    proptest! {
        #[test]
        fn prop_json_typed_decode_preserves_content(id in any::<u64>(), name in ".*", age in any::<u32>()) {
            let person = Person { id, name, age };
            let body = serde_json::to_vec(&person).unwrap();
            let value = decode(&body, DecodeStrategy::Json, &TypeDescriptor::of::<Person>()).unwrap();
            prop_assert_eq!(value, Value::Data(serde_json::to_value(&person).unwrap()));
        }

        #[test]
        fn prop_raw_string_decode_is_identity(text in ".*") {
            let value = decode(text.as_bytes(), DecodeStrategy::Raw, &TypeDescriptor::String).unwrap();
            prop_assert_eq!(value, Value::Text(text));
        }
    }
}
