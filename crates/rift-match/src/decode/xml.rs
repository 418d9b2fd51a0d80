//! XML body decoding.
//!
//! Documents are parsed with `sxd-document` and folded into an [`XmlNode`]
//! tree, which is both convertible into `serde_json::Value` (untyped
//! targets) and a serde [`Deserializer`] (typed targets).
//!
//! Folding rules:
//! - the root element's own name is ignored
//! - an element with neither attributes nor child elements is its text
//! - otherwise it is a map of attributes (local name) and child elements;
//!   repeated child names collapse into a list, and non-blank text mixed
//!   with children is kept under `$text`

use serde::de::value::{MapAccessDeserializer, MapDeserializer, SeqDeserializer, StringDeserializer};
use serde::de::{Deserializer, IntoDeserializer, Visitor};
use serde::forward_to_deserialize_any;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;

use crate::error::DecodeError;

/// Key holding text mixed with child elements.
pub const TEXT_KEY: &str = "$text";

/// A folded XML element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Text(String),
    Element(Vec<(String, XmlNode)>),
    List(Vec<XmlNode>),
}

/// A parsed XML body.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// Folded root element
    pub tree: XmlNode,
    /// Text directly inside the root element
    pub text: String,
}

/// Parse an XML body.
pub fn parse(body: &[u8]) -> Result<XmlDocument, DecodeError> {
    let source = std::str::from_utf8(body).map_err(|_| DecodeError::InvalidUtf8)?;
    let package = parser::parse(source).map_err(|e| DecodeError::Xml(format!("{e:?}")))?;
    let document = package.as_document();

    let root = document
        .root()
        .children()
        .into_iter()
        .find_map(|child| match child {
            ChildOfRoot::Element(element) => Some(element),
            _ => None,
        })
        .ok_or_else(|| DecodeError::Xml("document has no root element".to_string()))?;

    Ok(XmlDocument {
        tree: fold(root),
        text: direct_text(root),
    })
}

fn direct_text(element: Element<'_>) -> String {
    element
        .children()
        .into_iter()
        .filter_map(|child| match child {
            ChildOfElement::Text(text) => Some(text.text().to_string()),
            _ => None,
        })
        .collect()
}

fn fold(element: Element<'_>) -> XmlNode {
    let mut entries: Vec<(String, XmlNode)> = element
        .attributes()
        .into_iter()
        .map(|attr| {
            (
                attr.name().local_part().to_string(),
                XmlNode::Text(attr.value().to_string()),
            )
        })
        .collect();
    let mut text = String::new();

    for child in element.children() {
        match child {
            ChildOfElement::Element(child) => {
                push_grouped(&mut entries, child.name().local_part(), fold(child));
            }
            ChildOfElement::Text(chunk) => text.push_str(chunk.text()),
            _ => {}
        }
    }

    if entries.is_empty() {
        return XmlNode::Text(text);
    }
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        entries.push((TEXT_KEY.to_string(), XmlNode::Text(trimmed.to_string())));
    }
    XmlNode::Element(entries)
}

fn push_grouped(entries: &mut Vec<(String, XmlNode)>, name: &str, node: XmlNode) {
    match entries.iter_mut().find(|(key, _)| key == name) {
        Some((_, XmlNode::List(items))) => items.push(node),
        Some((_, existing)) => {
            let first = std::mem::replace(existing, XmlNode::List(Vec::new()));
            *existing = XmlNode::List(vec![first, node]);
        }
        None => entries.push((name.to_string(), node)),
    }
}

impl XmlNode {
    /// Untyped view: text becomes a JSON string, elements objects, lists arrays.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            XmlNode::Text(text) => serde_json::Value::String(text),
            XmlNode::List(items) => items.into_iter().map(XmlNode::into_json).collect(),
            XmlNode::Element(entries) => serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(key, node)| (key, node.into_json()))
                    .collect(),
            ),
        }
    }

    fn into_text(self) -> Result<String, Self> {
        match self {
            XmlNode::Text(text) => Ok(text),
            other => Err(other),
        }
    }
}

impl<'de> IntoDeserializer<'de, DecodeError> for XmlNode {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

macro_rules! deserialize_parsed {
    ($($method:ident => $visit:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
                match self.into_text() {
                    Ok(text) => {
                        let parsed = text.trim().parse::<$ty>().map_err(|e| {
                            DecodeError::Xml(format!(
                                "invalid {} {:?}: {}",
                                stringify!($ty),
                                text,
                                e
                            ))
                        })?;
                        visitor.$visit(parsed)
                    }
                    Err(node) => node.deserialize_any(visitor),
                }
            }
        )*
    };
}

impl<'de> Deserializer<'de> for XmlNode {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self {
            XmlNode::Text(text) => visitor.visit_string(text),
            XmlNode::List(items) => visitor.visit_seq(SeqDeserializer::new(items.into_iter())),
            XmlNode::Element(entries) => {
                visitor.visit_map(MapDeserializer::new(entries.into_iter()))
            }
        }
    }

    deserialize_parsed! {
        deserialize_bool => visit_bool(bool),
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_f32 => visit_f32(f32),
        deserialize_f64 => visit_f64(f64),
        deserialize_char => visit_char(char),
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self {
            XmlNode::Element(entries) => {
                // Text mixed with children still reads as a string
                match entries.into_iter().find(|(key, _)| key == TEXT_KEY) {
                    Some((_, node)) => node.deserialize_any(visitor),
                    None => visitor.visit_string(String::new()),
                }
            }
            other => other.deserialize_any(visitor),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.into_text() {
            Ok(text) => visitor.visit_byte_buf(text.into_bytes()),
            Err(node) => node.deserialize_any(visitor),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        // A present element is always `Some`; absence is handled by the caller
        visitor.visit_some(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self {
            XmlNode::List(items) => visitor.visit_seq(SeqDeserializer::new(items.into_iter())),
            single => visitor.visit_seq(SeqDeserializer::new(std::iter::once(single))),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self {
            XmlNode::Text(text) if text.trim().is_empty() => {
                visitor.visit_map(MapDeserializer::new(std::iter::empty::<(String, XmlNode)>()))
            }
            XmlNode::Text(text) => visitor.visit_map(MapDeserializer::new(std::iter::once((
                TEXT_KEY.to_string(),
                XmlNode::Text(text),
            )))),
            other => other.deserialize_any(visitor),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        match self {
            XmlNode::Text(text) => {
                let variant: StringDeserializer<DecodeError> =
                    text.trim().to_string().into_deserializer();
                visitor.visit_enum(variant)
            }
            XmlNode::Element(entries) => visitor.visit_enum(MapAccessDeserializer::new(
                MapDeserializer::new(entries.into_iter()),
            )),
            XmlNode::List(_) => Err(DecodeError::Xml(
                "a repeated element cannot be decoded as an enum".to_string(),
            )),
        }
    }

    forward_to_deserialize_any! {
        i128 u128 identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Order {
        id: String,
        total: f64,
        paid: bool,
        #[serde(rename = "item")]
        items: Vec<Item>,
        note: Option<String>,
        status: Status,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Item {
        sku: String,
        qty: u32,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum Status {
        Open,
        Closed,
    }

    #[test]
    fn test_fold_attributes_and_children() {
        let doc = parse(br#"<order id="7"><item>a</item><item>b</item><note>x</note></order>"#)
            .unwrap();
        assert_eq!(
            doc.tree.into_json(),
            json!({"id": "7", "item": ["a", "b"], "note": "x"})
        );
    }

    #[test]
    fn test_leaf_root_is_text() {
        let doc = parse(b"<msg> hi </msg>").unwrap();
        assert_eq!(doc.tree, XmlNode::Text(" hi ".to_string()));
        assert_eq!(doc.text, " hi ");
    }

    #[test]
    fn test_mixed_text_is_kept() {
        let doc = parse(b"<p>hello <b>world</b></p>").unwrap();
        assert_eq!(doc.tree.into_json(), json!({"b": "world", "$text": "hello"}));
    }

    #[test]
    fn test_deserialize_struct() {
        let doc = parse(
            br#"<order id="A1">
                  <total>12.5</total>
                  <paid>true</paid>
                  <item><sku>x</sku><qty>2</qty></item>
                  <item><sku>y</sku><qty> 1 </qty></item>
                  <status>open</status>
                </order>"#,
        )
        .unwrap();
        let order = Order::deserialize(doc.tree).unwrap();
        assert_eq!(
            order,
            Order {
                id: "A1".to_string(),
                total: 12.5,
                paid: true,
                items: vec![
                    Item {
                        sku: "x".to_string(),
                        qty: 2
                    },
                    Item {
                        sku: "y".to_string(),
                        qty: 1
                    },
                ],
                note: None,
                status: Status::Open,
            }
        );
    }

    #[test]
    fn test_single_element_is_one_item_sequence() {
        let doc = parse(
            b"<order id=\"B\"><total>1</total><paid>false</paid><item><sku>z</sku><qty>3</qty></item><status>closed</status></order>",
        )
        .unwrap();
        let order = Order::deserialize(doc.tree).unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.status, Status::Closed);
        assert!(!order.paid);
    }

    #[test]
    fn test_invalid_scalar() {
        let doc = parse(b"<item><sku>x</sku><qty>many</qty></item>").unwrap();
        let err = Item::deserialize(doc.tree).unwrap_err();
        assert!(err.to_string().contains("invalid u32"));
    }

    #[test]
    fn test_not_xml() {
        assert!(matches!(parse(b"not xml at all"), Err(DecodeError::Xml(_))));
        assert!(matches!(parse(b"\xff\xfe"), Err(DecodeError::InvalidUtf8)));
    }
}
