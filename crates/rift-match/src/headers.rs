//! Header normalization.
//!
//! `http::HeaderMap` stores names lowercased; matchers see them in canonical
//! MIME form (`x-custom` becomes `X-Custom`) as a `{name: [values...]}` map.

use hyper::HeaderMap;
use serde_json::{Map, Value as Json};

use crate::expectation::Expectation;

/// Canonical MIME form of a header name.
///
/// Names holding anything but token characters are returned unchanged.
pub fn canonical_header_name(name: &str) -> String {
    if !name.bytes().all(is_token_byte) {
        return name.to_string();
    }

    let mut canonical = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            canonical.push(c.to_ascii_uppercase());
        } else {
            canonical.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    canonical
}

pub(crate) fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Project a header map into `{canonical name: [values...]}`.
///
/// Values keep their order; non UTF-8 values are decoded lossily.
pub fn header_multimap(headers: &HeaderMap) -> Json {
    let mut map = Map::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        push_value(&mut map, canonical_header_name(name.as_str()), value);
    }
    Json::Object(map)
}

fn push_value(map: &mut Map<String, Json>, name: String, value: String) {
    match map
        .entry(name)
        .or_insert_with(|| Json::Array(Vec::new()))
    {
        Json::Array(values) => values.push(Json::String(value)),
        other => *other = Json::Array(vec![Json::String(value)]),
    }
}

impl Expectation {
    /// A literal header multimap. Names are canonicalized and repeated
    /// names accumulate values in order.
    ///
    /// ```
    /// use rift_match::Expectation;
    ///
    /// let exp = Expectation::headers([("x-custom", "YES"), ("Accept", "*/*")]);
    /// ```
    pub fn headers<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = Map::new();
        for (name, value) in entries {
            push_value(&mut map, canonical_header_name(name.as_ref()), value.into());
        }
        Expectation::json(Json::Object(map))
    }

    /// A literal header multimap equal to `headers`.
    pub fn header_map(headers: &HeaderMap) -> Self {
        Expectation::json(header_multimap(headers))
    }
}
