//! Built-in pattern operators for the default equality engine.
//!
//! Each constructor returns an [`Expectation::Operator`]. Operators that
//! hold nested expectations compare them through the active
//! [`Comparison`], so literals nested in a lax header match are compared
//! laxly too.

use std::fmt;
use std::sync::Arc;

use regex::bytes::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json_path::JsonPath;

use crate::descriptor::TypeDescriptor;
use crate::engine::Comparison;
use crate::expectation::{Expectation, Operator, Value};

/// Matches text, bytes or a JSON string against a regular expression.
pub fn re(pattern: &str) -> Result<Expectation, regex::Error> {
    Ok(Expectation::operator(Re {
        regex: Regex::new(pattern)?,
    }))
}

/// Matches a map containing `key`.
pub fn contains_key(key: impl Into<String>) -> Expectation {
    Expectation::operator(ContainsKey { key: key.into() })
}

/// Matches a map holding at least the given entries; extra keys are allowed.
pub fn super_map_of<I, K>(entries: I) -> Expectation
where
    I: IntoIterator<Item = (K, Expectation)>,
    K: Into<String>,
{
    Expectation::operator(SuperMapOf {
        entries: entries
            .into_iter()
            .map(|(key, expected)| (key.into(), expected))
            .collect(),
    })
}

/// Matches a list holding exactly the given items, in any order.
pub fn bag(items: impl IntoIterator<Item = Expectation>) -> Expectation {
    Expectation::operator(Bag {
        items: items.into_iter().collect(),
        superset: false,
    })
}

/// Matches a list holding at least the given items, in any order.
pub fn super_bag_of(items: impl IntoIterator<Item = Expectation>) -> Expectation {
    Expectation::operator(Bag {
        items: items.into_iter().collect(),
        superset: true,
    })
}

/// Matches a map whose `name` entry matches `expected`.
pub fn field(name: impl Into<String>, expected: impl Into<Expectation>) -> Expectation {
    Expectation::operator(Field {
        name: name.into(),
        expected: expected.into(),
    })
}

/// Matches the value at an RFC 6901 JSON pointer.
pub fn json_pointer(pointer: impl Into<String>, expected: impl Into<Expectation>) -> Expectation {
    Expectation::operator(JsonPointer {
        pointer: pointer.into(),
        expected: expected.into(),
    })
}

/// Matches the nodes selected by an RFC 9535 JSONPath query.
///
/// A single selected node is compared directly; several are compared as a
/// list. Selecting nothing never matches.
pub fn json_path(
    path: &str,
    expected: impl Into<Expectation>,
) -> Result<Expectation, serde_json_path::ParseError> {
    Ok(Expectation::operator(JsonPathOp {
        source: path.to_string(),
        path: JsonPath::parse(path)?,
        expected: expected.into(),
    }))
}

/// Matches anything but null, `false`, zero, and empty strings, lists or maps.
pub fn not_zero() -> Expectation {
    Expectation::operator(NotZero)
}

/// Matches when every expectation matches.
pub fn all(items: impl IntoIterator<Item = Expectation>) -> Expectation {
    Expectation::operator(All {
        items: items.into_iter().collect(),
    })
}

/// Declares `T` as the decode target for `inner`.
pub fn typed<T>(inner: impl Into<Expectation>) -> Expectation
where
    T: Serialize + DeserializeOwned + 'static,
{
    Expectation::operator(Typed {
        descriptor: TypeDescriptor::of::<T>(),
        inner: inner.into(),
    })
}

/// Matches when `f` accepts the observed value.
pub fn func<F>(f: F) -> Expectation
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    Expectation::operator(Func {
        descriptor: None,
        f: Arc::new(f),
    })
}

/// Decodes the observed value into `T` and matches when `f` accepts it.
pub fn smuggle<T, F>(f: F) -> Expectation
where
    T: Serialize + DeserializeOwned + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    Expectation::operator(Func {
        descriptor: Some(TypeDescriptor::of::<T>()),
        f: Arc::new(move |got: &Value| {
            serde_json::from_value::<T>(got.to_json())
                .map(|value| f(&value))
                .unwrap_or(false)
        }),
    })
}

#[derive(Debug)]
struct Re {
    regex: Regex,
}

impl Operator for Re {
    fn name(&self) -> &'static str {
        "re"
    }

    fn matches(&self, got: &Value, _cmp: &Comparison<'_>) -> bool {
        got.as_text_bytes()
            .is_some_and(|bytes| self.regex.is_match(bytes))
    }
}

#[derive(Debug)]
struct ContainsKey {
    key: String,
}

impl Operator for ContainsKey {
    fn name(&self) -> &'static str {
        "contains_key"
    }

    fn matches(&self, got: &Value, _cmp: &Comparison<'_>) -> bool {
        got.as_data()
            .and_then(serde_json::Value::as_object)
            .is_some_and(|map| map.contains_key(&self.key))
    }
}

#[derive(Debug)]
struct SuperMapOf {
    entries: Vec<(String, Expectation)>,
}

impl Operator for SuperMapOf {
    fn name(&self) -> &'static str {
        "super_map_of"
    }

    fn matches(&self, got: &Value, cmp: &Comparison<'_>) -> bool {
        let Some(map) = got.as_data().and_then(serde_json::Value::as_object) else {
            return false;
        };
        self.entries.iter().all(|(key, expected)| {
            map.get(key)
                .is_some_and(|actual| cmp.eq_data(actual, expected))
        })
    }
}

#[derive(Debug)]
struct Bag {
    items: Vec<Expectation>,
    superset: bool,
}

impl Operator for Bag {
    fn name(&self) -> &'static str {
        if self.superset {
            "super_bag_of"
        } else {
            "bag"
        }
    }

    fn matches(&self, got: &Value, cmp: &Comparison<'_>) -> bool {
        let Some(list) = got.as_data().and_then(serde_json::Value::as_array) else {
            return false;
        };
        if !self.superset && list.len() != self.items.len() {
            return false;
        }
        if list.len() < self.items.len() {
            return false;
        }
        max_matching(list, &self.items, cmp) == self.items.len()
    }
}

/// Size of a maximum matching between observed items and expectations
/// (Kuhn's augmenting paths).
fn max_matching(got: &[serde_json::Value], expected: &[Expectation], cmp: &Comparison<'_>) -> usize {
    let compatible: Vec<Vec<usize>> = expected
        .iter()
        .map(|exp| {
            got.iter()
                .enumerate()
                .filter(|(_, item)| cmp.eq_data(item, exp))
                .map(|(index, _)| index)
                .collect()
        })
        .collect();

    let mut owner: Vec<Option<usize>> = vec![None; got.len()];
    let mut size = 0;
    for exp in 0..expected.len() {
        let mut seen = vec![false; got.len()];
        if augment(exp, &compatible, &mut owner, &mut seen) {
            size += 1;
        }
    }
    size
}

fn augment(
    exp: usize,
    compatible: &[Vec<usize>],
    owner: &mut [Option<usize>],
    seen: &mut [bool],
) -> bool {
    for &item in &compatible[exp] {
        if seen[item] {
            continue;
        }
        seen[item] = true;
        let free = match owner[item] {
            None => true,
            Some(other) => augment(other, compatible, owner, seen),
        };
        if free {
            owner[item] = Some(exp);
            return true;
        }
    }
    false
}

#[derive(Debug)]
struct Field {
    name: String,
    expected: Expectation,
}

impl Operator for Field {
    fn name(&self) -> &'static str {
        "field"
    }

    fn matches(&self, got: &Value, cmp: &Comparison<'_>) -> bool {
        got.as_data()
            .and_then(|data| data.get(&self.name))
            .is_some_and(|actual| cmp.eq_data(actual, &self.expected))
    }
}

#[derive(Debug)]
struct JsonPointer {
    pointer: String,
    expected: Expectation,
}

impl Operator for JsonPointer {
    fn name(&self) -> &'static str {
        "json_pointer"
    }

    fn matches(&self, got: &Value, cmp: &Comparison<'_>) -> bool {
        got.as_data()
            .and_then(|data| data.pointer(&self.pointer))
            .is_some_and(|actual| cmp.eq_data(actual, &self.expected))
    }
}

struct JsonPathOp {
    source: String,
    path: JsonPath,
    expected: Expectation,
}

impl fmt::Debug for JsonPathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonPath")
            .field("path", &self.source)
            .field("expected", &self.expected)
            .finish()
    }
}

impl Operator for JsonPathOp {
    fn name(&self) -> &'static str {
        "json_path"
    }

    fn matches(&self, got: &Value, cmp: &Comparison<'_>) -> bool {
        let Some(data) = got.as_data() else {
            return false;
        };
        let nodes = self.path.query(data).all();
        match nodes.as_slice() {
            [] => false,
            [single] => cmp.eq_data(single, &self.expected),
            many => {
                let list = serde_json::Value::Array(many.iter().map(|n| (*n).clone()).collect());
                cmp.eq(&Value::Data(list), &self.expected)
            }
        }
    }
}

#[derive(Debug)]
struct NotZero;

impl Operator for NotZero {
    fn name(&self) -> &'static str {
        "not_zero"
    }

    fn matches(&self, got: &Value, _cmp: &Comparison<'_>) -> bool {
        use serde_json::Value as Json;

        match got {
            Value::Text(text) => !text.is_empty(),
            Value::Bytes(bytes) => !bytes.is_empty(),
            Value::Data(data) => match data {
                Json::Null => false,
                Json::Bool(b) => *b,
                Json::Number(n) => n.as_f64() != Some(0.0),
                Json::String(s) => !s.is_empty(),
                Json::Array(a) => !a.is_empty(),
                Json::Object(o) => !o.is_empty(),
            },
        }
    }
}

#[derive(Debug)]
struct All {
    items: Vec<Expectation>,
}

impl Operator for All {
    fn name(&self) -> &'static str {
        "all"
    }

    fn type_behind(&self) -> Option<TypeDescriptor> {
        self.items.iter().find_map(Expectation::type_behind)
    }

    fn matches(&self, got: &Value, cmp: &Comparison<'_>) -> bool {
        self.items.iter().all(|item| cmp.eq(got, item))
    }
}

#[derive(Debug)]
struct Typed {
    descriptor: TypeDescriptor,
    inner: Expectation,
}

impl Operator for Typed {
    fn name(&self) -> &'static str {
        "typed"
    }

    fn type_behind(&self) -> Option<TypeDescriptor> {
        Some(self.descriptor.clone())
    }

    fn matches(&self, got: &Value, cmp: &Comparison<'_>) -> bool {
        cmp.eq(got, &self.inner)
    }
}

type MatchFn = dyn Fn(&Value) -> bool + Send + Sync;

struct Func {
    descriptor: Option<TypeDescriptor>,
    f: Arc<MatchFn>,
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Func")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl Operator for Func {
    fn name(&self) -> &'static str {
        "func"
    }

    fn type_behind(&self) -> Option<TypeDescriptor> {
        self.descriptor.clone()
    }

    fn matches(&self, got: &Value, _cmp: &Comparison<'_>) -> bool {
        (self.f)(got)
    }
}
