//! Declarative matcher files.
//!
//! A matcher file lists named matchers in YAML (or JSON, which YAML
//! accepts):
//!
//! ```yaml
//! matchers:
//!   - name: 10-body+header
//!     body: { matches: '\d+ test' }
//!     headers: { containsKey: X-Custom }
//!   - name: bob
//!     jsonBody: { jsonPointer: { pointer: /name, expect: Bob } }
//!     cookies: { superBagOf: [ { name: session, value: abc } ] }
//! ```
//!
//! Configs are plain serde types; [`MatcherFile::compile`] turns them into
//! [`Matcher`]s, validating regexes and JSONPath queries on the way.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cookie::Cookie;
use crate::error::ConfigError;
use crate::expectation::Expectation;
use crate::headers::canonical_header_name;
use crate::matcher::Matcher;
use crate::matchers::Matchers;
use crate::operators;

/// A file of matcher declarations.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct MatcherFile {
    #[serde(default)]
    pub matchers: Vec<MatcherConfig>,
}

impl MatcherFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Compile every declaration. The result is sorted by name, which is
    /// the order an interception layer tries them in.
    pub fn compile(&self) -> Result<Vec<Matcher>, ConfigError> {
        let mut compiled = self
            .matchers
            .iter()
            .enumerate()
            .map(|(index, config)| config.compile(index))
            .collect::<Result<Vec<_>, _>>()?;
        compiled.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(compiled)
    }
}

/// One matcher declaration. Every present section must match.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MatcherConfig {
    /// Defaults to `matcher-<index>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Raw body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ExpectationConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_body: Option<ExpectationConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml_body: Option<ExpectationConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<ExpectationConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<ExpectationConfig>,
}

impl MatcherConfig {
    /// Compile into a single matcher, AND-ing the sections. A declaration
    /// without sections matches every request.
    pub fn compile(&self, index: usize) -> Result<Matcher, ConfigError> {
        let matchers = Matchers::default();
        let mut sections = Vec::new();

        if let Some(body) = &self.body {
            sections.push(matchers.try_body(body.compile(Target::Body)?)?);
        }
        if let Some(json) = &self.json_body {
            sections.push(matchers.json_body(json.compile(Target::Json)?));
        }
        if let Some(xml) = &self.xml_body {
            sections.push(matchers.xml_body(xml.compile(Target::Xml)?));
        }
        if let Some(headers) = &self.headers {
            sections.push(matchers.header(headers.compile(Target::Headers)?));
        }
        if let Some(cookies) = &self.cookies {
            sections.push(matchers.cookies(cookies.compile(Target::Cookies)?));
        }

        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("matcher-{index}"));
        let matcher = sections
            .into_iter()
            .reduce(Matcher::and)
            .unwrap_or_else(|| Matcher::always(name.clone()));
        Ok(matcher.with_name(name))
    }
}

/// A declarative expectation.
///
/// Anything that is not one of the operator forms below is a literal, the
/// same as `equals`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ExpectationConfig {
    Equals(serde_json::Value),
    /// Regular expression over text
    Matches(String),
    ContainsKey(String),
    JsonPointer {
        pointer: String,
        expect: Box<ExpectationConfig>,
    },
    JsonPath {
        path: String,
        expect: Box<ExpectationConfig>,
    },
    Field {
        name: String,
        expect: Box<ExpectationConfig>,
    },
    SuperMapOf(BTreeMap<String, ExpectationConfig>),
    Bag(Vec<ExpectationConfig>),
    SuperBagOf(Vec<ExpectationConfig>),
    /// Must be `true`
    NotZero(bool),
    All(Vec<ExpectationConfig>),
    #[serde(untagged)]
    Literal(serde_json::Value),
}

/// What a literal stands for at its position in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Raw body text
    Body,
    Json,
    Xml,
    /// Whole header multimap
    Headers,
    /// Values of one header
    HeaderValues,
    /// Whole cookie list
    Cookies,
    /// One cookie
    Cookie,
    /// Nested structured value
    Plain,
}

impl Target {
    fn section(self) -> &'static str {
        match self {
            Target::Body => "body",
            Target::Json => "jsonBody",
            Target::Xml => "xmlBody",
            Target::Headers | Target::HeaderValues => "headers",
            Target::Cookies | Target::Cookie => "cookies",
            Target::Plain => "nested",
        }
    }

    fn invalid(self, message: impl Into<String>) -> ConfigError {
        ConfigError::InvalidExpectation {
            section: self.section(),
            message: message.into(),
        }
    }
}

impl ExpectationConfig {
    fn compile(&self, target: Target) -> Result<Expectation, ConfigError> {
        match self {
            ExpectationConfig::Equals(value) | ExpectationConfig::Literal(value) => {
                compile_literal(target, value)
            }
            ExpectationConfig::Matches(pattern) => {
                operators::re(pattern).map_err(|source| ConfigError::InvalidRegex {
                    pattern: pattern.clone(),
                    source,
                })
            }
            ExpectationConfig::ContainsKey(key) => {
                let key = if target == Target::Headers {
                    canonical_header_name(key)
                } else {
                    key.clone()
                };
                Ok(operators::contains_key(key))
            }
            ExpectationConfig::JsonPointer { pointer, expect } => Ok(operators::json_pointer(
                pointer.clone(),
                expect.compile(Target::Plain)?,
            )),
            ExpectationConfig::JsonPath { path, expect } => {
                operators::json_path(path, expect.compile(Target::Plain)?).map_err(|e| {
                    ConfigError::InvalidJsonPath {
                        path: path.clone(),
                        message: e.to_string(),
                    }
                })
            }
            ExpectationConfig::Field { name, expect } => Ok(operators::field(
                name.clone(),
                expect.compile(Target::Plain)?,
            )),
            ExpectationConfig::SuperMapOf(entries) => {
                let entries = entries
                    .iter()
                    .map(|(key, expect)| match target {
                        Target::Headers => Ok((
                            canonical_header_name(key),
                            expect.compile(Target::HeaderValues)?,
                        )),
                        _ => Ok((key.clone(), expect.compile(Target::Plain)?)),
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                Ok(operators::super_map_of(entries))
            }
            ExpectationConfig::Bag(items) => Ok(operators::bag(compile_items(items, target)?)),
            ExpectationConfig::SuperBagOf(items) => {
                Ok(operators::super_bag_of(compile_items(items, target)?))
            }
            ExpectationConfig::NotZero(true) => Ok(operators::not_zero()),
            ExpectationConfig::NotZero(false) => Err(target.invalid("notZero must be true")),
            ExpectationConfig::All(items) => Ok(operators::all(
                items
                    .iter()
                    .map(|item| item.compile(target))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
        }
    }
}

fn compile_items(items: &[ExpectationConfig], target: Target) -> Result<Vec<Expectation>, ConfigError> {
    let item_target = match target {
        Target::Cookies => Target::Cookie,
        _ => Target::Plain,
    };
    items.iter().map(|item| item.compile(item_target)).collect()
}

fn compile_literal(target: Target, value: &serde_json::Value) -> Result<Expectation, ConfigError> {
    use serde_json::Value as Json;

    match target {
        Target::Body => match value {
            Json::String(text) => Ok(Expectation::text(text.clone())),
            other => Err(target.invalid(format!("expected a string, got {other}"))),
        },
        Target::Json | Target::Xml | Target::Plain => Ok(Expectation::json(value.clone())),
        Target::Headers => {
            let Json::Object(map) = value else {
                return Err(target.invalid("expected a map of header names to values"));
            };
            let mut entries = Vec::new();
            for (name, values) in map {
                for header_value in header_values(target, values)? {
                    entries.push((name.as_str(), header_value));
                }
            }
            Ok(Expectation::headers(entries))
        }
        Target::HeaderValues => Ok(Expectation::json(Json::Array(
            header_values(target, value)?
                .into_iter()
                .map(Json::String)
                .collect(),
        ))),
        Target::Cookies => {
            let cookies: Vec<Cookie> = serde_json::from_value(value.clone())
                .map_err(|e| target.invalid(format!("expected a list of cookies: {e}")))?;
            Ok(Expectation::cookies(cookies))
        }
        Target::Cookie => {
            let cookie: Cookie = serde_json::from_value(value.clone())
                .map_err(|e| target.invalid(format!("expected a cookie: {e}")))?;
            Ok(Expectation::from(cookie))
        }
    }
}

/// A header value or list of values, as strings.
fn header_values(target: Target, value: &serde_json::Value) -> Result<Vec<String>, ConfigError> {
    use serde_json::Value as Json;

    let scalar = |v: &Json| match v {
        Json::String(s) => Ok(s.clone()),
        Json::Number(n) => Ok(n.to_string()),
        Json::Bool(b) => Ok(b.to_string()),
        other => Err(target.invalid(format!("invalid header value {other}"))),
    };
    match value {
        Json::Array(values) => values.iter().map(scalar).collect(),
        other => Ok(vec![scalar(other)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::InterceptedRequest;
    use bytes::Bytes;
    use hyper::{Method, Request};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn request(body: &'static str, headers: &[(&'static str, &'static str)]) -> InterceptedRequest {
        let mut builder = Request::builder().method(Method::POST).uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
            .into()
    }

    fn compile_one(yaml: &str) -> Matcher {
        let file = MatcherFile::from_yaml(yaml).unwrap();
        let mut matchers = file.compile().unwrap();
        assert_eq!(matchers.len(), 1);
        matchers.remove(0)
    }

    #[test]
    fn test_parse_expectation_forms() {
        let config: ExpectationConfig = serde_yaml::from_str("matches: '^a'").unwrap();
        assert_eq!(config, ExpectationConfig::Matches("^a".to_string()));

        let config: ExpectationConfig = serde_yaml::from_str("plain text").unwrap();
        assert_eq!(config, ExpectationConfig::Literal("plain text".into()));

        let config: ExpectationConfig =
            serde_yaml::from_str("{ name: session, value: abc }").unwrap();
        assert!(matches!(config, ExpectationConfig::Literal(_)));

        let config: ExpectationConfig =
            serde_yaml::from_str("jsonPointer: { pointer: /a, expect: { notZero: true } }")
                .unwrap();
        assert_eq!(
            config,
            ExpectationConfig::JsonPointer {
                pointer: "/a".to_string(),
                expect: Box::new(ExpectationConfig::NotZero(true)),
            }
        );
    }

    #[test]
    fn test_body_and_header_matcher() {
        let matcher = compile_one(
            r#"
matchers:
  - name: 10-body+header
    body: { matches: '\d+ test' }
    headers: { containsKey: x-custom }
"#,
        );
        assert_eq!(matcher.name(), "10-body+header");
        assert!(matcher.check(&request("42 test", &[("x-custom", "YES")])));
        assert!(!matcher.check(&request("42 test", &[])));
    }

    #[test]
    fn test_json_body_matcher() {
        let matcher = compile_one(
            r#"
matchers:
  - jsonBody:
      all:
        - jsonPointer: { pointer: /name, expect: Bob }
        - jsonPath: { path: '$.tags[*]', expect: { bag: [b, a] } }
"#,
        );
        assert_eq!(matcher.name(), "matcher-0");
        assert!(matcher.check(&request(r#"{"name": "Bob", "tags": ["a", "b"]}"#, &[])));
        assert!(!matcher.check(&request(r#"{"name": "Bob", "tags": ["a"]}"#, &[])));
        assert!(!matcher.check(&request("", &[])));
    }

    #[test]
    fn test_xml_body_equals() {
        let matcher = compile_one(
            r#"
matchers:
  - xmlBody: { equals: { id: "42", name: Bob } }
"#,
        );
        assert!(matcher.check(&request("<p><id>42</id><name>Bob</name></p>", &[])));
    }

    #[test]
    fn test_header_literal_and_super_map() {
        let exact = compile_one("matchers: [ { headers: { x-custom: YES } } ]");
        assert!(exact.check(&request("", &[("x-custom", "YES")])));
        assert!(!exact.check(&request("", &[("x-custom", "YES"), ("accept", "*/*")])));

        let subset = compile_one("matchers: [ { headers: { superMapOf: { x-custom: [YES] } } } ]");
        assert!(subset.check(&request("", &[("x-custom", "YES"), ("accept", "*/*")])));
        assert!(!subset.check(&request("", &[("x-custom", "NO")])));
    }

    #[test]
    fn test_cookie_matchers() {
        let subset = compile_one(
            "matchers: [ { cookies: { superBagOf: [ { name: third, value: cookie3 } ] } } ]",
        );
        let exact = compile_one("matchers: [ { cookies: [ { name: third, value: cookie3 } ] } ]");

        let req = request("", &[("cookie", "third=cookie3; another=cookieX")]);
        assert!(subset.check(&req));
        assert!(!exact.check(&req));
        assert!(exact.check(&request("", &[("cookie", "third=cookie3")])));
    }

    #[test]
    fn test_empty_config_matches_everything() {
        let matcher = compile_one("matchers: [ { name: catch-all } ]");
        assert_eq!(matcher.name(), "catch-all");
        assert!(matcher.check(&request("anything", &[])));
    }

    #[test]
    fn test_compile_sorts_by_name() {
        let file = MatcherFile::from_yaml(
            r#"
matchers:
  - name: 20-body
    body: { matches: '\d+ test' }
  - name: 10-body+header
    body: { matches: '\d+ test' }
    headers: { containsKey: X-Custom }
"#,
        )
        .unwrap();
        let names: Vec<_> = file
            .compile()
            .unwrap()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, ["10-body+header", "20-body"]);
    }

    #[test]
    fn test_compile_errors() {
        let err = MatcherFile::from_yaml("matchers: [ { body: { matches: '(' } } ]")
            .unwrap()
            .compile()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));

        let err = MatcherFile::from_yaml(
            "matchers: [ { jsonBody: { jsonPath: { path: '$[', expect: 1 } } } ]",
        )
        .unwrap()
        .compile()
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJsonPath { .. }));

        let err = MatcherFile::from_yaml("matchers: [ { body: { equals: [1, 2] } } ]")
            .unwrap()
            .compile()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExpectation { section: "body", .. }));

        let err = MatcherFile::from_yaml("matchers: [ { jsonBody: { notZero: false } } ]")
            .unwrap()
            .compile()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExpectation { .. }));

        let err = MatcherFile::from_yaml("matchers: [ { bogus: 1 } ]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"matchers": [{{"name": "json", "jsonBody": {{"field": {{"name": "id", "expect": 7}}}}}}]}}"#
        )
        .unwrap();

        let matchers = MatcherFile::load(file.path()).unwrap().compile().unwrap();
        assert_eq!(matchers[0].name(), "json");
        assert!(matchers[0].check(&request(r#"{"id": 7}"#, &[])));
    }

    #[test]
    fn test_load_missing_file() {
        let err = MatcherFile::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
