//! Error types for body decoding and matcher configuration.

use std::fmt::Display;
use std::path::PathBuf;

/// Failure to decode a request body into the resolved target type.
///
/// Matchers never surface these to callers: a decode failure is a non-match.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(
        "Raw body matching only supports string, bytes or untyped expectations, not {type_name}"
    )]
    UnsupportedRawTarget { type_name: &'static str },

    #[error("Body is not valid UTF-8")]
    InvalidUtf8,

    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid XML body: {0}")]
    Xml(String),
}

impl serde::de::Error for DecodeError {
    fn custom<T: Display>(msg: T) -> Self {
        DecodeError::Xml(msg.to_string())
    }
}

/// Errors raised while building matchers from declarative configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read matcher file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse matcher file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid JSONPath {path:?}: {message}")]
    InvalidJsonPath { path: String, message: String },

    #[error(
        "Raw body matching only supports string, bytes or untyped expectations, not {type_name}"
    )]
    UnsupportedRawTarget { type_name: &'static str },

    #[error("Invalid {section} expectation: {message}")]
    InvalidExpectation {
        section: &'static str,
        message: String,
    },
}
