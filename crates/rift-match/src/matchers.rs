//! Matcher constructors for request bodies, headers and cookies.
//!
//! Body matchers resolve the decode target from the expectation once, at
//! construction. Each evaluation then reads a fresh body, decodes it into
//! that target and hands the result to the equality engine. Every failure
//! along the way is a non-match, never an error.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cookie::canonical_list;
use crate::decode::DecodeStrategy;
use crate::descriptor::{resolve_type, TypeDescriptor};
use crate::engine::{DeepEquals, Mode, StructuralEquality};
use crate::error::{ConfigError, DecodeError};
use crate::expectation::{Expectation, Value};
use crate::headers::header_multimap;
use crate::matcher::Matcher;
use crate::request::InterceptedRequest;

/// Builds matchers over one equality engine.
#[derive(Clone)]
pub struct Matchers {
    engine: Arc<dyn DeepEquals>,
}

impl Default for Matchers {
    fn default() -> Self {
        Self::with_engine(StructuralEquality)
    }
}

impl Matchers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: impl DeepEquals + 'static) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Match the raw body. An empty body can match an empty expectation.
    ///
    /// Only string, bytes and untyped expectations can be matched raw; any
    /// other declared type never matches and is reported with a warning on
    /// every evaluation. Use [`Matchers::try_body`] to catch it up front.
    #[track_caller]
    pub fn body(&self, expected: impl Into<Expectation>) -> Matcher {
        self.body_as(DecodeStrategy::Raw, expected)
    }

    /// Like [`Matchers::body`], but rejects expectations raw decoding cannot
    /// produce.
    #[track_caller]
    pub fn try_body(&self, expected: impl Into<Expectation>) -> Result<Matcher, ConfigError> {
        let expected = expected.into();
        if let TypeDescriptor::Typed(target) = resolve_type(&expected) {
            return Err(ConfigError::UnsupportedRawTarget {
                type_name: target.type_name(),
            });
        }
        Ok(self.body_as(DecodeStrategy::Raw, expected))
    }

    /// Match the body decoded as JSON. Empty bodies never match.
    #[track_caller]
    pub fn json_body(&self, expected: impl Into<Expectation>) -> Matcher {
        self.body_as(DecodeStrategy::Json, expected)
    }

    /// Match the body decoded as XML. Empty bodies never match.
    #[track_caller]
    pub fn xml_body(&self, expected: impl Into<Expectation>) -> Matcher {
        self.body_as(DecodeStrategy::Xml, expected)
    }

    /// Match the body decoded with `strategy`.
    #[track_caller]
    pub fn body_as(&self, strategy: DecodeStrategy, expected: impl Into<Expectation>) -> Matcher {
        let expected = expected.into();
        let target = resolve_type(&expected);
        let engine = self.engine.clone();
        Matcher::new("", move |req| {
            body_matches(engine.as_ref(), req, strategy, &target, &expected)
        })
    }

    /// Match the request's header multimap, in lax mode.
    ///
    /// A literal multimap must equal the request's headers exactly; use
    /// operators such as `contains_key` or `super_map_of` to ignore
    /// unrelated headers.
    #[track_caller]
    pub fn header(&self, expected: impl Into<Expectation>) -> Matcher {
        let expected = expected.into();
        let engine = self.engine.clone();
        Matcher::new("", move |req| {
            let got = Value::Data(header_multimap(req.headers()));
            engine.deep_equals(&got, &expected, Mode::Lax)
        })
    }

    /// Match the request's cookie list, in lax mode.
    ///
    /// Cookies are compared in their canonical form, without the `raw` and
    /// `raw_expires` fields.
    #[track_caller]
    pub fn cookies(&self, expected: impl Into<Expectation>) -> Matcher {
        let expected = expected.into();
        let engine = self.engine.clone();
        Matcher::new("", move |req| {
            let got = Value::Data(canonical_list(&req.cookies()));
            engine.deep_equals(&got, &expected, Mode::Lax)
        })
    }
}

fn body_matches(
    engine: &dyn DeepEquals,
    req: &InterceptedRequest,
    strategy: DecodeStrategy,
    target: &TypeDescriptor,
    expected: &Expectation,
) -> bool {
    let body = match req.body().read_all() {
        Ok(body) => body,
        Err(e) => {
            debug!("Cannot read request body: {}", e);
            return false;
        }
    };

    if body.is_empty() && !strategy.accepts_empty_body() {
        debug!("Empty body rejected by {} matcher", strategy.name());
        return false;
    }

    match strategy.decode(&body, target) {
        Ok(got) => engine.deep_equals(&got, expected, Mode::Strict),
        Err(e @ DecodeError::UnsupportedRawTarget { .. }) => {
            warn!("{}", e);
            false
        }
        Err(e) => {
            debug!(
                "Cannot decode {} body into {}: {}",
                strategy.name(),
                target.type_name(),
                e
            );
            false
        }
    }
}

/// [`Matchers::body`] over the default engine.
#[track_caller]
pub fn body(expected: impl Into<Expectation>) -> Matcher {
    Matchers::default().body(expected)
}

/// [`Matchers::json_body`] over the default engine.
#[track_caller]
pub fn json_body(expected: impl Into<Expectation>) -> Matcher {
    Matchers::default().json_body(expected)
}

/// [`Matchers::xml_body`] over the default engine.
#[track_caller]
pub fn xml_body(expected: impl Into<Expectation>) -> Matcher {
    Matchers::default().xml_body(expected)
}

/// [`Matchers::header`] over the default engine.
#[track_caller]
pub fn header(expected: impl Into<Expectation>) -> Matcher {
    Matchers::default().header(expected)
}

/// [`Matchers::cookies`] over the default engine.
#[track_caller]
pub fn cookies(expected: impl Into<Expectation>) -> Matcher {
    Matchers::default().cookies(expected)
}
