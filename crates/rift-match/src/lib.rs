//! Request matchers for intercepted HTTP traffic.
//!
//! A [`Matcher`] decides whether an outbound request captured during a test
//! has the expected shape, so a canned response can be served instead of a
//! real network call. Body matchers infer the type to decode the body into
//! from the [`Expectation`], decode it (raw, JSON or XML) and compare it
//! with a [`DeepEquals`] engine:
//!
//! ```
//! use rift_match::operators::{contains_key, re};
//! use rift_match::{body, header, InterceptedRequest};
//!
//! let matcher = body(re(r"\d+ test").unwrap())
//!     .and(header(contains_key("X-Custom")))
//!     .with_name("10-body+header");
//!
//! let req: InterceptedRequest = hyper::Request::post("http://example.com/")
//!     .header("x-custom", "YES")
//!     .body(bytes::Bytes::from_static(b"42 test"))
//!     .unwrap()
//!     .into();
//! assert!(matcher.check(&req));
//! ```

pub mod config;
pub mod cookie;
pub mod decode;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod expectation;
pub mod headers;
pub mod matcher;
pub mod matchers;
pub mod operators;
pub mod request;

pub use config::{ExpectationConfig, MatcherConfig, MatcherFile};
pub use cookie::{Cookie, SameSite};
pub use decode::{decode, DecodeStrategy};
pub use descriptor::{resolve_type, TypeDescriptor};
pub use engine::{Comparison, DeepEquals, Mode, StructuralEquality};
pub use error::{ConfigError, DecodeError};
pub use expectation::{Expectation, Operator, Value};
pub use matcher::Matcher;
pub use matchers::{body, cookies, header, json_body, xml_body, Matchers};
pub use request::InterceptedRequest;
