//! Request cookies and their canonical projection.
//!
//! Parsing keeps the source text in `raw` (and `raw_expires` for
//! `Set-Cookie` lines). Matching compares the canonical form, which omits
//! both, so expectations never have to spell them out.

use chrono::{DateTime, Utc};
use hyper::header::COOKIE;
use hyper::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::expectation::Expectation;
use crate::headers::is_token_byte;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

/// An HTTP cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// The value was double-quoted on the wire
    pub quoted: bool,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub raw_expires: Option<String>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    /// Source text this cookie was parsed from
    pub raw: Option<String>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Cookie {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.raw_expires = Some(expires.to_rfc2822());
        self.expires = Some(expires);
        self
    }

    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Parse a `Set-Cookie` line. Unknown attributes are ignored, as are
    /// `Expires`/`Max-Age` values that do not parse.
    pub fn parse_set_cookie(line: &str) -> Option<Cookie> {
        let mut parts = line.split(';');
        let (name, value) = parts.next()?.trim().split_once('=')?;
        let mut cookie = parse_pair(name, value)?;
        cookie.raw = Some(line.to_string());

        for attr in parts {
            let (key, val) = match attr.trim().split_once('=') {
                Some((key, val)) => (key.trim(), val.trim()),
                None => (attr.trim(), ""),
            };
            match key.to_ascii_lowercase().as_str() {
                "path" if !val.is_empty() => cookie.path = Some(val.to_string()),
                "domain" if !val.is_empty() => {
                    cookie.domain = Some(val.trim_start_matches('.').to_string())
                }
                "expires" => {
                    cookie.raw_expires = Some(val.to_string());
                    cookie.expires = DateTime::parse_from_rfc2822(val)
                        .ok()
                        .map(|t| t.with_timezone(&Utc));
                }
                "max-age" => cookie.max_age = val.parse().ok(),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "samesite" => {
                    cookie.same_site = match val.to_ascii_lowercase().as_str() {
                        "lax" => Some(SameSite::Lax),
                        "strict" => Some(SameSite::Strict),
                        "none" => Some(SameSite::None),
                        _ => None,
                    }
                }
                _ => {}
            }
        }
        Some(cookie)
    }

    /// Comparison form: every field except `raw` and `raw_expires`.
    pub fn canonical(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "value": self.value,
            "quoted": self.quoted,
            "path": self.path,
            "domain": self.domain,
            "expires": self.expires.map(|t| t.to_rfc3339()),
            "maxAge": self.max_age,
            "secure": self.secure,
            "httpOnly": self.http_only,
            "sameSite": self.same_site,
        })
    }
}

fn parse_pair(name: &str, value: &str) -> Option<Cookie> {
    let name = name.trim();
    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return None;
    }

    let (value, quoted) = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => (inner, true),
        None => (value, false),
    };
    if !value.bytes().all(is_cookie_value_byte) {
        return None;
    }

    Some(Cookie {
        name: name.to_string(),
        value: value.to_string(),
        quoted,
        ..Default::default()
    })
}

fn is_cookie_value_byte(b: u8) -> bool {
    (0x20..0x7f).contains(&b) && b != b'"' && b != b';' && b != b'\\'
}

/// Parse one `Cookie` request header (`a=1; b="2"; flag`). A part without
/// `=` is a cookie with an empty value; invalid pairs are skipped. Values
/// are kept as sent, surrounding spaces included.
pub fn parse_cookie_header(line: &str) -> Vec<Cookie> {
    line.split(';')
        .filter_map(|pair| {
            let pair = pair.trim();
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let mut cookie = parse_pair(name, value)?;
            cookie.raw = Some(pair.to_string());
            Some(cookie)
        })
        .collect()
}

/// All cookies sent in the request's `Cookie` headers, in order.
pub fn request_cookies(headers: &HeaderMap) -> Vec<Cookie> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_cookie_header)
        .collect()
}

/// Canonical projection of a cookie list.
pub fn canonical_list(cookies: &[Cookie]) -> serde_json::Value {
    serde_json::Value::Array(cookies.iter().map(Cookie::canonical).collect())
}

impl Expectation {
    /// A literal cookie list; the request must carry exactly these cookies,
    /// in this order.
    pub fn cookies(cookies: impl IntoIterator<Item = Cookie>) -> Self {
        let cookies: Vec<Cookie> = cookies.into_iter().collect();
        Expectation::json(canonical_list(&cookies))
    }
}

impl From<Cookie> for Expectation {
    fn from(cookie: Cookie) -> Self {
        Expectation::json(cookie.canonical())
    }
}
