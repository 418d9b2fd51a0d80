//! Rift request matcher CLI
//!
//! Evaluates a matcher file against a recorded request and reports which
//! matchers accept it.
//!
//! Usage:
//!   rift-match --matchers matchers.yaml --request request.json [OPTIONS]
//!
//! The request file is JSON:
//!
//! ```json
//! { "method": "POST", "path": "/api", "headers": { "X-Custom": "YES" }, "body": "42 test" }
//! ```
//!
//! `bodyBase64` may replace `body` for binary payloads. Exits 0 when at least
//! one matcher matched, 1 when none did and 2 on errors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::{Method, Request};
use rift_match::{InterceptedRequest, MatcherFile};
use serde::Deserialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Rift request matcher - check a request against declared matchers
#[derive(Parser, Debug)]
#[command(name = "rift-match")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Matcher file (YAML or JSON)
    #[arg(short, long, env = "RIFT_MATCHERS")]
    matchers: PathBuf,

    /// Request description (JSON)
    #[arg(short, long, env = "RIFT_REQUEST")]
    request: PathBuf,

    /// Log why matchers fail (same as RUST_LOG=debug)
    #[arg(short, long)]
    verbose: bool,

    /// Stop at the first matching matcher, in name order
    #[arg(long)]
    first: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestFile {
    #[serde(default = "default_method")]
    method: String,
    #[serde(default = "default_path")]
    path: String,
    #[serde(default)]
    headers: BTreeMap<String, HeaderValues>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    body_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args).await {
        Ok(matched) => std::process::exit(if matched { 0 } else { 1 }),
        Err(e) => {
            eprintln!("{RED}Error:{RESET} {e:#}");
            std::process::exit(2);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: &Args) -> Result<bool> {
    let matchers = MatcherFile::load(&args.matchers)
        .and_then(|file| file.compile())
        .with_context(|| format!("loading matchers from {}", args.matchers.display()))?;
    info!("Loaded {} matcher(s)", matchers.len());

    let request = load_request(&args.request).await?;
    debug!("Request: {} {}", request.method(), request.uri());

    let mut matched = false;
    for matcher in &matchers {
        if matcher.check(&request) {
            println!("{GREEN}{BOLD}MATCH{RESET} {}", matcher.name());
            matched = true;
            if args.first {
                break;
            }
        } else {
            println!("{DIM}----  {}{RESET}", matcher.name());
        }
    }
    Ok(matched)
}

async fn load_request(path: &Path) -> Result<InterceptedRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading request from {}", path.display()))?;
    let file: RequestFile = serde_json::from_str(&content)
        .with_context(|| format!("parsing request from {}", path.display()))?;

    let body = match (file.body, file.body_base64) {
        (Some(_), Some(_)) => bail!("request has both body and bodyBase64"),
        (Some(text), None) => Bytes::from(text),
        (None, Some(encoded)) => Bytes::from(STANDARD.decode(encoded).context("decoding bodyBase64")?),
        (None, None) => Bytes::new(),
    };

    let method: Method = file
        .method
        .parse()
        .with_context(|| format!("invalid method {:?}", file.method))?;
    let mut builder = Request::builder().method(method).uri(&file.path);
    for (name, values) in &file.headers {
        match values {
            HeaderValues::One(value) => builder = builder.header(name, value),
            HeaderValues::Many(values) => {
                for value in values {
                    builder = builder.header(name, value);
                }
            }
        }
    }
    let request = builder.body(Full::new(body)).context("building request")?;

    Ok(InterceptedRequest::from_http(request).await)
}
