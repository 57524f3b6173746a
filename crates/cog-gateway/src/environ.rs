//! Inbound event → request context translation.
//!
//! The request context is a CGI-style environment: string variables keyed
//! by their conventional names, a read-once body stream, and fixed protocol
//! metadata describing how the handler is being driven.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};

use crate::error::GatewayResult;
use crate::event::{InboundEvent, Pairs};

pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
pub const PATH_INFO: &str = "PATH_INFO";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const REMOTE_ADDR: &str = "REMOTE_ADDR";
pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
pub const SERVER_NAME: &str = "SERVER_NAME";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
pub const URL_SCHEME: &str = "wsgi.url_scheme";
pub const STAGE: &str = "AWS_API_GATEWAY_STAGE";

/// Remote address used when no forwarding header names the client.
pub const LOOPBACK: &str = "127.0.0.1";

/// Read-once sequential stream over a fully buffered request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyStream {
    inner: Cursor<Vec<u8>>,
}

impl BodyStream {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(bytes),
        }
    }

    /// True once every byte has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.inner.position() as usize >= self.inner.get_ref().len()
    }
}

impl Read for BodyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Normalized request handed to a downstream handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    vars: BTreeMap<String, String>,
    input: BodyStream,
    pub version: (u8, u8),
    pub multithread: bool,
    pub multiprocess: bool,
    pub run_once: bool,
}

impl RequestContext {
    /// Look up an environment variable (`PATH_INFO`, `HTTP_HOST`, ...).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn method(&self) -> &str {
        self.get(REQUEST_METHOD).unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.get(PATH_INFO).unwrap_or_default()
    }

    pub fn query_string(&self) -> &str {
        self.get(QUERY_STRING).unwrap_or_default()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get(CONTENT_TYPE)
    }

    pub fn content_length(&self) -> usize {
        self.get(CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn stage(&self) -> Option<&str> {
        self.get(STAGE)
    }

    /// A header by its normalized name (`HOST`, `X_FORWARDED_FOR`, ...).
    pub fn header(&self, normalized: &str) -> Option<&str> {
        self.get(&format!("HTTP_{normalized}"))
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The request body stream.
    pub fn input(&mut self) -> &mut BodyStream {
        &mut self.input
    }

    fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

/// Upper-case a header name and replace `-` with `_`.
pub fn normalize_header(key: &str) -> String {
    key.to_uppercase().replace('-', "_")
}

/// Form-encode a parameter mapping into a query string.
///
/// Keys and values are encoded independently; spaces become `+`.
pub fn encode_query(params: Option<&Pairs>) -> String {
    let Some(params) = params else {
        return String::new();
    };
    let mut out = String::new();
    for (i, (k, v)) in params.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        quote_plus(k, &mut out);
        out.push('=');
        quote_plus(v, &mut out);
    }
    out
}

fn quote_plus(s: &str, out: &mut String) {
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'.' | b'-' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(hex_digit(b >> 4));
                out.push(hex_digit(b & 0x0f));
            }
        }
    }
}

fn hex_digit(n: u8) -> char {
    match n {
        0..=9 => (b'0' + n) as char,
        _ => (b'A' + n - 10) as char,
    }
}

/// Translate a gateway event into a request context.
pub fn translate_request(event: &InboundEvent) -> GatewayResult<RequestContext> {
    let body = event.body_bytes()?;
    let content_length = event.content_length(&body);

    let mut ctx = RequestContext {
        vars: BTreeMap::new(),
        input: BodyStream::new(body),
        version: (1, 0),
        multithread: false,
        multiprocess: false,
        run_once: false,
    };

    ctx.set(REQUEST_METHOD, event.http_method.as_str());
    ctx.set(SCRIPT_NAME, "");
    ctx.set(PATH_INFO, event.path.as_str());
    ctx.set(QUERY_STRING, encode_query(event.query_string_parameters.as_ref()));
    ctx.set(REMOTE_ADDR, LOOPBACK);
    ctx.set(CONTENT_LENGTH, content_length.to_string());
    ctx.set("HTTP", "on");
    ctx.set(SERVER_PROTOCOL, "HTTP/1.1");

    if let Some(stage) = event.stage() {
        ctx.set(STAGE, stage);
    }

    for (key, value) in event.headers.iter().flat_map(|h| h.iter()) {
        let key = normalize_header(key);
        match key.as_str() {
            "CONTENT_TYPE" => ctx.set(CONTENT_TYPE, value),
            "HOST" => ctx.set(SERVER_NAME, value),
            "X_FORWARDED_FOR" => {
                let client = value.split(',').next().unwrap_or_default().trim();
                ctx.set(REMOTE_ADDR, client);
            }
            "X_FORWARDED_PROTO" => ctx.set(URL_SCHEME, value),
            "X_FORWARDED_PORT" => ctx.set(SERVER_PORT, value),
            _ => {}
        }
        ctx.set(format!("HTTP_{key}"), value);
    }

    Ok(ctx)
}
