//! Handler replies.

use http::StatusCode;
use serde_json::{Value, json};

/// A validation outcome: HTTP status plus the JSON document describing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: StatusCode,
    pub body: Value,
}

impl Outcome {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// `{"status": "failure", "error": msg}`.
    pub fn failure(status: StatusCode, msg: impl Into<String>) -> Self {
        Self::new(status, json!({ "status": "failure", "error": msg.into() }))
    }

    pub fn is_success(&self) -> bool {
        self.body.get("status").and_then(Value::as_str) == Some("success")
    }
}

/// HTTP response with status, headers, and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.to_string().into_bytes(),
        }
    }

    pub fn failure(status: StatusCode, msg: impl Into<String>) -> Self {
        Outcome::failure(status, msg).into()
    }

    /// 413 for a request body over `limit` bytes.
    pub fn too_large(limit: u64) -> Self {
        Self::failure(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Maximum accepted attachment size is {limit}"),
        )
    }

    pub fn html(status: StatusCode, body: String) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "text/html; charset=utf-8".into())],
            body: body.into_bytes(),
        }
    }

    pub fn tiff(body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![("Content-Type".into(), "image/tiff".into())],
            body,
        }
    }

    /// Status line in `"200 OK"` form.
    pub fn status_line(&self) -> String {
        match self.status.canonical_reason() {
            Some(reason) => format!("{} {}", self.status.as_u16(), reason.to_uppercase()),
            None => self.status.as_u16().to_string(),
        }
    }
}

impl From<Outcome> for Reply {
    fn from(outcome: Outcome) -> Self {
        Reply::json(outcome.status, &outcome.body)
    }
}
