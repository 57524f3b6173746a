//! HTTP type conversions between hyper and gateway events.
//!
//! The standalone server feeds the same adapter the serverless runtime
//! uses, so plain HTTP requests are first reshaped into gateway events.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use cog_gateway::{InboundEvent, OutboundEvent, Pairs};
use cog_validator::Reply;
use cog_validator::form::parse_urlencoded;
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use http_body_util::Full;

/// Convert a status code from u16.
pub fn status_from_u16(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Convert headers from (name, value) pairs, skipping invalid ones.
pub fn headers_from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a String, &'a String)>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            map.append(name, value);
        }
    }
    map
}

/// Convert request headers to ordered pairs.
pub fn headers_to_pairs(headers: &HeaderMap) -> Pairs {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Build a gateway event from request parts and the collected body.
///
/// Bodies that are not UTF-8 travel base64-encoded.
pub fn event_from_parts(parts: &Parts, body: Bytes) -> InboundEvent {
    let query = parts.uri.query().map(|q| {
        parse_urlencoded(q)
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Pairs>()
    });

    let (body, is_base64_encoded) = if body.is_empty() {
        (None, false)
    } else {
        match String::from_utf8(body.to_vec()) {
            Ok(text) => (Some(text), false),
            Err(_) => (Some(STANDARD.encode(&body)), true),
        }
    };

    InboundEvent {
        http_method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        query_string_parameters: query,
        headers: Some(headers_to_pairs(&parts.headers)),
        body,
        is_base64_encoded,
        request_context: None,
    }
}

/// Build an HTTP response from a gateway response event.
pub fn response_from_event(event: &OutboundEvent) -> anyhow::Result<Response<Full<Bytes>>> {
    let mut response = Response::new(Full::new(Bytes::from(event.body_bytes()?)));
    *response.status_mut() = status_from_u16(event.status_u16());
    *response.headers_mut() = headers_from_pairs(&event.headers);
    Ok(response)
}

/// Build an HTTP response from a reply produced outside the adapter.
pub fn response_from_reply(reply: Reply) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(reply.body)));
    *response.status_mut() = reply.status;
    *response.headers_mut() = headers_from_pairs(reply.headers.iter().map(|(k, v)| (k, v)));
    response
}
