//! Response capture.
//!
//! A `ResponseCapture` records what a handler emits during one call: the
//! status, the header list, and any bytes written through the `BodyWriter`
//! handed out by `start_response`. `finalize` folds that together with the
//! handler's returned chunks into an `OutboundEvent`.

use std::collections::BTreeMap;
use std::io;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::GatewayResult;
use crate::event::OutboundEvent;

/// Status reported when the handler never started a response.
pub const DEFAULT_STATUS: &str = "500";

/// Accumulates status, headers and body for one handler invocation.
#[derive(Debug, Default)]
pub struct ResponseCapture {
    status: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin (or restart) the response.
    ///
    /// Only the first whitespace-delimited token of `status` is kept. The
    /// header list replaces any previously captured one.
    pub fn start_response<I, K, V>(&mut self, status: &str, headers: I) -> BodyWriter<'_>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.status = status.split_whitespace().next().map(str::to_string);
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        BodyWriter { capture: self }
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Bytes written so far through a `BodyWriter`.
    pub fn buffered(&self) -> &[u8] {
        &self.body
    }

    /// Build the outbound event, appending `chunks` after the buffered body.
    pub fn finalize<I, C>(self, chunks: I) -> GatewayResult<OutboundEvent>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        self.finalize_with(chunks, &[])
    }

    /// Like `finalize`, but bodies whose `Content-Type` matches one of
    /// `binary_media_types` are base64-encoded instead of UTF-8 decoded.
    pub fn finalize_with<I, C>(
        self,
        chunks: I,
        binary_media_types: &[String],
    ) -> GatewayResult<OutboundEvent>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        // Decoded once as a whole: a code point may straddle chunks.
        let mut body = self.body;
        for chunk in chunks {
            body.extend_from_slice(chunk.as_ref());
        }

        let headers: BTreeMap<String, String> = self.headers.into_iter().collect();

        let binary = content_type(&headers)
            .is_some_and(|ct| is_binary_media_type(ct, binary_media_types));

        let (body, is_base64_encoded) = if binary {
            (STANDARD.encode(&body), true)
        } else {
            (String::from_utf8(body)?, false)
        };

        Ok(OutboundEvent {
            status_code: self.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            headers,
            body,
            is_base64_encoded,
        })
    }
}

fn content_type(headers: &BTreeMap<String, String>) -> Option<&str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.as_str())
}

fn is_binary_media_type(content_type: &str, binary_media_types: &[String]) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();
    binary_media_types.iter().any(|candidate| {
        candidate == "*/*"
            || candidate.eq_ignore_ascii_case(media_type)
            || candidate
                .strip_suffix("/*")
                .zip(media_type.split_once('/'))
                .is_some_and(|(family, (ty, _))| family.eq_ignore_ascii_case(ty))
    })
}

/// Write handle returned by `ResponseCapture::start_response`.
///
/// Each write appends to the capture's body buffer in call order.
pub struct BodyWriter<'a> {
    capture: &'a mut ResponseCapture,
}

impl BodyWriter<'_> {
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) {
        self.capture.body.extend_from_slice(chunk.as_ref());
    }
}

impl io::Write for BodyWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.capture.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    const NO_HEADERS: [(&str, &str); 0] = [];

    #[test]
    fn unset_status_defaults_to_500() {
        let event = ResponseCapture::new().finalize(Vec::<Vec<u8>>::new()).unwrap();
        assert_eq!(event.status_code, "500");
        assert!(event.headers.is_empty());
        assert_eq!(event.body, "");
    }

    #[test]
    fn status_keeps_first_token() {
        let mut capture = ResponseCapture::new();
        capture.start_response("404 NOT FOUND", NO_HEADERS);
        assert_eq!(capture.status(), Some("404"));
    }

    #[test]
    fn blank_status_stays_unset() {
        let mut capture = ResponseCapture::new();
        capture.start_response("   ", NO_HEADERS);
        let event = capture.finalize(Vec::<Vec<u8>>::new()).unwrap();
        assert_eq!(event.status_code, DEFAULT_STATUS);
    }

    #[test]
    fn restart_replaces_headers() {
        let mut capture = ResponseCapture::new();
        capture.start_response("200 OK", [("X-A", "1"), ("X-B", "2")]);
        capture.start_response("500 INTERNAL SERVER ERROR", [("X-C", "3")]);
        assert_eq!(capture.headers(), &[("X-C".to_string(), "3".to_string())]);
        assert_eq!(capture.status(), Some("500"));
    }

    #[test]
    fn writes_then_chunks_in_order() {
        let mut capture = ResponseCapture::new();
        let mut write = capture.start_response("200 OK", NO_HEADERS);
        write.write("A");
        write.write(b"B");
        let event = capture.finalize(["C", "D"]).unwrap();
        assert_eq!(event.body, "ABCD");
        assert_eq!(event.status_code, "200");
    }

    #[test]
    fn io_write_appends() {
        use std::io::Write;

        let mut capture = ResponseCapture::new();
        let mut write = capture.start_response("200 OK", NO_HEADERS);
        write!(write, "{}-{}", 1, 2).unwrap();
        assert_eq!(capture.buffered(), b"1-2");
    }

    #[test]
    fn duplicate_headers_collapse_last_wins() {
        let mut capture = ResponseCapture::new();
        capture.start_response(
            "200 OK",
            [("Set-Cookie", "a=1"), ("Set-Cookie", "b=2"), ("X-Id", "7")],
        );
        assert_eq!(capture.headers().len(), 3);
        let event = capture.finalize(Vec::<Vec<u8>>::new()).unwrap();
        assert_eq!(event.headers.len(), 2);
        assert_eq!(event.headers["Set-Cookie"], "b=2");
    }

    #[test]
    fn invalid_utf8_is_encoding_failure() {
        let mut capture = ResponseCapture::new();
        capture.start_response("200 OK", [("Content-Type", "image/tiff")]);
        let err = capture.finalize([vec![0x49, 0x49, 0x2a, 0x00, 0xff]]).unwrap_err();
        assert!(matches!(err, GatewayError::EncodingFailure(_)));
    }

    #[test]
    fn code_point_split_across_chunks() {
        let mut capture = ResponseCapture::new();
        capture
            .start_response("200 OK", [("Content-Type", "text/plain")])
            .write([0x63u8, 0x61, 0x66, 0xc3]);
        let event = capture.finalize([vec![0xa9u8], vec![0xc3], vec![0xa9]]).unwrap();
        assert_eq!(event.body, "café\u{e9}");
    }

    #[test]
    fn binary_media_type_is_base64_encoded() {
        let mut capture = ResponseCapture::new();
        capture.start_response("200 OK", [("Content-Type", "image/tiff")]);
        let event = capture
            .finalize_with([vec![0xffu8, 0x00, 0x01]], &["image/tiff".to_string()])
            .unwrap();
        assert!(event.is_base64_encoded);
        assert_eq!(event.body, "/wAB");
        assert_eq!(event.body_bytes().unwrap(), vec![0xff, 0x00, 0x01]);
    }

    #[test]
    fn text_stays_text_with_binary_types_configured() {
        let mut capture = ResponseCapture::new();
        capture.start_response("200 OK", [("content-type", "application/json; charset=utf-8")]);
        let event = capture
            .finalize_with(["{}"], &["image/*".to_string()])
            .unwrap();
        assert!(!event.is_base64_encoded);
        assert_eq!(event.body, "{}");
    }

    #[test]
    fn wildcard_media_types() {
        let types = vec!["image/*".to_string()];
        assert!(is_binary_media_type("image/tiff", &types));
        assert!(is_binary_media_type("IMAGE/png; q=1", &types));
        assert!(!is_binary_media_type("text/html", &types));
        assert!(is_binary_media_type("text/html", &["*/*".to_string()]));
    }
}
