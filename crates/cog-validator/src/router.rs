//! Request routing.

use std::io::Read;

use cog_gateway::environ::{SCRIPT_NAME, SERVER_NAME, SERVER_PORT, URL_SCHEME};
use cog_gateway::{Application, RequestContext, ResponseCapture};
use http::StatusCode;
use serde_json::json;
use tracing::{debug, warn};

use crate::CogService;
use crate::form::{self, Fields, Form};
use crate::reply::Reply;

/// Paths served by the service, for telling 404 from 405.
const ROUTES: &[&str] = &[
    "/api/validate",
    "/html",
    "/html/validate",
    "/health",
    "/self_test/valid.tif",
    "/self_test/invalid.tif",
];

/// A request after body reading and form parsing.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: Fields,
    pub form: Form,
    /// Externally visible base URL, stage included, no trailing slash.
    pub root_url: String,
}

impl Request {
    /// Build from a request context whose body has already been read.
    pub fn from_context(ctx: &RequestContext, body: &[u8]) -> Self {
        let form = if ctx.method() == "POST" {
            form::parse_body(ctx.content_type(), body).unwrap_or_else(|e| {
                warn!(error = %e, "unparseable form body");
                Form::default()
            })
        } else {
            Form::default()
        };

        Self {
            method: ctx.method().to_string(),
            path: ctx.path().to_string(),
            query: form::parse_urlencoded(ctx.query_string()),
            form,
            root_url: root_url(ctx),
        }
    }
}

/// `scheme://host[:port]` plus script name and deployment stage.
pub fn root_url(ctx: &RequestContext) -> String {
    let scheme = ctx.get(URL_SCHEME).unwrap_or("http");
    let host = match ctx.header("HOST") {
        Some(host) => host.to_string(),
        None => {
            let name = ctx.get(SERVER_NAME).unwrap_or("localhost");
            match ctx.get(SERVER_PORT) {
                Some(port) if !is_default_port(scheme, port) => format!("{name}:{port}"),
                _ => name.to_string(),
            }
        }
    };

    let mut url = format!(
        "{scheme}://{host}{}",
        ctx.get(SCRIPT_NAME).unwrap_or_default()
    );
    if let Some(stage) = ctx.stage() {
        url.push('/');
        url.push_str(stage);
    }
    url
}

fn is_default_port(scheme: &str, port: &str) -> bool {
    matches!((scheme, port), ("http", "80") | ("https", "443"))
}

impl CogService {
    /// Handle one request end to end.
    pub fn handle(&self, ctx: &mut RequestContext) -> Reply {
        let limit = self.config.max_content_length;
        if ctx.content_length() as u64 > limit {
            return Reply::too_large(limit);
        }

        let mut body = Vec::new();
        if let Err(e) = ctx.input().take(limit.saturating_add(1)).read_to_end(&mut body) {
            return Reply::failure(StatusCode::BAD_REQUEST, format!("unreadable body: {e}"));
        }
        if body.len() as u64 > limit {
            return Reply::too_large(limit);
        }

        let req = Request::from_context(ctx, &body);
        let reply = self.route(&req);
        debug!(
            method = %req.method,
            path = %req.path,
            status = reply.status.as_u16(),
            "request handled"
        );
        reply
    }

    pub fn route(&self, req: &Request) -> Reply {
        match (req.method.as_str(), req.path.as_str()) {
            ("GET" | "POST", "/api/validate") => self.api_validate(req).into(),
            ("GET", "/html") => self.html_main(req),
            ("POST", "/html/validate") => self.html_validate(req),
            ("GET", "/health") => Reply::json(
                StatusCode::OK,
                &json!({ "status": "OK", "message": "system ok" }),
            ),
            ("GET", "/self_test/valid.tif") => self.self_test("byte_cog_valid.tif"),
            ("GET", "/self_test/invalid.tif") => self.self_test("byte.tif"),
            (_, path) if ROUTES.contains(&path) => {
                Reply::failure(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
            }
            _ => Reply::failure(StatusCode::NOT_FOUND, "not found"),
        }
    }

    fn self_test(&self, file: &str) -> Reply {
        let path = self.config.self_test_dir.join(file);
        match std::fs::read(&path) {
            Ok(data) => Reply::tiff(data),
            Err(e) => {
                warn!(path = ?path, error = %e, "self-test file unavailable");
                Reply::failure(StatusCode::NOT_FOUND, format!("{file} unavailable"))
            }
        }
    }
}

impl Application for CogService {
    fn call(&self, mut ctx: RequestContext, capture: &mut ResponseCapture) -> Vec<Vec<u8>> {
        let reply = self.handle(&mut ctx);
        capture.start_response(&reply.status_line(), reply.headers);
        vec![reply.body]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cog_gateway::{Gateway, InboundEvent, translate_request};
    use serde_json::Value;

    use super::*;
    use crate::config::CogConfig;
    use crate::error::{FetchResult, InspectResult};
    use crate::fetch::{Fetcher, Probe};
    use crate::inspect::{Inspection, Inspector};

    struct AlwaysValid;

    impl Inspector for AlwaysValid {
        fn inspect(&self, path: &str) -> InspectResult<Option<Inspection>> {
            Ok(Some(Inspection {
                info: json!({ "files": [path] }),
                errors: Vec::new(),
                details: json!({}),
            }))
        }
    }

    struct NeverOpens;

    impl Inspector for NeverOpens {
        fn inspect(&self, _path: &str) -> InspectResult<Option<Inspection>> {
            Ok(None)
        }
    }

    struct Offline;

    impl Fetcher for Offline {
        fn probe(&self, _url: &str) -> FetchResult<Probe> {
            Ok(Probe::Empty(None))
        }

        fn download(&self, _url: &str) -> FetchResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn service_with(config: CogConfig, inspector: Arc<dyn Inspector>) -> CogService {
        CogService::new(config, inspector, Arc::new(Offline))
    }

    fn service() -> CogService {
        service_with(CogConfig::default(), Arc::new(AlwaysValid))
    }

    fn handle(svc: &CogService, event: &InboundEvent) -> Reply {
        let mut ctx = translate_request(event).unwrap();
        svc.handle(&mut ctx)
    }

    fn json_body(reply: &Reply) -> Value {
        serde_json::from_slice(&reply.body).unwrap()
    }

    #[test]
    fn health() {
        let reply = handle(&service(), &InboundEvent::new("GET", "/health"));
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(json_body(&reply), json!({ "status": "OK", "message": "system ok" }));
    }

    #[test]
    fn unknown_path_is_404() {
        let reply = handle(&service(), &InboundEvent::new("GET", "/nope"));
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn wrong_method_is_405() {
        let reply = handle(&service(), &InboundEvent::new("DELETE", "/health"));
        assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn get_validate_ignores_local_filename() {
        let event = InboundEvent::new("GET", "/api/validate")
            .with_query("local_filename", "/etc/passwd")
            .with_query("url", "http://h/a.tif");
        let reply = handle(&service(), &event);
        assert_eq!(reply.status, StatusCode::OK);
        let body = json_body(&reply);
        assert_eq!(body["status"], "success");
        assert_eq!(body["gdal_info"]["files"], json!(["/vsicurl/http://h/a.tif"]));
    }

    #[test]
    fn oversized_body_is_413() {
        let config = CogConfig {
            max_content_length: 8,
            ..Default::default()
        };
        let svc = service_with(config, Arc::new(AlwaysValid));
        let event = InboundEvent::new("POST", "/api/validate")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("url=http://example.com/a.tif");
        let reply = handle(&svc, &event);
        assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            json_body(&reply)["error"],
            "Maximum accepted attachment size is 8"
        );
    }

    #[test]
    fn unbounded_limit_reads_body() {
        let config = CogConfig {
            max_content_length: u64::MAX,
            ..Default::default()
        };
        let svc = service_with(config, Arc::new(AlwaysValid));
        let event = InboundEvent::new("POST", "/api/validate")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("url=http%3A%2F%2Fh%2Fd.tif");
        let reply = handle(&svc, &event);
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[test]
    fn posted_url_form() {
        let event = InboundEvent::new("POST", "/api/validate")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("url=http%3A%2F%2Fh%2Fb.tif");
        let reply = handle(&service(), &event);
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(json_body(&reply)["gdal_info"]["description"], "http://h/b.tif");
    }

    #[test]
    fn posted_fields_without_b64() {
        let event = InboundEvent::new("POST", "/api/validate")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("url=&filename=a.tif");
        let reply = handle(&service(), &event);
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(&reply)["error"],
            "Missing \"file_b64\" field in POSTed form data"
        );
    }

    #[test]
    fn posted_b64_is_staged_local_file() {
        let event = InboundEvent::new("POST", "/api/validate")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("filename=mine.tif&file_b64=data%3Aimage%2Ftiff%3Bbase64%2CSUkqAA%3D%3D");
        let reply = handle(&service(), &event);
        assert_eq!(reply.status, StatusCode::OK);
        let body = json_body(&reply);
        assert_eq!(body["gdal_info"]["description"], "mine.tif");
        assert!(body["gdal_info"].get("files").is_none());
    }

    #[test]
    fn posted_invalid_b64() {
        let event = InboundEvent::new("POST", "/api/validate")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("file_b64=SUkqA");
        let reply = handle(&service(), &event);
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        let error = json_body(&reply)["error"].as_str().unwrap().to_string();
        assert!(error.starts_with("Invalid content for file_b64: "), "{error}");
    }

    #[test]
    fn empty_post_needs_file() {
        let reply = handle(&service(), &InboundEvent::new("POST", "/api/validate"));
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(&reply)["error"],
            "Missing \"file\" field in POSTed form data"
        );
    }

    #[test]
    fn multipart_upload() {
        let body = "--B\r\nContent-Disposition: form-data; name=\"file\"; filename=\"up.tif\"\r\n\
                    Content-Type: image/tiff\r\n\r\nII*\r\n--B--\r\n";
        let event = InboundEvent::new("POST", "/api/validate")
            .with_header("Content-Type", "multipart/form-data; boundary=B")
            .with_body(body);
        let reply = handle(&service(), &event);
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(json_body(&reply)["gdal_info"]["description"], "up.tif");
    }

    #[test]
    fn html_main_uses_stage_root() {
        let event = InboundEvent::new("GET", "/html")
            .with_header("Host", "abc.execute-api.us-east-1.amazonaws.com")
            .with_header("X-Forwarded-Proto", "https")
            .with_stage("prod");
        let reply = handle(&service(), &event);
        assert_eq!(reply.status, StatusCode::OK);
        let html = String::from_utf8(reply.body).unwrap();
        assert!(html.contains(
            "action=\"https://abc.execute-api.us-east-1.amazonaws.com/prod/html/validate\""
        ));
    }

    #[test]
    fn html_validate_success() {
        let event = InboundEvent::new("POST", "/html/validate")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("url=http%3A%2F%2Fh%2Fc.tif");
        let reply = handle(&service(), &event);
        assert_eq!(reply.status, StatusCode::OK);
        let html = String::from_utf8(reply.body).unwrap();
        assert!(html.contains("Validation succeeded !"));
        assert!(html.contains("is a valid Cloud Optimized GeoTIFF."));
    }

    #[test]
    fn html_validate_failure_lists_error() {
        let svc = service_with(CogConfig::default(), Arc::new(NeverOpens));
        let event = InboundEvent::new("POST", "/html/validate")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("url=x.tif");
        let reply = handle(&svc, &event);
        let html = String::from_utf8(reply.body).unwrap();
        assert!(html.contains("Validation failed ! x.tif is NOT a valid Cloud Optimized GeoTIFF."));
        assert!(html.contains("<li>Cannot download x.tif</li>"));
    }

    #[test]
    fn html_validate_unnamed_input() {
        let event = InboundEvent::new("POST", "/html/validate");
        let reply = handle(&service(), &event);
        let html = String::from_utf8(reply.body).unwrap();
        assert!(html.contains("Validation failed ! This is NOT"));
    }

    #[test]
    fn self_test_serves_fixture() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("byte_cog_valid.tif"), b"II*\0valid").unwrap();
        let config = CogConfig {
            self_test_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let svc = service_with(config, Arc::new(AlwaysValid));

        let reply = handle(&svc, &InboundEvent::new("GET", "/self_test/valid.tif"));
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, b"II*\0valid");

        let reply = handle(&svc, &InboundEvent::new("GET", "/self_test/invalid.tif"));
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn root_url_variants() {
        let ctx = translate_request(&InboundEvent::new("GET", "/")).unwrap();
        assert_eq!(root_url(&ctx), "http://localhost");

        let ctx = translate_request(
            &InboundEvent::new("GET", "/")
                .with_header("Host", "localhost:8080"),
        )
        .unwrap();
        assert_eq!(root_url(&ctx), "http://localhost:8080");
    }

    #[test]
    fn application_through_gateway() {
        let gateway = Gateway::new().with_binary_media_types(["image/tiff"]);
        let response = gateway
            .respond(&service(), &InboundEvent::new("GET", "/health"))
            .unwrap();
        assert_eq!(response.status_code, "200");
        assert_eq!(response.headers["Content-Type"], "application/json");
        assert!(!response.is_base64_encoded);
    }
}
