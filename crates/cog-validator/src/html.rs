//! HTML front end.

use askama::Template;
use http::StatusCode;
use serde_json::Value;

use crate::CogService;
use crate::reply::Reply;
use crate::router::Request;

#[derive(Template)]
#[template(path = "main.html")]
struct MainPage<'a> {
    root_url: &'a str,
}

#[derive(Template)]
#[template(path = "result.html")]
struct ResultPage<'a> {
    root_url: &'a str,
    success: bool,
    global_result: String,
    errors: Vec<String>,
}

fn render<T: Template>(tmpl: T) -> Reply {
    match tmpl.render() {
        Ok(html) => Reply::html(StatusCode::OK, html),
        Err(e) => {
            tracing::error!(error = %e, "template render failed");
            Reply::html(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("<pre>Template error: {e}</pre>"),
            )
        }
    }
}

impl CogService {
    /// GET /html
    pub fn html_main(&self, req: &Request) -> Reply {
        render(MainPage {
            root_url: &req.root_url,
        })
    }

    /// POST /html/validate
    pub fn html_validate(&self, req: &Request) -> Reply {
        let outcome = self.api_validate(req);
        let fields = &req.form.fields;
        let name = fields
            .non_empty("url")
            .or_else(|| fields.non_empty("filename"))
            .unwrap_or("This");

        let success = outcome.is_success();
        let (global_result, errors) = if success {
            (
                format!("Validation succeeded ! {name} is a valid Cloud Optimized GeoTIFF."),
                Vec::new(),
            )
        } else {
            let errors = match (
                outcome.body.get("error"),
                outcome.body.get("validation_errors"),
            ) {
                (Some(error), _) => vec![as_text(error)],
                (None, Some(Value::Array(items))) => items.iter().map(as_text).collect(),
                _ => Vec::new(),
            };
            (
                format!("Validation failed ! {name} is NOT a valid Cloud Optimized GeoTIFF."),
                errors,
            )
        };

        render(ResultPage {
            root_url: &req.root_url,
            success,
            global_result,
            errors,
        })
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
