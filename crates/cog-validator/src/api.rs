//! `/api/validate`: decide where the input comes from.
//!
//! | Request | Input |
//! |---|---|
//! | GET | `url` query parameter |
//! | POST form with non-empty `url` | that URL |
//! | POST form without `url` | base64 payload in `file_b64` |
//! | POST multipart without fields | uploaded `file` part |

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use http::StatusCode;
use tracing::info;

use crate::CogService;
use crate::form::Form;
use crate::reply::Outcome;
use crate::router::Request;

/// Argument only the service itself may set.
const LOCAL_FILENAME: &str = "local_filename";

/// Marker `FileReader.readAsDataURL()` puts before the payload.
const DATA_URL_MARKER: &str = ";base64,";

const MISSING_B64: &str = "Missing \"file_b64\" field in POSTed form data";
const MISSING_FILE: &str = "Missing \"file\" field in POSTed form data";

/// Accepts missing or excess padding and non-canonical trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

impl CogService {
    pub fn api_validate(&self, req: &Request) -> Outcome {
        if req.method == "POST" {
            self.validate_posted(&req.form)
        } else {
            self.validate(&req.query.without(LOCAL_FILENAME))
        }
    }

    fn validate_posted(&self, form: &Form) -> Outcome {
        if !form.fields.is_empty() {
            if form.fields.non_empty("url").is_some() {
                return self.validate(&form.fields.without(LOCAL_FILENAME));
            }

            let name = form.fields.get("filename").unwrap_or("unknown_file_name");
            let Some(b64) = form.fields.get("file_b64") else {
                return Outcome::failure(StatusCode::BAD_REQUEST, MISSING_B64);
            };
            let data = match decode_file_b64(b64) {
                Ok(data) => data,
                Err(e) => {
                    return Outcome::failure(
                        StatusCode::BAD_REQUEST,
                        format!("Invalid content for file_b64: {e}"),
                    );
                }
            };
            info!(name, bytes = data.len(), "validating base64 upload");
            return self.validate_bytes(&data, name);
        }

        match form.file("file") {
            Some(file) if !file.filename.is_empty() => {
                info!(name = %file.filename, bytes = file.data.len(), "validating file upload");
                self.validate_bytes(&file.data, &file.filename)
            }
            _ => Outcome::failure(StatusCode::BAD_REQUEST, MISSING_FILE),
        }
    }
}

/// Decode a `file_b64` form value, with or without a data-URL prefix.
///
/// Characters outside the base64 alphabet are skipped.
pub fn decode_file_b64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match input.find(DATA_URL_MARKER) {
        Some(i) => &input[i + DATA_URL_MARKER.len()..],
        None => input,
    };
    let cleaned: String = payload
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '/')
        .collect();
    LENIENT.decode(cleaned)
}
