//! Query string and form body parsing.
//!
//! Handles `application/x-www-form-urlencoded` and `multipart/form-data`.
//! Multipart parts carrying a `filename` become [`FilePart`]s; the rest are
//! plain fields.

/// Ordered form fields. Lookups return the first value for a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Value for `key` if present and non-empty.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Copy of these fields with every `key` entry dropped.
    pub fn without(&self, key: &str) -> Fields {
        Fields(self.0.iter().filter(|(k, _)| k != key).cloned().collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Fields(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// An uploaded file from a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A parsed request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    pub fields: Fields,
    pub files: Vec<FilePart>,
}

impl Form {
    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// Parse a request body according to its content type.
///
/// Unknown content types produce an empty form.
pub fn parse_body(content_type: Option<&str>, body: &[u8]) -> Result<Form, String> {
    let Some(content_type) = content_type else {
        return Ok(Form::default());
    };
    let mut params = content_type.split(';');
    let media_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();

    match media_type.as_str() {
        "application/x-www-form-urlencoded" => Ok(Form {
            fields: parse_urlencoded(&String::from_utf8_lossy(body)),
            files: Vec::new(),
        }),
        "multipart/form-data" => {
            let boundary = params
                .filter_map(|p| p.trim().split_once('='))
                .find(|(k, _)| k.eq_ignore_ascii_case("boundary"))
                .map(|(_, v)| v.trim_matches('"'))
                .ok_or_else(|| "multipart body without boundary".to_string())?;
            parse_multipart(body, boundary)
        }
        _ => Ok(Form::default()),
    }
}

/// Parse `a=1&b=2` pairs, decoding `%XX` and `+`.
pub fn parse_urlencoded(input: &str) -> Fields {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (url_decode(key), url_decode(value)),
            None => (url_decode(pair), String::new()),
        })
        .collect()
}

/// Decode a URL-encoded string, handling %XX sequences and '+' as space.
///
/// Malformed escapes are kept verbatim.
pub fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn parse_multipart(body: &[u8], boundary: &str) -> Result<Form, String> {
    let delimiter = format!("--{boundary}");
    let part_end = format!("\r\n--{boundary}");

    let mut form = Form::default();
    let mut pos = find(body, delimiter.as_bytes(), 0)
        .ok_or_else(|| "multipart boundary not found".to_string())?
        + delimiter.len();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            break;
        }
        if rest.starts_with(b"\r\n") {
            pos += 2;
        }

        let header_end = find(body, b"\r\n\r\n", pos)
            .ok_or_else(|| "unterminated part headers".to_string())?;
        let headers = String::from_utf8_lossy(&body[pos..header_end]);
        let data_start = header_end + 4;
        let data_end = find(body, part_end.as_bytes(), data_start)
            .ok_or_else(|| "unterminated multipart part".to_string())?;
        let data = &body[data_start..data_end];

        let mut disposition = None;
        let mut content_type = None;
        for line in headers.split("\r\n") {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case("content-disposition") {
                disposition = Some(value.trim().to_string());
            } else if name.trim().eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_string());
            }
        }

        if let Some(disposition) = disposition {
            let name = disposition_param(&disposition, "name");
            let filename = disposition_param(&disposition, "filename");
            if let Some(name) = name {
                match filename {
                    Some(filename) => form.files.push(FilePart {
                        name,
                        filename,
                        content_type,
                        data: data.to_vec(),
                    }),
                    None => form
                        .fields
                        .push(name, String::from_utf8_lossy(data).into_owned()),
                }
            }
        }

        pos = data_end + part_end.len();
    }

    Ok(form)
}

fn disposition_param(disposition: &str, key: &str) -> Option<String> {
    disposition
        .split(';')
        .skip(1)
        .filter_map(|p| p.trim().split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencoded_pairs() {
        let fields = parse_urlencoded("url=https%3A%2F%2Fx.org%2Fa.tif&use_vsicurl=false&flag");
        assert_eq!(fields.get("url"), Some("https://x.org/a.tif"));
        assert_eq!(fields.get("use_vsicurl"), Some("false"));
        assert_eq!(fields.get("flag"), Some(""));
    }

    #[test]
    fn first_value_wins() {
        let fields = parse_urlencoded("a=1&a=2");
        assert_eq!(fields.get("a"), Some("1"));
    }

    #[test]
    fn decode_plus_and_escapes() {
        assert_eq!(url_decode("a+b%20c"), "a b c");
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("%C3%A9"), "é");
    }

    #[test]
    fn without_drops_key() {
        let fields = parse_urlencoded("url=x&local_filename=/etc/passwd");
        let args = fields.without("local_filename");
        assert!(!args.contains("local_filename"));
        assert_eq!(args.get("url"), Some("x"));
    }

    #[test]
    fn non_empty_filters_blank() {
        let fields = parse_urlencoded("url=&filename=a.tif");
        assert_eq!(fields.non_empty("url"), None);
        assert_eq!(fields.non_empty("filename"), Some("a.tif"));
    }

    #[test]
    fn unknown_content_type_is_empty() {
        let form = parse_body(Some("application/json"), b"{}").unwrap();
        assert!(form.fields.is_empty());
        assert!(form.files.is_empty());
        assert!(parse_body(None, b"a=1").unwrap().fields.is_empty());
    }

    #[test]
    fn urlencoded_body() {
        let form = parse_body(
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            b"url=a&filename=b",
        )
        .unwrap();
        assert_eq!(form.fields.get("url"), Some("a"));
        assert_eq!(form.fields.get("filename"), Some("b"));
    }

    fn multipart_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"--XyZ\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"use_vsicurl\"\r\n\r\n");
        body.extend_from_slice(b"false\r\n");
        body.extend_from_slice(b"--XyZ\r\n");
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"byte.tif\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: image/tiff\r\n\r\n");
        body.extend_from_slice(&[0x49, 0x49, 0x2a, 0x00, 0x0d, 0x0a, 0xff]);
        body.extend_from_slice(b"\r\n--XyZ--\r\n");
        body
    }

    #[test]
    fn multipart_fields_and_files() {
        let form = parse_body(
            Some("multipart/form-data; boundary=XyZ"),
            &multipart_body(),
        )
        .unwrap();
        assert_eq!(form.fields.get("use_vsicurl"), Some("false"));

        let file = form.file("file").unwrap();
        assert_eq!(file.filename, "byte.tif");
        assert_eq!(file.content_type.as_deref(), Some("image/tiff"));
        assert_eq!(file.data, vec![0x49, 0x49, 0x2a, 0x00, 0x0d, 0x0a, 0xff]);
    }

    #[test]
    fn multipart_quoted_boundary() {
        let form = parse_body(
            Some("multipart/form-data; boundary=\"XyZ\""),
            &multipart_body(),
        )
        .unwrap();
        assert!(form.file("file").is_some());
    }

    #[test]
    fn multipart_empty_filename_kept_as_file() {
        let body = b"--b\r\nContent-Disposition: form-data; name=\"file\"; filename=\"\"\r\n\r\n\r\n--b--\r\n";
        let form = parse_body(Some("multipart/form-data; boundary=b"), body).unwrap();
        assert!(form.fields.is_empty());
        assert_eq!(form.file("file").unwrap().filename, "");
    }

    #[test]
    fn multipart_without_boundary_fails() {
        assert!(parse_body(Some("multipart/form-data"), b"").is_err());
    }

    #[test]
    fn multipart_truncated_fails() {
        let body = b"--b\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nvalue";
        assert!(parse_body(Some("multipart/form-data; boundary=b"), body).is_err());
    }
}
