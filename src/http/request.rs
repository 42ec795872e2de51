//! Raw HTTP/1.1 request parsing.
//!
//! One request per connection, read as a single byte buffer. The head section
//! (request line and headers) is decoded as text; the body is kept verbatim as
//! bytes so binary payloads survive untouched.

use std::collections::HashMap;

use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::ServerError;

static REQUEST_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]+ \S+ HTTP/\d\.\d$").expect("request line regex should be valid")
});

/// A parsed request. Header names are lower-cased for uniform lookup and the
/// query string is already stripped from `path`.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query_params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    /// Session token from the `Authorization: Bearer <id>` header, if any.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers.get("authorization")?.strip_prefix("Bearer ")
    }

    /// Decode the body as JSON.
    pub fn json_body(&self) -> Result<serde_json::Value, ServerError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Parse one raw request buffer.
///
/// Fails with [`ServerError::MalformedRequest`] when the first line is not
/// `METHOD SP PATH SP HTTP/x.y` or has fewer than three tokens. Headers run up
/// to the first blank line; anything after it is the body, byte for byte. A
/// buffer without a blank line has an empty body.
pub fn parse_request(raw: &[u8]) -> Result<Request, ServerError> {
    let (head, body) = match raw.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(pos) => (&raw[..pos], &raw[pos + 4..]),
        None => (raw, &[] as &[u8]),
    };
    let head = String::from_utf8_lossy(head);
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    if !REQUEST_LINE_RE.is_match(request_line) {
        return Err(ServerError::MalformedRequest(
            "invalid request line".to_string(),
        ));
    }
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ServerError::MalformedRequest(
            "incomplete request line".to_string(),
        ));
    }
    let method = Method::from_bytes(parts[0].as_bytes())
        .map_err(|_| ServerError::MalformedRequest("invalid method".to_string()))?;
    let target = parts[1];

    let (path, query_params) = match target.split_once('?') {
        Some((path, query)) => (path, parse_query_params(query)),
        None => (target, HashMap::new()),
    };

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        body_len = body.len(),
        "parsed request"
    );

    Ok(Request {
        method,
        path: path.to_string(),
        query_params,
        headers,
        body: body.to_vec(),
    })
}

/// Decode `application/x-www-form-urlencoded` query pairs.
#[must_use]
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}
