//! The client codec/HTTP layer.
//!
//! A session owns the endpoint URI, the codec preferences, and a pooled
//! HTTP client created lazily on first use and released when the session
//! is dropped. The async [`Session`] suspends only at the POST boundary;
//! [`BlockingSession`] has identical semantics for serial callers.

use std::sync::OnceLock;

use reqwest::header::{ACCEPT, CONTENT_TYPE};

use tuber_core::codec::CONTENT_TYPES;
use tuber_core::{ContentType, Value};

use crate::error::{ClientError, Result};

/// Option header recognized by the server.
const X_TUBER_OPTIONS: &str = "X-Tuber-Options";

/// Connection settings shared by both session flavors.
#[derive(Debug, Clone)]
struct Endpoint {
    uri: String,
    format: ContentType,
    accept: Vec<ContentType>,
}

impl Endpoint {
    fn new(uri: impl Into<String>) -> Endpoint {
        Endpoint {
            uri: uri.into(),
            format: ContentType::Json,
            accept: CONTENT_TYPES.to_vec(),
        }
    }

    fn accept_header(&self) -> String {
        self.accept
            .iter()
            .map(|ct| ct.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Parse one HTTP response into envelope values, shared by both session
/// flavors.
fn parse_response(
    status: reqwest::StatusCode,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Vec<Value>> {
    if !status.is_success() {
        let text = String::from_utf8_lossy(body);
        return Err(ClientError::Remote(if text.is_empty() {
            format!("Request failed with status {status}")
        } else {
            format!("Request failed with status {status}: {text}")
        }));
    }

    let format = content_type
        .and_then(ContentType::from_media_type)
        .ok_or_else(|| {
            ClientError::Protocol(format!(
                "Unexpected response content type: {}",
                content_type.unwrap_or("<missing>")
            ))
        })?;

    let decoded = format.decode(body)?;
    match decoded {
        Value::Array(items) => Ok(items),
        Value::Map(map) => {
            // A batch request answered with a single object means a
            // server-side wrapper failure; surface its message.
            let message = map
                .get("error")
                .and_then(Value::as_map)
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            Err(ClientError::Remote(message.to_string()))
        }
        other => Err(ClientError::Protocol(format!(
            "Unexpected response shape: {other:?}"
        ))),
    }
}

/// The cooperative (async) HTTP session.
#[derive(Debug)]
pub struct Session {
    endpoint: Endpoint,
    http: OnceLock<reqwest::Client>,
}

impl Session {
    /// A session for the given endpoint URI, e.g.
    /// `"http://localhost:8080/tuber"`.
    pub fn new(uri: impl Into<String>) -> Session {
        Session {
            endpoint: Endpoint::new(uri),
            http: OnceLock::new(),
        }
    }

    /// Restrict the response formats advertised in `Accept`.
    pub fn with_accept(mut self, accept: Vec<ContentType>) -> Session {
        self.endpoint.accept = accept;
        self
    }

    /// Change the request encoding (and `Content-Type`).
    pub fn with_format(mut self, format: ContentType) -> Session {
        self.endpoint.format = format;
        self
    }

    pub fn uri(&self) -> &str {
        &self.endpoint.uri
    }

    fn client(&self) -> &reqwest::Client {
        self.http.get_or_init(reqwest::Client::new)
    }

    /// POST one batch and return the per-call envelope values.
    pub async fn post(&self, batch: Vec<Value>, continue_on_error: bool) -> Result<Vec<Value>> {
        let body = self.endpoint.format.encode(&Value::Array(batch))?;
        let mut request = self
            .client()
            .post(&self.endpoint.uri)
            .header(CONTENT_TYPE, self.endpoint.format.as_str())
            .header(ACCEPT, self.endpoint.accept_header())
            .body(body);
        if continue_on_error {
            request = request.header(X_TUBER_OPTIONS, "continue-on-error");
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        parse_response(status, content_type.as_deref(), &bytes)
    }
}

/// The serial (blocking) HTTP session.
#[derive(Debug)]
pub struct BlockingSession {
    endpoint: Endpoint,
    http: OnceLock<reqwest::blocking::Client>,
}

impl BlockingSession {
    pub fn new(uri: impl Into<String>) -> BlockingSession {
        BlockingSession {
            endpoint: Endpoint::new(uri),
            http: OnceLock::new(),
        }
    }

    pub fn with_accept(mut self, accept: Vec<ContentType>) -> BlockingSession {
        self.endpoint.accept = accept;
        self
    }

    pub fn with_format(mut self, format: ContentType) -> BlockingSession {
        self.endpoint.format = format;
        self
    }

    pub fn uri(&self) -> &str {
        &self.endpoint.uri
    }

    fn client(&self) -> &reqwest::blocking::Client {
        self.http.get_or_init(reqwest::blocking::Client::new)
    }

    /// POST one batch and return the per-call envelope values.
    pub fn post(&self, batch: Vec<Value>, continue_on_error: bool) -> Result<Vec<Value>> {
        let body = self.endpoint.format.encode(&Value::Array(batch))?;
        let mut request = self
            .client()
            .post(&self.endpoint.uri)
            .header(CONTENT_TYPE, self.endpoint.format.as_str())
            .header(ACCEPT, self.endpoint.accept_header())
            .body(body);
        if continue_on_error {
            request = request.header(X_TUBER_OPTIONS, "continue-on-error");
        }

        let response = request.send()?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes()?;
        parse_response(status, content_type.as_deref(), &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_success_status_is_remote() {
        let err = parse_response(reqwest::StatusCode::INTERNAL_SERVER_ERROR, None, b"boom")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "remote error: Request failed with status 500 Internal Server Error: boom"
        );
    }

    #[test]
    fn unknown_content_type_is_protocol() {
        let err =
            parse_response(reqwest::StatusCode::OK, Some("text/html"), b"[]").unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
        let err = parse_response(reqwest::StatusCode::OK, None, b"[]").unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[test]
    fn top_level_error_object_is_remote() {
        let body = br#"{"error": {"message": "TypeError: Unexpected type in request"}}"#;
        let err =
            parse_response(reqwest::StatusCode::OK, Some("application/json"), body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "remote error: TypeError: Unexpected type in request"
        );
    }

    #[test]
    fn batch_parses_to_envelope_values() {
        let body = br#"[{"result": 1}, {"error": {"message": "m"}}]"#;
        let items =
            parse_response(reqwest::StatusCode::OK, Some("application/json"), body).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn accept_header_lists_all_codecs() {
        let session = Session::new("http://localhost/tuber");
        assert_eq!(
            session.endpoint.accept_header(),
            "application/json, application/cbor"
        );
    }
}
