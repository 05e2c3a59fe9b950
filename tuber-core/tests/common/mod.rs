// Each integration test file is compiled as its own binary crate pulling in
// its own copy of this module, so helpers used by one binary but not
// another would trigger false dead-code warnings.
#![allow(dead_code)]

use http::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};

use demo_registry::demo_registry;
use tuber_core::{ContentType, RequestHandler};

/// A handler over the demo registry with validation off.
pub fn handler() -> RequestHandler {
    RequestHandler::new(demo_registry())
}

/// A handler over the demo registry with schema validation on.
pub fn validating_handler() -> RequestHandler {
    RequestHandler::new(demo_registry())
        .with_validation()
        .expect("schemas compile")
}

/// Build a header map from (name, value) pairs.
pub fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.append(
            http::header::HeaderName::from_bytes(name.as_bytes()).expect("valid header name"),
            HeaderValue::from_str(value).expect("valid header value"),
        );
    }
    map
}

/// POST a JSON body and parse the JSON response.
pub fn call_json(handler: &RequestHandler, body: &str) -> serde_json::Value {
    call_json_with_headers(handler, body, &[("Content-Type", "application/json")])
}

pub fn call_json_with_headers(
    handler: &RequestHandler,
    body: &str,
    extra: &[(&str, &str)],
) -> serde_json::Value {
    let (format, bytes) = handler
        .handle(body.as_bytes(), &headers(extra))
        .expect("handler infrastructure is sound");
    assert_eq!(format, ContentType::Json, "expected a JSON response");
    serde_json::from_slice(&bytes).expect("response is valid JSON")
}

/// Ignore-the-details header constructors used across test binaries.
pub fn json_headers() -> HeaderMap {
    headers(&[("Content-Type", "application/json")])
}

pub fn cbor_headers() -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/cbor"));
    map.insert(ACCEPT, HeaderValue::from_static("application/cbor"));
    map
}
