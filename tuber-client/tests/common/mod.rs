// Each integration test file is compiled as its own binary crate pulling in
// its own copy of this module; allow helpers that only some binaries use.
#![allow(dead_code)]

use demo_registry::demo_registry;
use tuber_core::RequestHandler;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// A wiremock responder that forwards every request to a real
/// [`RequestHandler`], so client tests exercise the genuine server
/// pipeline without an embedded HTTP server.
pub struct TuberResponder {
    handler: RequestHandler,
}

impl TuberResponder {
    pub fn new() -> TuberResponder {
        TuberResponder {
            handler: RequestHandler::new(demo_registry()),
        }
    }
}

impl Respond for TuberResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        match self.handler.handle(&request.body, &request.headers) {
            Ok((format, body)) => ResponseTemplate::new(200)
                .insert_header("Content-Type", format.as_str())
                .set_body_bytes(body),
            Err(e) => ResponseTemplate::new(500).set_body_string(e.to_string()),
        }
    }
}

/// Start a mock server routing `POST /tuber` through the demo registry.
pub async fn start_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tuber"))
        .respond_with(TuberResponder::new())
        .mount(&server)
        .await;
    server
}

/// The tuber endpoint URI for a running mock server.
pub fn endpoint(server: &MockServer) -> String {
    format!("{}/tuber", server.uri())
}
