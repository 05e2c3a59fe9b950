//! Full-stack client tests: the real client over HTTP against the real
//! request handler, bridged through a mock server.

mod common;

use std::sync::Arc;

use indexmap::IndexMap;

use common::{endpoint, start_server};
use tuber_core::{Index, ObjectPath, Value};
use tuber_client::{resolve, ClientError, Context, Session};

#[tokio::test]
async fn resolve_and_call_a_method() {
    let server = start_server().await;
    let proxy = resolve(&endpoint(&server), Some("Wrapper")).await.unwrap();

    let out = proxy
        .call(
            "increment",
            vec![Value::Array(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
            ])],
            IndexMap::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        out,
        Value::Array(vec![Value::Int(2), Value::Int(3), Value::Int(4)])
    );
}

#[tokio::test]
async fn resolved_methods_carry_metadata() {
    let server = start_server().await;
    let proxy = resolve(&endpoint(&server), Some("Wrapper")).await.unwrap();

    let stub = proxy.method("increment").unwrap();
    assert_eq!(stub.signature.as_deref(), Some("(x: list[int])"));
    assert_eq!(
        stub.doc.as_deref(),
        Some("Increment every element of a list.")
    );
}

#[tokio::test]
async fn resolve_stores_properties_locally() {
    let server = start_server().await;
    let proxy = resolve(&endpoint(&server), Some("Types")).await.unwrap();

    assert_eq!(
        proxy.property("INTEGER").unwrap(),
        &Value::Int(1234)
    );
    assert_eq!(
        proxy.property("STRING").unwrap(),
        &Value::String("this is a string property".into())
    );
    assert!(matches!(
        proxy.property("MISSING"),
        Err(ClientError::Attribute(_))
    ));
}

#[tokio::test]
async fn kwargs_reach_the_server() {
    let server = start_server().await;
    let proxy = resolve(&endpoint(&server), Some("Wrapper")).await.unwrap();

    let mut kwargs = IndexMap::new();
    kwargs.insert("factor".to_string(), Value::Int(3));
    let out = proxy
        .call(
            "scale",
            vec![Value::Array(vec![Value::Int(2), Value::Int(4)])],
            kwargs,
        )
        .await
        .unwrap();
    assert_eq!(out, Value::Array(vec![Value::Int(6), Value::Int(12)]));
}

#[tokio::test]
async fn batched_context_preserves_order() {
    let server = start_server().await;
    let session = Arc::new(Session::new(endpoint(&server)));
    let mut ctx = Context::new(Arc::clone(&session));

    let types = ObjectPath::root("Types");
    let h1 = ctx
        .invoke(&types, "integer_function", Vec::new(), IndexMap::new())
        .unwrap();
    let h2 = ctx
        .invoke(
            &types,
            "integer_function",
            vec![Value::Int(5)],
            IndexMap::new(),
        )
        .unwrap();
    let h3 = ctx.get_property(&types, "STRING").unwrap();

    let results = ctx.send(false).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(ctx.is_empty());

    assert_eq!(h1.result().await.unwrap(), Value::Int(1234));
    assert_eq!(h2.result().await.unwrap(), Value::Int(5));
    assert_eq!(
        h3.result().await.unwrap(),
        Value::String("this is a string property".into())
    );
}

#[tokio::test]
async fn remote_errors_surface_with_kind_prefix() {
    let server = start_server().await;
    let proxy = resolve(&endpoint(&server), Some("Wrapper")).await.unwrap();

    let err = proxy
        .call("explode", Vec::new(), IndexMap::new())
        .await
        .unwrap_err();
    let ClientError::Remote(message) = err else {
        panic!("expected a remote error, got {err:?}");
    };
    assert_eq!(message, "RuntimeError: Oops!");
}

#[tokio::test]
async fn fail_fast_batch_fails_later_handles() {
    let server = start_server().await;
    let session = Arc::new(Session::new(endpoint(&server)));
    let mut ctx = Context::new(session);

    let wrapper = ObjectPath::root("Wrapper");
    let types = ObjectPath::root("Types");
    let h1 = ctx
        .invoke(&types, "integer_function", Vec::new(), IndexMap::new())
        .unwrap();
    let h2 = ctx
        .invoke(&wrapper, "explode", Vec::new(), IndexMap::new())
        .unwrap();
    let h3 = ctx
        .invoke(&types, "integer_function", Vec::new(), IndexMap::new())
        .unwrap();

    let err = ctx.send(false).await.unwrap_err();
    assert!(matches!(err, ClientError::Remote(_)));

    assert_eq!(h1.result().await.unwrap(), Value::Int(1234));
    assert!(h2.result().await.is_err());
    let ClientError::Remote(message) = h3.result().await.unwrap_err() else {
        panic!("expected a remote error");
    };
    assert_eq!(message, "Something went wrong in a preceding call");
}

#[tokio::test]
async fn continue_on_error_returns_sentinels() {
    let server = start_server().await;
    let session = Arc::new(Session::new(endpoint(&server)));
    let mut ctx = Context::new(session);

    let wrapper = ObjectPath::root("Wrapper");
    let types = ObjectPath::root("Types");
    ctx.invoke(&wrapper, "explode", Vec::new(), IndexMap::new())
        .unwrap();
    ctx.invoke(&types, "integer_function", Vec::new(), IndexMap::new())
        .unwrap();

    let results = ctx.send(true).await.unwrap();
    assert!(results[0].is_err());
    assert_eq!(results[1], Ok(Value::Int(1234)));
}

#[tokio::test]
async fn warnings_are_reemitted_not_fatal() {
    let server = start_server().await;
    let proxy = resolve(&endpoint(&server), Some("Wrapper")).await.unwrap();

    // The warning rides the envelope and is logged locally; the result
    // still comes through.
    let out = proxy
        .call("complain", Vec::new(), IndexMap::new())
        .await
        .unwrap();
    assert_eq!(out, Value::String("all done".into()));
}

#[tokio::test]
async fn container_proxies_traverse_and_call() {
    let server = start_server().await;
    let proxy = resolve(&endpoint(&server), Some("Tree")).await.unwrap();

    let children = proxy.object("children").unwrap();
    assert!(children.is_container());
    assert_eq!(children.len(), Some(3));

    let second = children.item(&Index::Int(1)).unwrap();
    let out = second
        .call("poke", Vec::new(), IndexMap::new())
        .await
        .unwrap();
    assert_eq!(out, Value::String("poked second".into()));

    // method stubs are shared across items
    let a = children.item(&Index::Int(0)).unwrap().method("poke").unwrap();
    let b = children.item(&Index::Int(2)).unwrap().method("poke").unwrap();
    assert!(Arc::ptr_eq(a, b));
}

#[tokio::test]
async fn dict_container_roots_resolve() {
    let server = start_server().await;
    let proxy = resolve(&endpoint(&server), Some("Forest")).await.unwrap();

    assert!(proxy.is_container());
    assert_eq!(proxy.keys(), Some(vec!["left", "right"]));
    let right = proxy.item(&Index::Key("right".into())).unwrap();
    let out = right.call("poke", Vec::new(), IndexMap::new()).await.unwrap();
    assert_eq!(out, Value::String("poked right".into()));
}

#[tokio::test]
async fn registry_resolve_exposes_all_roots() {
    let server = start_server().await;
    let proxy = resolve(&endpoint(&server), None).await.unwrap();

    assert!(proxy.object_names().contains(&"Types"));
    assert!(proxy.object_names().contains(&"Wrapper"));
    let types = proxy.object("Types").unwrap();
    assert_eq!(types.property("INTEGER").unwrap(), &Value::Int(1234));
}

#[tokio::test]
async fn empty_context_sends_nothing() {
    let server = start_server().await;
    let session = Arc::new(Session::new(endpoint(&server)));
    let mut ctx = Context::new(session);
    let results = ctx.send(false).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn non_success_status_is_remote_error() {
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(wiremock::ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = resolve(&endpoint(&server), Some("Types")).await.unwrap_err();
    let ClientError::Remote(message) = err else {
        panic!("expected a remote error, got {err:?}");
    };
    assert!(message.contains("500"), "{message}");
}

#[tokio::test]
async fn unexpected_content_type_is_protocol_error() {
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(
            wiremock::ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("<html></html>"),
        )
        .mount(&server)
        .await;

    let err = resolve(&endpoint(&server), Some("Types")).await.unwrap_err();
    assert!(matches!(err, ClientError::Protocol(_)));
}

#[tokio::test]
async fn connection_failures_are_network_errors() {
    // nothing listens on this port
    let err = resolve("http://127.0.0.1:9/tuber", Some("Types"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
}
