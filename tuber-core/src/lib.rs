//! Core library for tuber: a reflection-driven RPC substrate.
//!
//! A tuber server exposes a registry of host objects — each with methods,
//! properties, nested objects and containers — to networked callers over
//! HTTP, transparently enough that a client can introspect and invoke them
//! as if they were local. This crate holds the server-side pipeline and
//! the wire layer shared with clients:
//!
//! - [`value`] / [`codec`] — the wire value model and the JSON/CBOR codecs,
//!   including binary-safe and typed n-d-array extensions;
//! - [`envelope`] — the `{result}` / `{error}` / `warnings` response shape;
//! - [`object`] / [`registry`] / [`path`] — the reflection capability set,
//!   the root-object registry, and hierarchical path navigation;
//! - [`reflect`] — descriptor production for introspection;
//! - [`dispatch`] / [`handler`] — the describe/invoke state machine and the
//!   content-negotiating request handler driven by the HTTP transport;
//! - [`warnings`] — per-invocation scoped warning capture;
//! - [`schema`] — optional request/response schema validation.
//!
//! The HTTP server itself is an external collaborator: it feeds
//! [`handler::RequestHandler::handle`] with body bytes and headers and
//! writes back whatever comes out.

pub mod codec;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod object;
pub mod path;
pub mod reflect;
pub mod registry;
pub mod schema;
pub mod value;
pub mod warnings;

pub use codec::ContentType;
pub use envelope::{Envelope, Outcome};
pub use error::{Result, TuberError};
pub use handler::RequestHandler;
pub use object::{Attr, ContainerView, FnMethod, ObjectContainer, TuberMethod, TuberObject};
pub use path::{Index, ObjectPath, PathElement};
pub use registry::Registry;
pub use value::{ArrayOrder, ElementType, NdArray, TypedData, Value};
pub use warnings::warn;
