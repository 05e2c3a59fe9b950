//! Client library for tuber: batched RPC contexts and lazy object proxies.
//!
//! A tuber server exposes a registry of objects over HTTP. This crate
//! turns those remote objects into local ones:
//!
//! - [`proxy::resolve`] fetches an object's descriptor once and
//!   materializes a proxy tree — methods with remote docstrings and
//!   signatures, properties stored locally, nested objects and container
//!   items as child proxies;
//! - [`context::Context`] aggregates many calls into one HTTP exchange,
//!   handing back a completion handle per call;
//! - [`http::Session`] owns codec preferences and a pooled connection.
//!
//! Everything comes in two flavors with identical semantics: cooperative
//! (async, suspending only at the HTTP boundary) and serial (blocking).
//!
//! ```no_run
//! # async fn demo() -> Result<(), tuber_client::ClientError> {
//! let proxy = tuber_client::resolve("http://localhost:8080/tuber", Some("Wrapper")).await?;
//! let mut ctx = proxy.context();
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod error;
pub mod http;
pub mod proxy;

pub use context::{CallHandle, Context, SimpleContext};
pub use error::{ClientError, Result};
pub use http::{BlockingSession, Session};
pub use proxy::{resolve, resolve_simple, MethodStub, Proxy, SimpleTuberProxy, TuberProxy};
