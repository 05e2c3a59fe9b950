//! Batching contexts and completion handles.
//!
//! A context buffers calls so many logical operations ride one HTTP
//! exchange. Every enqueued call gets a [`CallHandle`], resolved or failed
//! exactly once during the flush that carries it; handles whose context is
//! dropped unflushed observe [`ClientError::Cancelled`]. Within a batch
//! the response order is positional, and each envelope's warnings are
//! re-emitted locally before its handle resolves.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::oneshot;

use tuber_core::envelope::{Envelope, Outcome};
use tuber_core::{ObjectPath, Value};

use crate::error::{ClientError, Result};
use crate::http::{BlockingSession, Session};

/// Client-side identifiers that must never reach the wire.
const DENIED_PREFIXES: &[&str] = &["_sa", "_ipython", "_tuber"];

/// True for names reserved by client tooling; requests for these are
/// refused locally.
pub fn attribute_blacklisted(name: &str) -> bool {
    DENIED_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// A one-shot completion handle for a buffered call.
#[derive(Debug)]
pub struct CallHandle {
    rx: oneshot::Receiver<Result<Value>>,
}

impl CallHandle {
    /// Await the call's outcome (cooperative mode).
    pub async fn result(self) -> Result<Value> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Cancelled),
        }
    }

    /// Block until the call's outcome is available (serial mode).
    pub fn wait(self) -> Result<Value> {
        match self.rx.blocking_recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Cancelled),
        }
    }
}

/// One buffered call: the wire record plus its completion sender.
struct PendingCall {
    request: Value,
    tx: oneshot::Sender<Result<Value>>,
}

fn enqueue(calls: &mut Vec<PendingCall>, request: Value) -> CallHandle {
    let (tx, rx) = oneshot::channel();
    calls.push(PendingCall { request, tx });
    CallHandle { rx }
}

fn invoke_record(
    path: &ObjectPath,
    method: &str,
    args: Vec<Value>,
    kwargs: IndexMap<String, Value>,
) -> Result<Value> {
    if attribute_blacklisted(method) {
        return Err(ClientError::Attribute(format!(
            "{method} is not a valid method or property!"
        )));
    }
    let mut record = IndexMap::new();
    record.insert("object".to_string(), path.to_value());
    record.insert("method".to_string(), Value::String(method.to_string()));
    if !args.is_empty() {
        record.insert("args".to_string(), Value::Array(args));
    }
    if !kwargs.is_empty() {
        record.insert("kwargs".to_string(), Value::Map(kwargs));
    }
    Ok(Value::Map(record))
}

fn property_record(path: &ObjectPath, property: &str) -> Result<Value> {
    if attribute_blacklisted(property) {
        return Err(ClientError::Attribute(format!(
            "{property} is not a valid method or property!"
        )));
    }
    let mut record = IndexMap::new();
    record.insert("object".to_string(), path.to_value());
    record.insert("property".to_string(), Value::String(property.to_string()));
    Ok(Value::Map(record))
}

fn describe_record(path: Option<&ObjectPath>, resolve: bool) -> Value {
    let mut record = IndexMap::new();
    record.insert(
        "object".to_string(),
        match path {
            Some(path) => path.to_value(),
            None => Value::Null,
        },
    );
    if resolve {
        record.insert("resolve".to_string(), Value::Bool(true));
    }
    Value::Map(record)
}

/// Settle one flush: re-emit warnings, resolve every handle positionally,
/// and collect the outcomes.
fn settle(
    envelopes: Vec<Value>,
    pending: Vec<PendingCall>,
    continue_on_error: bool,
) -> Result<Vec<Result<Value>>> {
    if envelopes.len() != pending.len() {
        let err = ClientError::Protocol(format!(
            "Expected {} response records, got {}",
            pending.len(),
            envelopes.len()
        ));
        for call in pending {
            let _ = call.tx.send(Err(err.clone()));
        }
        return Err(err);
    }

    let mut results = Vec::with_capacity(envelopes.len());
    let mut first_error = None;
    for (value, call) in envelopes.iter().zip(pending) {
        let outcome = match Envelope::from_value(value) {
            Ok(envelope) => {
                // Warnings are re-emitted locally whatever the outcome.
                for warning in &envelope.warnings {
                    log::warn!("{warning}");
                }
                match envelope.outcome {
                    Outcome::Result(v) => Ok(v),
                    Outcome::Error(message) => Err(ClientError::Remote(message)),
                }
            }
            Err(e) => Err(ClientError::Protocol(e.to_string())),
        };
        if first_error.is_none() {
            if let Err(e) = &outcome {
                first_error = Some(e.clone());
            }
        }
        let _ = call.tx.send(outcome.clone());
        results.push(outcome);
    }

    match first_error {
        Some(err) if !continue_on_error => Err(err),
        _ => Ok(results),
    }
}

/// A cooperative (async) batching context.
pub struct Context {
    session: Arc<Session>,
    calls: Vec<PendingCall>,
}

impl Context {
    pub fn new(session: Arc<Session>) -> Context {
        Context {
            session,
            calls: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Queue a method invocation.
    pub fn invoke(
        &mut self,
        path: &ObjectPath,
        method: &str,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    ) -> Result<CallHandle> {
        Ok(enqueue(&mut self.calls, invoke_record(path, method, args, kwargs)?))
    }

    /// Queue a property fetch.
    pub fn get_property(&mut self, path: &ObjectPath, property: &str) -> Result<CallHandle> {
        Ok(enqueue(&mut self.calls, property_record(path, property)?))
    }

    /// Queue a describe.
    pub fn describe(&mut self, path: Option<&ObjectPath>, resolve: bool) -> CallHandle {
        enqueue(&mut self.calls, describe_record(path, resolve))
    }

    /// Flush the buffered batch.
    ///
    /// With `continue_on_error`, per-call errors come back as `Err` values
    /// in the result list; otherwise the first error fails the flush after
    /// every handle has been resolved. An empty context sends nothing.
    pub async fn send(&mut self, continue_on_error: bool) -> Result<Vec<Result<Value>>> {
        if self.calls.is_empty() {
            return Ok(Vec::new());
        }
        let pending: Vec<PendingCall> = self.calls.drain(..).collect();
        let batch: Vec<Value> = pending.iter().map(|c| c.request.clone()).collect();

        match self.session.post(batch, continue_on_error).await {
            Ok(envelopes) => settle(envelopes, pending, continue_on_error),
            Err(e) => {
                for call in pending {
                    let _ = call.tx.send(Err(e.clone()));
                }
                Err(e)
            }
        }
    }
}

/// A serial (blocking) batching context with the same shapes and error
/// semantics as [`Context`].
pub struct SimpleContext {
    session: Arc<BlockingSession>,
    calls: Vec<PendingCall>,
}

impl SimpleContext {
    pub fn new(session: Arc<BlockingSession>) -> SimpleContext {
        SimpleContext {
            session,
            calls: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn invoke(
        &mut self,
        path: &ObjectPath,
        method: &str,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    ) -> Result<CallHandle> {
        Ok(enqueue(&mut self.calls, invoke_record(path, method, args, kwargs)?))
    }

    pub fn get_property(&mut self, path: &ObjectPath, property: &str) -> Result<CallHandle> {
        Ok(enqueue(&mut self.calls, property_record(path, property)?))
    }

    pub fn describe(&mut self, path: Option<&ObjectPath>, resolve: bool) -> CallHandle {
        enqueue(&mut self.calls, describe_record(path, resolve))
    }

    /// Flush the buffered batch synchronously.
    pub fn send(&mut self, continue_on_error: bool) -> Result<Vec<Result<Value>>> {
        if self.calls.is_empty() {
            return Ok(Vec::new());
        }
        let pending: Vec<PendingCall> = self.calls.drain(..).collect();
        let batch: Vec<Value> = pending.iter().map(|c| c.request.clone()).collect();

        match self.session.post(batch, continue_on_error) {
            Ok(envelopes) => settle(envelopes, pending, continue_on_error),
            Err(e) => {
                for call in pending {
                    let _ = call.tx.send(Err(e.clone()));
                }
                Err(e)
            }
        }
    }
}
