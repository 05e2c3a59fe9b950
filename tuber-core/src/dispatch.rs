//! Request classification and execution.
//!
//! Each decoded request record is either a *describe* (metadata lookup) or
//! an *invoke* (method call). Failures never unwind past [`dispatch`]:
//! they are shaped into error envelopes so that one failing call cannot
//! corrupt the batch it arrived in.

use indexmap::IndexMap;

use crate::envelope::Envelope;
use crate::error::{Result, TuberError};
use crate::object::{Attr, TuberMethod};
use crate::path::ObjectPath;
use crate::reflect::{describe_method, describe_object};
use crate::registry::Registry;
use crate::value::Value;
use crate::warnings::WarningScope;

/// A decoded request record.
///
/// `args` and `kwargs` keep their raw wire shape so the invoke path can
/// report the exact argument that was malformed.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub object: Option<ObjectPath>,
    pub method: Option<String>,
    pub property: Option<String>,
    pub args: Option<Value>,
    pub kwargs: Option<Value>,
    pub resolve: bool,
}

impl Request {
    /// Parse a wire record. Unknown keys are ignored here; the optional
    /// schema validation layer rejects them when enabled.
    pub fn from_value(value: &Value) -> Result<Request> {
        let map = value
            .as_map()
            .ok_or_else(|| TuberError::Type("Request must be an object".into()))?;

        let object = match map.get("object") {
            Some(v) => ObjectPath::from_value(v)?,
            None => None,
        };
        let method = match map.get("method") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(_) => return Err(TuberError::Type("Argument 'method' must be a string".into())),
        };
        let property = match map.get("property") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(_) => {
                return Err(TuberError::Type(
                    "Argument 'property' must be a string".into(),
                ))
            }
        };
        let resolve = match map.get("resolve") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => false,
            Some(_) => {
                return Err(TuberError::Type(
                    "Argument 'resolve' must be a boolean".into(),
                ))
            }
        };

        Ok(Request {
            object,
            method,
            property,
            args: map.get("args").cloned(),
            kwargs: map.get("kwargs").cloned(),
            resolve,
        })
    }
}

/// Run one request against the registry and shape the outcome.
pub fn dispatch(registry: &Registry, request: &Value) -> Envelope {
    let request = match Request::from_value(request) {
        Ok(request) => request,
        Err(e) => return Envelope::err(&e),
    };

    if request.object.is_some() && request.method.is_some() {
        invoke(registry, &request)
    } else {
        match describe(registry, &request) {
            Ok(envelope) => envelope,
            Err(e) => Envelope::err(&e),
        }
    }
}

/// The metadata path: registry, object, container, method and property
/// descriptors. These are cached client-side, so correctness matters more
/// than speed here.
fn describe(registry: &Registry, request: &Request) -> Result<Envelope> {
    let Some(path) = &request.object else {
        if request.method.is_some() || request.property.is_some() {
            return Err(TuberError::Value("Invalid request".into()));
        }
        // Registry metadata: names, or full per-root descriptors.
        let objects = if request.resolve {
            Value::Map(
                registry
                    .names()
                    .iter()
                    .map(|name| {
                        let root = registry.get(&ObjectPath::root(*name))?;
                        Ok((name.to_string(), describe_object(root, true).to_value()))
                    })
                    .collect::<Result<_>>()?,
            )
        } else {
            Value::Array(
                registry
                    .names()
                    .iter()
                    .map(|n| Value::String(n.to_string()))
                    .collect(),
            )
        };
        let mut map = IndexMap::new();
        map.insert("objects".to_string(), objects);
        return Ok(Envelope::ok(Value::Map(map)));
    };

    let obj = registry.get(path)?;

    let Some(property) = &request.property else {
        // Object metadata. A `method` cannot reach this point: any
        // object+method request is classified as an invoke.
        return Ok(Envelope::ok(
            describe_object(obj, request.resolve).to_value(),
        ));
    };

    // Private names are outside the exported surface, whatever attr()
    // would say.
    let attr = if property.starts_with('_') {
        None
    } else {
        obj.attr(property)
    };
    let attr = attr.ok_or_else(|| {
        TuberError::Attribute(format!(
            "'{path}' object has no attribute '{property}'"
        ))
    })?;

    Ok(Envelope::ok(match attr {
        // Another exported node: return its descriptor.
        Attr::Object(child) => describe_object(child, request.resolve).to_value(),
        // Static data: evaluate in place.
        Attr::Property(value) => value,
        // A callable: return its method descriptor.
        Attr::Method(method) => describe_method(property, method).to_value(),
    }))
}

/// The command path: resolve the target method, validate arguments, invoke
/// under a warning-capture scope.
fn invoke(registry: &Registry, request: &Request) -> Envelope {
    let prepared = prepare_invoke(registry, request);
    let (method, args, kwargs) = match prepared {
        Ok(parts) => parts,
        Err(e) => return Envelope::err(&e),
    };

    let scope = WarningScope::new();
    let outcome = method.invoke(&args, &kwargs);
    let warnings = scope.take();

    match outcome {
        Ok(value) => Envelope::ok(value),
        Err(e) => Envelope::err(&e),
    }
    .with_warnings(warnings)
}

type PreparedCall<'a> = (&'a dyn TuberMethod, Vec<Value>, IndexMap<String, Value>);

fn prepare_invoke<'a>(registry: &'a Registry, request: &Request) -> Result<PreparedCall<'a>> {
    let (path, name) = match (&request.object, &request.method) {
        (Some(path), Some(name)) => (path, name),
        _ => return Err(TuberError::Value("Invalid request".into())),
    };

    let obj = registry.get(path)?;
    // Private names are never dispatched.
    let attr = if name.starts_with('_') { None } else { obj.attr(name) };
    let attr = attr.ok_or_else(|| {
        TuberError::Attribute(format!(
            "'{}' object has no attribute '{name}'",
            obj.type_name()
        ))
    })?;
    let method = match attr {
        Attr::Method(method) => method,
        _ => {
            return Err(TuberError::Type(format!(
                "'{}' attribute '{name}' is not callable",
                obj.type_name()
            )))
        }
    };

    let args = match &request.args {
        None => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            return Err(TuberError::Type(format!(
                "Argument 'args' for method {path}.{name} must be a list."
            )))
        }
    };
    let kwargs = match &request.kwargs {
        None => IndexMap::new(),
        Some(Value::Map(map)) => map.clone(),
        Some(_) => {
            return Err(TuberError::Type(format!(
                "Argument 'kwargs' for method {path}.{name} must be a dict."
            )))
        }
    };

    Ok((method, args, kwargs))
}
