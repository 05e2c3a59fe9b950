use indexmap::IndexMap;

use crate::error::{Result, TuberError};
use crate::value::Value;

/// The outcome half of a response record: exactly one of a result value or
/// an error message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Result(Value),
    /// Pre-formatted wire message, usually `"<Kind>: <text>"`.
    Error(String),
}

/// A single response record: `{result}` or `{error}` with optional
/// `warnings`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub outcome: Outcome,
    pub warnings: Vec<String>,
}

impl Envelope {
    /// A successful response.
    pub fn ok(value: Value) -> Envelope {
        Envelope {
            outcome: Outcome::Result(value),
            warnings: Vec::new(),
        }
    }

    /// An error response shaped from a tuber error, prefixed with its kind.
    pub fn err(error: &TuberError) -> Envelope {
        Envelope {
            outcome: Outcome::Error(format!("{}: {error}", error.kind())),
            warnings: Vec::new(),
        }
    }

    /// An error response with a verbatim message (no kind prefix).
    pub fn err_message(message: impl Into<String>) -> Envelope {
        Envelope {
            outcome: Outcome::Error(message.into()),
            warnings: Vec::new(),
        }
    }

    /// Attach captured warnings without disturbing the outcome.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Envelope {
        self.warnings = warnings;
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// Serialize to the wire shape.
    pub fn to_value(&self) -> Value {
        let mut map = IndexMap::new();
        match &self.outcome {
            Outcome::Result(v) => {
                map.insert("result".to_string(), v.clone());
            }
            Outcome::Error(message) => {
                let mut inner = IndexMap::new();
                inner.insert("message".to_string(), Value::String(message.clone()));
                map.insert("error".to_string(), Value::Map(inner));
            }
        }
        if !self.warnings.is_empty() {
            map.insert(
                "warnings".to_string(),
                Value::Array(
                    self.warnings
                        .iter()
                        .map(|w| Value::String(w.clone()))
                        .collect(),
                ),
            );
        }
        Value::Map(map)
    }

    /// Parse a wire response record. Records with neither `result` nor
    /// `error` are rejected.
    pub fn from_value(value: &Value) -> Result<Envelope> {
        let map = value
            .as_map()
            .ok_or_else(|| TuberError::Type("Response record must be an object".into()))?;

        let warnings = match map.get("warnings") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|w| {
                    w.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| TuberError::Type("Warnings must be strings".into()))
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(TuberError::Type("Warnings must be an array".into())),
            None => Vec::new(),
        };

        let outcome = if let Some(err) = map.get("error") {
            let message = err
                .as_map()
                .and_then(|m| m.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            Outcome::Error(message.to_string())
        } else if let Some(result) = map.get("result") {
            Outcome::Result(result.clone())
        } else {
            return Err(TuberError::Type(
                "Result has no 'result' attribute".into(),
            ));
        };

        Ok(Envelope { outcome, warnings })
    }
}
