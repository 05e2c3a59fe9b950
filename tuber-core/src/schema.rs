//! JSON Schemas for requests and responses.
//!
//! Validation is off by default and enabled per handler. It is a
//! belt-and-braces conformance check for the wire protocol, not a defense
//! against malicious input: an invalid request becomes a `ValueError`
//! envelope, and an invalid *response* is downgraded to an error envelope
//! with a log line so the substitution is observable.

use serde_json::json;

use crate::error::{Result, TuberError};

fn request_schema() -> serde_json::Value {
    let single = json!({
        "type": "object",
        "properties": {
            "args": {"type": "array"},
            "kwargs": {"type": "object"},
            "object": {
                "oneOf": [
                    {"type": "null"},
                    {"type": "string"},
                    {"type": "array"},
                ],
            },
            "property": {"type": "string"},
            "method": {"type": "string"},
            "resolve": {"type": "boolean"},
        },
        "additionalProperties": false,
    });
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "oneOf": [single, {"type": "array", "items": single}],
    })
}

fn response_schema() -> serde_json::Value {
    let warnings = json!({
        "type": "array",
        "items": {"type": "string"},
    });
    let valid = json!({
        "type": "object",
        "properties": {
            "result": {},
            "warnings": warnings,
        },
        "required": ["result"],
        "additionalProperties": false,
    });
    let error = json!({
        "type": "object",
        "properties": {
            "error": {
                "type": "object",
                "properties": {
                    "message": {"type": "string"},
                },
            },
            "warnings": warnings,
        },
        "required": ["error"],
        "additionalProperties": false,
    });
    let single = json!({"type": "object", "oneOf": [valid, error]});
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "oneOf": [single, {"type": "array", "items": single}],
    })
}

/// Compiled request/response validators.
pub struct SchemaValidator {
    request: jsonschema::Validator,
    response: jsonschema::Validator,
}

impl SchemaValidator {
    pub fn new() -> Result<SchemaValidator> {
        let compile = |schema: &serde_json::Value| {
            jsonschema::validator_for(schema)
                .map_err(|e| TuberError::Value(format!("Invalid schema: {e}")))
        };
        Ok(SchemaValidator {
            request: compile(&request_schema())?,
            response: compile(&response_schema())?,
        })
    }

    /// Check a decoded request body.
    pub fn check_request(&self, instance: &serde_json::Value) -> Result<()> {
        self.request.validate(instance).map_err(|e| {
            TuberError::Value(format!("Request does not conform to schema: {e}"))
        })
    }

    /// Check an outgoing response body.
    pub fn check_response(&self, instance: &serde_json::Value) -> Result<()> {
        self.response.validate(instance).map_err(|e| {
            TuberError::Value(format!("Response does not conform to schema: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> SchemaValidator {
        SchemaValidator::new().expect("schemas compile")
    }

    #[test]
    fn accepts_well_formed_requests() {
        let v = validator();
        for instance in [
            json!({}),
            json!({"object": "Types", "property": "STRING"}),
            json!({"object": null, "resolve": true}),
            json!({"object": ["Tree", ["children", 0]], "method": "poke"}),
            json!([{"object": "A", "method": "m", "args": [1], "kwargs": {"x": 2}}]),
            json!([]),
        ] {
            assert!(v.check_request(&instance).is_ok(), "{instance}");
        }
    }

    #[test]
    fn rejects_malformed_requests() {
        let v = validator();
        for instance in [
            json!({"unknown_key": 1}),
            json!({"args": {"not": "a list"}}),
            json!({"resolve": "yes"}),
            json!("just a string"),
        ] {
            assert!(v.check_request(&instance).is_err(), "{instance}");
        }
    }

    #[test]
    fn accepts_well_formed_responses() {
        let v = validator();
        for instance in [
            json!({"result": null}),
            json!({"error": {"message": "TypeError: nope"}, "warnings": ["w"]}),
            json!([{"result": 1}, {"error": {"message": "m"}}]),
            json!([]),
        ] {
            assert!(v.check_response(&instance).is_ok(), "{instance}");
        }
    }

    #[test]
    fn rejects_malformed_responses() {
        let v = validator();
        for instance in [
            // both result and error
            json!({"result": 1, "error": {"message": "m"}}),
            // neither
            json!({"warnings": []}),
            json!({"result": 1, "extra": true}),
            json!({"error": {"message": "m"}, "warnings": [1]}),
        ] {
            assert!(v.check_response(&instance).is_err(), "{instance}");
        }
    }
}
