//! The request handler: bytes and headers in, media type and bytes out.
//!
//! This is the seam between the HTTP transport (an external collaborator)
//! and the dispatch pipeline. The handler negotiates codecs from the
//! `Content-Type` and `Accept` headers, decodes the body, runs the
//! dispatcher over a single request or an ordered batch, and encodes the
//! response. Per-call failures are error envelopes with HTTP success; only
//! an unencodable error response escapes as an `Err`.

use http::header::{ACCEPT, CONTENT_TYPE};
use http::HeaderMap;

use crate::codec::{ContentType, CONTENT_TYPES};
use crate::dispatch::dispatch;
use crate::envelope::Envelope;
use crate::error::{Result, TuberError};
use crate::registry::Registry;
use crate::schema::SchemaValidator;
use crate::value::Value;

/// Option header recognized on requests.
pub const X_TUBER_OPTIONS: &str = "x-tuber-options";

/// Synthetic error filled into batch slots after a fail-fast abort.
const PRECEDING_CALL_FAILED: &str = "Something went wrong in a preceding call";

/// The server-side request pipeline.
pub struct RequestHandler {
    registry: Registry,
    default_format: ContentType,
    validator: Option<SchemaValidator>,
}

impl RequestHandler {
    pub fn new(registry: Registry) -> RequestHandler {
        RequestHandler {
            registry,
            default_format: ContentType::Json,
            validator: None,
        }
    }

    /// Change the format assumed when a request carries no `Content-Type`.
    pub fn with_default_format(mut self, format: ContentType) -> RequestHandler {
        self.default_format = format;
        self
    }

    /// Enable request/response schema validation.
    pub fn with_validation(mut self) -> Result<RequestHandler> {
        self.validator = Some(SchemaValidator::new()?);
        Ok(self)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle one HTTP exchange.
    ///
    /// Returns the negotiated response media type and the encoded body.
    /// The `Err` arm is reserved for infrastructural failure: even the
    /// fallback error envelope could not be encoded.
    pub fn handle(&self, body: &[u8], headers: &HeaderMap) -> Result<(ContentType, Vec<u8>)> {
        let mut response_format = self.default_format;
        let result = self.run(body, headers, &mut response_format);

        let mut response = match result {
            Ok(value) => value,
            Err(e) => Envelope::err(&e).to_value(),
        };

        if let Some(validator) = &self.validator {
            if let Err(e) = crate::codec::value_to_json(&response)
                .and_then(|json| validator.check_response(&json))
            {
                log::warn!("response downgraded to an error envelope: {e}");
                response = Envelope::err(&e).to_value();
            }
        }

        match response_format.encode(&response) {
            Ok(bytes) => Ok((response_format, bytes)),
            Err(e) => {
                // The response payload itself was unencodable; report that
                // instead. If even the report cannot be encoded, give up.
                let fallback = Envelope::err(&e).to_value();
                let bytes = response_format.encode(&fallback)?;
                Ok((response_format, bytes))
            }
        }
    }

    fn run(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        response_format: &mut ContentType,
    ) -> Result<Value> {
        // Request codec from Content-Type; the response defaults to match.
        let request_format = match header_str(headers, CONTENT_TYPE.as_str())? {
            Some(s) => s.parse::<ContentType>()?,
            None => self.default_format,
        };
        *response_format = request_format;

        // Response codec from Accept.
        if let Some(accept) = header_str(headers, ACCEPT.as_str())? {
            *response_format = negotiate_accept(accept, request_format)?;
        }

        let request_obj = request_format.decode(body)?;

        if let Some(validator) = &self.validator {
            validator.check_request(&crate::codec::value_to_json(&request_obj)?)?;
        }

        match &request_obj {
            Value::Map(_) => Ok(dispatch(&self.registry, &request_obj).to_value()),
            Value::Array(items) => Ok(Value::Array(self.run_batch(items, headers)?)),
            _ => Err(TuberError::Type("Unexpected type in request".into())),
        }
    }

    fn run_batch(&self, items: &[Value], headers: &HeaderMap) -> Result<Vec<Value>> {
        let continue_on_error = header_str(headers, X_TUBER_OPTIONS)?
            .map(|opts| opts.split(',').any(|tok| tok.trim() == "continue-on-error"))
            .unwrap_or(false);

        let mut results = Vec::with_capacity(items.len());
        let mut early_bail = false;
        for item in items {
            if early_bail {
                results.push(Envelope::err_message(PRECEDING_CALL_FAILED).to_value());
                continue;
            }
            let envelope = dispatch(&self.registry, item);
            if envelope.is_error() && !continue_on_error {
                early_bail = true;
            }
            results.push(envelope.to_value());
        }
        Ok(results)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>> {
    match headers.get(name) {
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| TuberError::Value(format!("Invalid {name} header"))),
        None => Ok(None),
    }
}

/// Pick the response codec from an `Accept` header.
///
/// Tokens are comma-split and trimmed. The wildcards `*/*` and
/// `application/*` echo the request codec; otherwise the first token
/// matching a registered codec wins.
fn negotiate_accept(accept: &str, request_format: ContentType) -> Result<ContentType> {
    let tokens: Vec<&str> = accept.split(',').map(str::trim).collect();
    if tokens.contains(&"*/*") || tokens.contains(&"application/*") {
        return Ok(request_format);
    }
    for token in &tokens {
        for ct in CONTENT_TYPES {
            if *token == ct.as_str() {
                return Ok(*ct);
            }
        }
    }
    Err(TuberError::Value(format!(
        "Not able to encode any media type matching {accept}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_wildcards_echo_request_format() {
        assert_eq!(
            negotiate_accept("*/*", ContentType::Cbor).unwrap(),
            ContentType::Cbor
        );
        assert_eq!(
            negotiate_accept("application/*", ContentType::Json).unwrap(),
            ContentType::Json
        );
        assert_eq!(
            negotiate_accept("text/html, */*", ContentType::Cbor).unwrap(),
            ContentType::Cbor
        );
    }

    #[test]
    fn accept_first_registered_match_wins() {
        assert_eq!(
            negotiate_accept(
                "text/html, application/cbor, application/json",
                ContentType::Json
            )
            .unwrap(),
            ContentType::Cbor
        );
        assert_eq!(
            negotiate_accept(" application/json ", ContentType::Cbor).unwrap(),
            ContentType::Json
        );
    }

    #[test]
    fn accept_without_match_fails() {
        let err = negotiate_accept("text/html", ContentType::Json).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Not able to encode any media type matching text/html"
        );
    }
}
