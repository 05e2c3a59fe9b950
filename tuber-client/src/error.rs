use std::fmt;

use tuber_core::TuberError;

/// All error types surfaced by the tuber client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The server answered with an error envelope, or a non-2xx status.
    Remote(String),

    /// The response violated the protocol: unknown content type, wrong
    /// shape, or a length mismatch against the request batch.
    Protocol(String),

    /// A proxy or context was used in a state it cannot serve.
    State(String),

    /// A name that does not exist on the proxy, or one matching the
    /// reserved deny-set.
    Attribute(String),

    /// The flush owning this call was cancelled or dropped before the
    /// call resolved.
    Cancelled,

    /// A connection-level failure from the HTTP transport.
    Network(String),

    /// An encode/decode failure in the shared codec layer.
    Codec(TuberError),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Remote(m) => write!(f, "remote error: {m}"),
            ClientError::Protocol(m) => write!(f, "protocol error: {m}"),
            ClientError::State(m) => write!(f, "state error: {m}"),
            ClientError::Attribute(m) => write!(f, "attribute error: {m}"),
            ClientError::Cancelled => write!(f, "call cancelled before completion"),
            ClientError::Network(m) => write!(f, "network failure: {m}"),
            ClientError::Codec(e) => write!(f, "{}: {e}", e.kind()),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TuberError> for ClientError {
    fn from(e: TuberError) -> Self {
        ClientError::Codec(e)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Network(e.to_string())
    }
}

/// Convenience type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formatting() {
        let err = ClientError::Remote("RuntimeError: Oops!".into());
        assert_eq!(err.to_string(), "remote error: RuntimeError: Oops!");

        let err = ClientError::Cancelled;
        assert_eq!(err.to_string(), "call cancelled before completion");
    }

    #[test]
    fn codec_errors_convert() {
        let err: ClientError = TuberError::CodecDecode("bad tag".into()).into();
        assert_eq!(err.to_string(), "CodecDecodeError: bad tag");
        assert!(matches!(err, ClientError::Codec(_)));
    }
}
