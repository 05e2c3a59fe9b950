use std::fmt;

/// All error types produced by the tuber server and codec layers.
///
/// Every variant carries a human-readable message; the `kind()` string is
/// the class-name prefix used when an error is shaped into a wire envelope
/// (`{"error": {"message": "<Kind>: <text>"}}`).
#[derive(Debug, Clone, PartialEq)]
pub enum TuberError {
    /// An object exists but has no attribute with the requested name.
    Attribute(String),

    /// A value had the wrong shape (non-list `args`, non-map `kwargs`,
    /// unexpected batch wrapper, non-subscriptable node, ...).
    Type(String),

    /// An invalid option or media type, or a malformed object path.
    Value(String),

    /// A container index was out of range.
    Index(String),

    /// A container key was not present.
    Key(String),

    /// A failure raised by a host method during invocation.
    Runtime(String),

    /// A host-method failure with a caller-chosen kind name.
    Custom { kind: String, message: String },

    /// Input bytes (or a CBOR tag) could not be decoded.
    CodecDecode(String),

    /// A value could not be encoded in the negotiated format.
    CodecEncode(String),
}

impl TuberError {
    /// The class-name prefix used on the wire.
    pub fn kind(&self) -> &str {
        match self {
            TuberError::Attribute(_) => "AttributeError",
            TuberError::Type(_) => "TypeError",
            TuberError::Value(_) => "ValueError",
            TuberError::Index(_) => "IndexError",
            TuberError::Key(_) => "KeyError",
            TuberError::Runtime(_) => "RuntimeError",
            TuberError::Custom { kind, .. } => kind,
            TuberError::CodecDecode(_) => "CodecDecodeError",
            TuberError::CodecEncode(_) => "CodecEncodeError",
        }
    }

    /// A host-method failure with an explicit kind name.
    pub fn custom(kind: impl Into<String>, message: impl Into<String>) -> Self {
        TuberError::Custom {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Rebuild this error with extra context appended to its message,
    /// preserving the variant (and therefore the wire kind).
    pub fn with_suffix(self, suffix: &str) -> Self {
        match self {
            TuberError::Attribute(m) => TuberError::Attribute(format!("{m}{suffix}")),
            TuberError::Type(m) => TuberError::Type(format!("{m}{suffix}")),
            TuberError::Value(m) => TuberError::Value(format!("{m}{suffix}")),
            TuberError::Index(m) => TuberError::Index(format!("{m}{suffix}")),
            TuberError::Key(m) => TuberError::Key(format!("{m}{suffix}")),
            TuberError::Runtime(m) => TuberError::Runtime(format!("{m}{suffix}")),
            TuberError::Custom { kind, message } => TuberError::Custom {
                kind,
                message: format!("{message}{suffix}"),
            },
            TuberError::CodecDecode(m) => TuberError::CodecDecode(format!("{m}{suffix}")),
            TuberError::CodecEncode(m) => TuberError::CodecEncode(format!("{m}{suffix}")),
        }
    }
}

impl fmt::Display for TuberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TuberError::Attribute(m)
            | TuberError::Type(m)
            | TuberError::Value(m)
            | TuberError::Index(m)
            | TuberError::Key(m)
            | TuberError::Runtime(m)
            | TuberError::CodecDecode(m)
            | TuberError::CodecEncode(m) => write!(f, "{m}"),
            TuberError::Custom { message, .. } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for TuberError {}

/// Convenience type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TuberError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings() {
        assert_eq!(TuberError::Attribute("x".into()).kind(), "AttributeError");
        assert_eq!(TuberError::Type("x".into()).kind(), "TypeError");
        assert_eq!(TuberError::Value("x".into()).kind(), "ValueError");
        assert_eq!(TuberError::Index("x".into()).kind(), "IndexError");
        assert_eq!(TuberError::Key("x".into()).kind(), "KeyError");
        assert_eq!(TuberError::Runtime("x".into()).kind(), "RuntimeError");
        assert_eq!(
            TuberError::custom("OverflowError", "too big").kind(),
            "OverflowError"
        );
    }

    #[test]
    fn display_is_message_only() {
        let err = TuberError::Attribute("'Types' object has no attribute 'nope'".into());
        assert_eq!(
            err.to_string(),
            "'Types' object has no attribute 'nope'"
        );
    }

    #[test]
    fn suffix_preserves_kind() {
        let err = TuberError::Index("list index out of range".into())
            .with_suffix(" (Invalid object name 'Tree.children[9]')");
        assert_eq!(err.kind(), "IndexError");
        assert_eq!(
            err.to_string(),
            "list index out of range (Invalid object name 'Tree.children[9]')"
        );
    }
}
