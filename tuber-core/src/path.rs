//! The object-path grammar.
//!
//! A path selects a node under the registry: a sequence of attribute names,
//! each optionally followed by container indices. The canonical wire form
//! is a list (`["Tree", ["children", 0]]`); a dotted string
//! (`"Tree.children[0]"`) is accepted as sugar and parsed with a fixed
//! grammar — path strings are never evaluated.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, TuberError};
use crate::value::Value;

/// A container index: integer for list containers, string for dicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Index {
    Int(i64),
    Key(String),
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Int(i) => write!(f, "{i}"),
            Index::Key(k) => write!(f, "'{k}'"),
        }
    }
}

/// One path element: an attribute name plus zero or more indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathElement {
    pub attr: String,
    pub indices: Vec<Index>,
}

impl PathElement {
    pub fn attr(name: impl Into<String>) -> PathElement {
        PathElement {
            attr: name.into(),
            indices: Vec::new(),
        }
    }
}

/// A parsed object path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectPath {
    elements: Vec<PathElement>,
}

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").expect("valid regex"))
}

fn index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\[(?:(-?\d+)|'([^']*)'|"([^"]*)")\]"#).expect("valid regex")
    })
}

impl ObjectPath {
    /// A single-attribute path.
    pub fn root(name: impl Into<String>) -> ObjectPath {
        ObjectPath {
            elements: vec![PathElement::attr(name)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Extend with an attribute access.
    pub fn child(&self, name: impl Into<String>) -> ObjectPath {
        let mut elements = self.elements.clone();
        elements.push(PathElement::attr(name));
        ObjectPath { elements }
    }

    /// Extend with a container index on the final element.
    pub fn indexed(&self, index: Index) -> ObjectPath {
        let mut elements = self.elements.clone();
        match elements.last_mut() {
            Some(last) => last.indices.push(index),
            None => elements.push(PathElement {
                attr: String::new(),
                indices: vec![index],
            }),
        }
        ObjectPath { elements }
    }

    /// Parse the dotted string sugar.
    pub fn parse(s: &str) -> Result<ObjectPath> {
        let invalid = || TuberError::Value(format!("Could not parse object name '{s}'"));

        let mut elements = Vec::new();
        let mut rest = s;
        loop {
            let m = ident_re().find(rest).ok_or_else(invalid)?;
            let mut element = PathElement::attr(m.as_str());
            rest = &rest[m.end()..];

            while let Some(caps) = index_re().captures(rest) {
                let index = if let Some(int) = caps.get(1) {
                    Index::Int(int.as_str().parse().map_err(|_| invalid())?)
                } else if let Some(key) = caps.get(2).or_else(|| caps.get(3)) {
                    Index::Key(key.as_str().to_string())
                } else {
                    return Err(invalid());
                };
                element.indices.push(index);
                let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
                rest = &rest[end..];
            }

            elements.push(element);

            if rest.is_empty() {
                break;
            }
            rest = rest.strip_prefix('.').ok_or_else(invalid)?;
        }

        Ok(ObjectPath { elements })
    }

    /// Parse the wire form of the `object` field: null, a string (sugar),
    /// or an array of strings / `[attr, idx...]` arrays.
    pub fn from_value(value: &Value) -> Result<Option<ObjectPath>> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => ObjectPath::parse(s).map(Some),
            Value::Array(items) => {
                let mut elements = Vec::new();
                for item in items {
                    elements.push(match item {
                        Value::String(attr) => PathElement::attr(attr.clone()),
                        Value::Array(parts) => {
                            let mut parts = parts.iter();
                            let attr = parts
                                .next()
                                .and_then(Value::as_str)
                                .ok_or_else(|| {
                                    TuberError::Type(
                                        "Object path element must start with an attribute name"
                                            .into(),
                                    )
                                })?;
                            let indices = parts
                                .map(|p| match p {
                                    Value::Int(i) => Ok(Index::Int(*i)),
                                    Value::String(k) => Ok(Index::Key(k.clone())),
                                    _ => Err(TuberError::Type(
                                        "Object path indices must be integers or strings".into(),
                                    )),
                                })
                                .collect::<Result<Vec<_>>>()?;
                            PathElement {
                                attr: attr.to_string(),
                                indices,
                            }
                        }
                        _ => {
                            return Err(TuberError::Type(
                                "Object path elements must be strings or arrays".into(),
                            ))
                        }
                    });
                }
                Ok(Some(ObjectPath { elements }))
            }
            _ => Err(TuberError::Type(
                "Argument 'object' must be null, a string or an array".into(),
            )),
        }
    }

    /// Serialize the canonical list form.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.elements
                .iter()
                .map(|e| {
                    if e.indices.is_empty() {
                        Value::String(e.attr.clone())
                    } else {
                        let mut parts = vec![Value::String(e.attr.clone())];
                        parts.extend(e.indices.iter().map(|i| match i {
                            Index::Int(v) => Value::Int(*v),
                            Index::Key(k) => Value::String(k.clone()),
                        }));
                        Value::Array(parts)
                    }
                })
                .collect(),
        )
    }
}

impl FromStr for ObjectPath {
    type Err = TuberError;

    fn from_str(s: &str) -> Result<Self> {
        ObjectPath::parse(s)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", element.attr)?;
            for index in &element.indices {
                write!(f, "[{index}]")?;
            }
        }
        Ok(())
    }
}
