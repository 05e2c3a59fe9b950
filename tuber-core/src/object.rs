//! The reflection capability set.
//!
//! Host objects are exported by implementing [`TuberObject`]; callable
//! attributes implement [`TuberMethod`]. The dispatcher and reflector see
//! every node through these two traits plus the [`Attr`] classification,
//! so the rest of the pipeline is independent of how objects are built.

use indexmap::IndexMap;

use crate::error::{Result, TuberError};
use crate::path::Index;
use crate::value::Value;

/// A callable attribute of an exported object.
pub trait TuberMethod: Send + Sync {
    /// Docstring shown to clients, if any.
    fn doc(&self) -> Option<String> {
        None
    }

    /// Printable signature, e.g. `"(arg='hello')"`.
    fn signature(&self) -> Option<String> {
        None
    }

    /// Invoke the method. Warnings reported through
    /// [`crate::warnings::warn`] during the call are attached to the
    /// response record.
    fn invoke(&self, args: &[Value], kwargs: &IndexMap<String, Value>) -> Result<Value>;
}

/// Classification of a named attribute.
pub enum Attr<'a> {
    /// A non-callable data value.
    Property(Value),
    /// A callable.
    Method(&'a dyn TuberMethod),
    /// Another exported node (possibly a container).
    Object(&'a dyn TuberObject),
}

/// An exported object node.
///
/// `attr_names` and `attr` must agree: every listed name resolves, and
/// names starting with `_` are never listed. The reflector filters
/// underscore names again regardless, so a sloppy implementation cannot
/// leak them.
pub trait TuberObject: Send + Sync + std::fmt::Debug {
    /// The type name used in `AttributeError` messages.
    fn type_name(&self) -> &str;

    /// Docstring shown to clients, if any.
    fn doc(&self) -> Option<String> {
        None
    }

    /// Exported attribute names, in declaration order.
    fn attr_names(&self) -> Vec<String>;

    /// Look up one attribute.
    fn attr(&self, name: &str) -> Option<Attr<'_>>;

    /// `Some` iff this node is a container of homogeneous child objects.
    fn container(&self) -> Option<ContainerView<'_>> {
        None
    }
}

// -- Containers ---------------------------------------------------------------

/// A borrowed view of a container's children.
pub enum ContainerView<'a> {
    List(Vec<&'a dyn TuberObject>),
    Dict(Vec<(&'a str, &'a dyn TuberObject)>),
}

impl<'a> ContainerView<'a> {
    /// The wire label for this container shape.
    pub fn kind(&self) -> &'static str {
        match self {
            ContainerView::List(_) => "list",
            ContainerView::Dict(_) => "dict",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ContainerView::List(items) => items.len(),
            ContainerView::Dict(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index into the container. List containers take integers (negative
    /// values count from the end); dict containers take keys.
    pub fn index(&self, index: &Index) -> Result<&'a dyn TuberObject> {
        match (self, index) {
            (ContainerView::List(items), Index::Int(i)) => {
                let len = items.len() as i64;
                let resolved = if *i < 0 { len + i } else { *i };
                if resolved < 0 || resolved >= len {
                    return Err(TuberError::Index("list index out of range".into()));
                }
                Ok(items[resolved as usize])
            }
            (ContainerView::List(_), Index::Key(_)) => Err(TuberError::Type(
                "list indices must be integers".into(),
            )),
            (ContainerView::Dict(items), Index::Key(key)) => items
                .iter()
                .find(|(k, _)| *k == key.as_str())
                .map(|(_, v)| *v)
                .ok_or_else(|| TuberError::Key(format!("'{key}'"))),
            (ContainerView::Dict(_), Index::Int(i)) => Err(TuberError::Key(format!("{i}"))),
        }
    }
}

/// A concrete container node grouping objects of one type.
///
/// Containers reject empty collections and require every child to report
/// the same type name, so clients can rely on the shared item metadata.
#[derive(Debug)]
pub enum ObjectContainer {
    List(Vec<Box<dyn TuberObject>>),
    Dict(IndexMap<String, Box<dyn TuberObject>>),
}

impl ObjectContainer {
    pub fn from_list(items: Vec<Box<dyn TuberObject>>) -> Result<ObjectContainer> {
        if items.is_empty() {
            return Err(TuberError::Value("Empty list container".into()));
        }
        check_homogeneous(items.iter().map(|i| i.as_ref()))?;
        Ok(ObjectContainer::List(items))
    }

    pub fn from_dict(items: IndexMap<String, Box<dyn TuberObject>>) -> Result<ObjectContainer> {
        if items.is_empty() {
            return Err(TuberError::Value("Empty dict container".into()));
        }
        check_homogeneous(items.values().map(|i| i.as_ref()))?;
        Ok(ObjectContainer::Dict(items))
    }

    pub fn len(&self) -> usize {
        match self {
            ObjectContainer::List(items) => items.len(),
            ObjectContainer::Dict(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_homogeneous<'a>(mut items: impl Iterator<Item = &'a dyn TuberObject>) -> Result<()> {
    let first = match items.next() {
        Some(item) => item.type_name().to_string(),
        None => return Ok(()),
    };
    for item in items {
        if item.type_name() != first {
            return Err(TuberError::Type(format!(
                "All entries must be of type {first}"
            )));
        }
    }
    Ok(())
}

impl TuberObject for ObjectContainer {
    fn type_name(&self) -> &str {
        "TuberContainer"
    }

    fn attr_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn attr(&self, _name: &str) -> Option<Attr<'_>> {
        None
    }

    fn container(&self) -> Option<ContainerView<'_>> {
        Some(match self {
            ObjectContainer::List(items) => {
                ContainerView::List(items.iter().map(|i| i.as_ref()).collect())
            }
            ObjectContainer::Dict(items) => {
                ContainerView::Dict(items.iter().map(|(k, v)| (k.as_str(), v.as_ref())).collect())
            }
        })
    }
}

// -- Closure-backed methods ---------------------------------------------------

type MethodFn = dyn Fn(&[Value], &IndexMap<String, Value>) -> Result<Value> + Send + Sync;

/// A [`TuberMethod`] backed by a closure, for hosts that export functions
/// without defining a type per method.
pub struct FnMethod {
    doc: Option<String>,
    signature: Option<String>,
    func: Box<MethodFn>,
}

impl std::fmt::Debug for FnMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMethod")
            .field("doc", &self.doc)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl FnMethod {
    pub fn new<F>(func: F) -> FnMethod
    where
        F: Fn(&[Value], &IndexMap<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        FnMethod {
            doc: None,
            signature: None,
            func: Box::new(func),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> FnMethod {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> FnMethod {
        self.signature = Some(signature.into());
        self
    }
}

impl TuberMethod for FnMethod {
    fn doc(&self) -> Option<String> {
        self.doc.clone()
    }

    fn signature(&self) -> Option<String> {
        self.signature.clone()
    }

    fn invoke(&self, args: &[Value], kwargs: &IndexMap<String, Value>) -> Result<Value> {
        (self.func)(args, kwargs)
    }
}
