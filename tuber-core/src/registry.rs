//! The registry of exported root objects and the path navigator.

use indexmap::IndexMap;

use crate::error::{Result, TuberError};
use crate::object::{Attr, TuberObject};
use crate::path::ObjectPath;

/// The process-wide mapping from root-object names to exported objects.
///
/// Built by the host at startup and read-only while serving.
#[derive(Default)]
pub struct Registry {
    objects: IndexMap<String, Box<dyn TuberObject>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Register a root object under the given name.
    pub fn insert(&mut self, name: impl Into<String>, object: Box<dyn TuberObject>) {
        self.objects.insert(name.into(), object);
    }

    /// Builder-style [`insert`](Registry::insert).
    pub fn with(mut self, name: impl Into<String>, object: Box<dyn TuberObject>) -> Registry {
        self.insert(name, object);
        self
    }

    /// Root object names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.objects.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn root(&self, name: &str) -> Result<&dyn TuberObject> {
        self.objects.get(name).map(|o| o.as_ref()).ok_or_else(|| {
            TuberError::Attribute(format!(
                "'TuberRegistry' object has no attribute '{name}'"
            ))
        })
    }

    /// Resolve an object path to a node.
    ///
    /// Evaluation is left-to-right: each element fetches an attribute of
    /// the current node, then applies its container indices. Any failure
    /// keeps its original kind and gains an
    /// ` (Invalid object name '<path>')` suffix.
    pub fn get(&self, path: &ObjectPath) -> Result<&dyn TuberObject> {
        self.walk(path)
            .map_err(|e| e.with_suffix(&format!(" (Invalid object name '{path}')")))
    }

    fn walk(&self, path: &ObjectPath) -> Result<&dyn TuberObject> {
        let mut elements = path.elements().iter();
        let first = elements
            .next()
            .ok_or_else(|| TuberError::Value("Empty object name".into()))?;

        let mut node = self.root(&first.attr)?;
        node = apply_indices(node, first)?;

        for element in elements {
            // Private attributes are not navigable.
            let attr = if element.attr.starts_with('_') {
                None
            } else {
                node.attr(&element.attr)
            };
            node = match attr {
                Some(Attr::Object(child)) => child,
                Some(_) => {
                    return Err(TuberError::Attribute(format!(
                        "'{}' attribute '{}' is not a tuber object",
                        node.type_name(),
                        element.attr
                    )))
                }
                None => {
                    return Err(TuberError::Attribute(format!(
                        "'{}' object has no attribute '{}'",
                        node.type_name(),
                        element.attr
                    )))
                }
            };
            node = apply_indices(node, element)?;
        }

        Ok(node)
    }
}

fn apply_indices<'a>(
    mut node: &'a dyn TuberObject,
    element: &crate::path::PathElement,
) -> Result<&'a dyn TuberObject> {
    for index in &element.indices {
        let view = node.container().ok_or_else(|| {
            TuberError::Type(format!(
                "'{}' object is not subscriptable",
                node.type_name()
            ))
        })?;
        node = view.index(index)?;
    }
    Ok(node)
}
