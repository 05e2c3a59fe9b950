//! The reflector: descriptor production for any registry node.
//!
//! A descriptor summarizes a node for clients: docstring, methods,
//! properties, nested objects, and container shape. Two modes exist —
//! *simple* (flat name lists, used for one-off describes) and *recursive*
//! (full metadata maps, used by the client resolver to materialize a
//! whole proxy tree in one round-trip).

use indexmap::IndexMap;

use crate::error::{Result, TuberError};
use crate::object::{Attr, ContainerView, TuberMethod, TuberObject};
use crate::value::Value;

/// Metadata for one callable: docstring and printable signature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodDescriptor {
    pub doc: Option<String>,
    pub signature: Option<String>,
}

impl MethodDescriptor {
    pub fn to_value(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("__doc__".to_string(), opt_string(&self.doc));
        map.insert("__signature__".to_string(), opt_string(&self.signature));
        Value::Map(map)
    }

    pub fn from_value(value: &Value) -> Result<MethodDescriptor> {
        let map = value
            .as_map()
            .ok_or_else(|| TuberError::Type("Method descriptor must be an object".into()))?;
        Ok(MethodDescriptor {
            doc: string_field(map.get("__doc__")),
            signature: string_field(map.get("__signature__")),
        })
    }
}

/// Attribute metadata in either mode: bare names (simple) or a full
/// name-to-metadata map (recursive).
#[derive(Debug, Clone, PartialEq)]
pub enum Members<T> {
    Names(Vec<String>),
    Full(IndexMap<String, T>),
}

impl<T> Members<T> {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Members::Names(names) => names.iter().map(String::as_str).collect(),
            Members::Full(map) => map.keys().map(String::as_str).collect(),
        }
    }
}

/// Container shape label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    List,
    Dict,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::List => "list",
            ContainerKind::Dict => "dict",
        }
    }
}

/// Per-item descriptors, mirroring the container shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    List(Vec<Descriptor>),
    Dict(IndexMap<String, Descriptor>),
}

/// The reflector's summary of a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Descriptor {
    pub doc: Option<String>,
    pub signature: Option<String>,
    pub objects: Option<Members<Descriptor>>,
    pub methods: Option<Members<MethodDescriptor>>,
    pub properties: Option<Members<Value>>,
    pub container: Option<ContainerKind>,
    pub items: Option<Items>,
    /// Shared docstring for container items, emitted once.
    pub item_doc: Option<String>,
    /// Shared method set for container items, emitted once.
    pub item_methods: Option<IndexMap<String, MethodDescriptor>>,
}

impl Descriptor {
    pub fn is_container(&self) -> bool {
        self.container.is_some()
    }

    /// Serialize to the wire shape. Container descriptors carry only the
    /// container fields; plain objects carry doc/objects/methods/properties.
    pub fn to_value(&self) -> Value {
        let mut map = IndexMap::new();
        if let Some(kind) = self.container {
            map.insert("container".to_string(), Value::String(kind.as_str().into()));
            map.insert("item_doc".to_string(), opt_string(&self.item_doc));
            map.insert(
                "item_methods".to_string(),
                match &self.item_methods {
                    Some(methods) => Value::Map(
                        methods
                            .iter()
                            .map(|(k, m)| (k.clone(), m.to_value()))
                            .collect(),
                    ),
                    None => Value::Null,
                },
            );
            map.insert(
                "items".to_string(),
                match &self.items {
                    Some(Items::List(items)) => {
                        Value::Array(items.iter().map(Descriptor::to_value).collect())
                    }
                    Some(Items::Dict(items)) => Value::Map(
                        items
                            .iter()
                            .map(|(k, d)| (k.clone(), d.to_value()))
                            .collect(),
                    ),
                    None => Value::Null,
                },
            );
            return Value::Map(map);
        }

        if self.doc.is_some() || !self.omits_doc() {
            map.insert("__doc__".to_string(), opt_string(&self.doc));
        }
        if let Some(sig) = &self.signature {
            map.insert("__signature__".to_string(), Value::String(sig.clone()));
        }
        if let Some(objects) = &self.objects {
            map.insert(
                "objects".to_string(),
                members_to_value(objects, Descriptor::to_value),
            );
        }
        if let Some(methods) = &self.methods {
            map.insert(
                "methods".to_string(),
                members_to_value(methods, MethodDescriptor::to_value),
            );
        }
        if let Some(properties) = &self.properties {
            map.insert(
                "properties".to_string(),
                members_to_value(properties, Value::clone),
            );
        }
        Value::Map(map)
    }

    // Container items with hoisted metadata omit their `__doc__` key
    // entirely rather than emitting null.
    fn omits_doc(&self) -> bool {
        self.doc.is_none() && self.methods.is_none()
    }

    /// Parse a wire descriptor.
    pub fn from_value(value: &Value) -> Result<Descriptor> {
        let map = value
            .as_map()
            .ok_or_else(|| TuberError::Type("Descriptor must be an object".into()))?;

        if let Some(kind) = map.get("container") {
            let kind = match kind.as_str() {
                Some("list") => ContainerKind::List,
                Some("dict") => ContainerKind::Dict,
                other => {
                    return Err(TuberError::Value(format!(
                        "Invalid container type {other:?}"
                    )))
                }
            };
            let items = match map.get("items") {
                Some(Value::Array(items)) => Some(Items::List(
                    items.iter().map(Descriptor::from_value).collect::<Result<_>>()?,
                )),
                Some(Value::Map(items)) => Some(Items::Dict(
                    items
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), Descriptor::from_value(v)?)))
                        .collect::<Result<_>>()?,
                )),
                Some(Value::Null) | None => None,
                Some(_) => {
                    return Err(TuberError::Type(
                        "Container items must be an array or an object".into(),
                    ))
                }
            };
            let item_methods = match map.get("item_methods") {
                Some(Value::Map(methods)) => Some(
                    methods
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), MethodDescriptor::from_value(v)?)))
                        .collect::<Result<_>>()?,
                ),
                _ => None,
            };
            return Ok(Descriptor {
                container: Some(kind),
                items,
                item_doc: string_field(map.get("item_doc")),
                item_methods,
                ..Descriptor::default()
            });
        }

        let objects = match map.get("objects") {
            Some(Value::Array(names)) => Some(Members::Names(name_list(names)?)),
            Some(Value::Map(entries)) => Some(Members::Full(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Descriptor::from_value(v)?)))
                    .collect::<Result<_>>()?,
            )),
            _ => None,
        };
        let methods = match map.get("methods") {
            Some(Value::Array(names)) => Some(Members::Names(name_list(names)?)),
            Some(Value::Map(entries)) => Some(Members::Full(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), MethodDescriptor::from_value(v)?)))
                    .collect::<Result<_>>()?,
            )),
            _ => None,
        };
        let properties = match map.get("properties") {
            Some(Value::Array(names)) => Some(Members::Names(name_list(names)?)),
            Some(Value::Map(entries)) => Some(Members::Full(entries.clone())),
            _ => None,
        };

        Ok(Descriptor {
            doc: string_field(map.get("__doc__")),
            signature: string_field(map.get("__signature__")),
            objects,
            methods,
            properties,
            ..Descriptor::default()
        })
    }

    /// Re-inflate container item descriptors with the shared `item_doc`
    /// and `item_methods` values. Used on the client after parsing.
    pub fn inflate_items(&mut self) {
        let item_doc = self.item_doc.clone();
        let item_methods = self.item_methods.clone();
        let Some(items) = &mut self.items else { return };
        let inflate = |d: &mut Descriptor| {
            if d.container.is_some() {
                return;
            }
            if d.doc.is_none() {
                d.doc.clone_from(&item_doc);
            }
            if d.methods.is_none() {
                d.methods = item_methods.clone().map(Members::Full);
            }
        };
        match items {
            Items::List(items) => items.iter_mut().for_each(inflate),
            Items::Dict(items) => items.values_mut().for_each(inflate),
        }
    }
}

fn members_to_value<T>(members: &Members<T>, f: impl Fn(&T) -> Value) -> Value {
    match members {
        Members::Names(names) => Value::Array(
            names
                .iter()
                .map(|n| Value::String(n.clone()))
                .collect(),
        ),
        Members::Full(map) => Value::Map(map.iter().map(|(k, v)| (k.clone(), f(v))).collect()),
    }
}

fn name_list(values: &[Value]) -> Result<Vec<String>> {
    values
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| TuberError::Type("Attribute names must be strings".into()))
        })
        .collect()
}

fn opt_string(s: &Option<String>) -> Value {
    match s {
        Some(s) => Value::String(s.clone()),
        None => Value::Null,
    }
}

fn string_field(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).map(str::to_string)
}

// -- Descriptor production ----------------------------------------------------

/// Describe one callable.
///
/// Language bindings sometimes encode the signature as the first line of
/// the docstring (`"name(args...)\n\ndoc"`); when no explicit signature is
/// available, that line is split out.
pub fn describe_method(name: &str, method: &dyn TuberMethod) -> MethodDescriptor {
    let mut doc = method.doc();
    let mut signature = method.signature();

    if signature.is_none() {
        if let Some(text) = doc.as_deref() {
            if text.starts_with(&format!("{name}(")) {
                let (head, rest) = match text.split_once('\n') {
                    Some((head, rest)) => (head.to_string(), Some(rest.trim().to_string())),
                    None => (text.to_string(), None),
                };
                signature = head.split_once('(').map(|(_, tail)| format!("({tail}"));
                doc = rest.filter(|r| !r.is_empty());
            }
        }
    }

    MethodDescriptor { doc, signature }
}

/// Describe an object node. In recursive mode, nested objects are fully
/// described and containers yield per-item descriptors; in simple mode the
/// output is flat name lists and container structure is not expanded.
pub fn describe_object(obj: &dyn TuberObject, recursive: bool) -> Descriptor {
    describe_object_inner(obj, recursive, None)
}

fn describe_object_inner(
    obj: &dyn TuberObject,
    recursive: bool,
    only_attrs: Option<&[String]>,
) -> Descriptor {
    if recursive {
        if let Some(view) = obj.container() {
            return describe_container(&view);
        }
    }

    let names = match only_attrs {
        Some(names) => names.to_vec(),
        None => obj.attr_names(),
    };

    let mut objects = IndexMap::new();
    let mut methods = IndexMap::new();
    let mut properties = IndexMap::new();

    for name in names {
        // Never export private attributes, whatever the object reports.
        if name.starts_with('_') {
            continue;
        }
        match obj.attr(&name) {
            Some(Attr::Object(child)) => {
                let desc = if recursive {
                    describe_object(child, true)
                } else {
                    Descriptor::default()
                };
                objects.insert(name, desc);
            }
            Some(Attr::Method(method)) => {
                let desc = if recursive {
                    describe_method(&name, method)
                } else {
                    MethodDescriptor::default()
                };
                methods.insert(name, desc);
            }
            Some(Attr::Property(value)) => {
                properties.insert(name, value);
            }
            None => {}
        }
    }

    if recursive {
        Descriptor {
            doc: obj.doc(),
            objects: Some(Members::Full(objects)),
            methods: Some(Members::Full(methods)),
            properties: Some(Members::Full(properties)),
            ..Descriptor::default()
        }
    } else {
        Descriptor {
            doc: obj.doc(),
            objects: Some(Members::Names(objects.into_keys().collect())),
            methods: Some(Members::Names(methods.into_keys().collect())),
            properties: Some(Members::Names(properties.into_keys().collect())),
            ..Descriptor::default()
        }
    }
}

/// Describe a container node.
///
/// The first item is described fully; repeated per-item metadata
/// (docstring and method set) is hoisted into `item_doc`/`item_methods`
/// and stripped from every item, and later items only examine the
/// attribute set the first item exposed.
fn describe_container(view: &ContainerView<'_>) -> Descriptor {
    let mut item_attrs: Option<Vec<String>> = None;
    let mut item_doc = None;
    let mut item_methods = None;

    let mut describe_item = |obj: &dyn TuberObject| {
        let mut desc = describe_object_inner(obj, true, item_attrs.as_deref());
        if desc.container.is_none() {
            if item_attrs.is_none() {
                item_doc = desc.doc.take();
                item_methods = match desc.methods.take() {
                    Some(Members::Full(methods)) => Some(methods),
                    _ => None,
                };
                let mut attrs = Vec::new();
                if let Some(Members::Full(objects)) = &desc.objects {
                    attrs.extend(objects.keys().cloned());
                }
                if let Some(Members::Full(properties)) = &desc.properties {
                    attrs.extend(properties.keys().cloned());
                }
                item_attrs = Some(attrs);
            } else {
                desc.doc = None;
                desc.methods = None;
            }
        }
        desc
    };

    let (kind, items) = match view {
        ContainerView::List(items) => (
            ContainerKind::List,
            Items::List(items.iter().map(|i| describe_item(*i)).collect()),
        ),
        ContainerView::Dict(items) => (
            ContainerKind::Dict,
            Items::Dict(
                items
                    .iter()
                    .map(|(k, v)| (k.to_string(), describe_item(*v)))
                    .collect(),
            ),
        ),
    };

    Descriptor {
        container: Some(kind),
        items: Some(items),
        item_doc,
        item_methods,
        ..Descriptor::default()
    }
}
