//! The client resolver: lazy descriptor fetch and local proxy trees.
//!
//! [`resolve`] (cooperative) and [`resolve_simple`] (serial) fetch one
//! recursive descriptor for a registry root — or the whole registry — and
//! materialize it: methods become named callables carrying the remote
//! doc/signature metadata, properties are stored locally, nested objects
//! become child proxies, and containers become list- or dict-shaped
//! proxies. The fetched descriptor is authoritative for the proxy's
//! lifetime; container items share one stub per resolved method.

use std::sync::Arc;

use indexmap::IndexMap;

use tuber_core::reflect::{ContainerKind, Descriptor, Items, Members, MethodDescriptor};
use tuber_core::{Index, ObjectPath, Value};

use crate::context::{attribute_blacklisted, Context, SimpleContext};
use crate::error::{ClientError, Result};
use crate::http::{BlockingSession, Session};

/// Shared metadata for one remote method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodStub {
    pub name: String,
    pub doc: Option<String>,
    pub signature: Option<String>,
}

/// Container items materialized as child proxies.
#[derive(Debug)]
pub enum ProxyItems<S> {
    List(Vec<Proxy<S>>),
    Dict(IndexMap<String, Proxy<S>>),
}

/// A local stand-in for a remote object.
///
/// Generic over the session flavor; use the [`TuberProxy`] and
/// [`SimpleTuberProxy`] aliases.
#[derive(Debug)]
pub struct Proxy<S> {
    session: Arc<S>,
    path: Option<ObjectPath>,
    doc: Option<String>,
    methods: IndexMap<String, Arc<MethodStub>>,
    properties: IndexMap<String, Value>,
    objects: IndexMap<String, Proxy<S>>,
    items: Option<ProxyItems<S>>,
}

/// Cooperative proxy over an async [`Session`].
pub type TuberProxy = Proxy<Session>;

/// Serial proxy over a [`BlockingSession`].
pub type SimpleTuberProxy = Proxy<BlockingSession>;

impl<S> Proxy<S> {
    /// Build the proxy tree from a recursive descriptor.
    fn from_descriptor(
        session: Arc<S>,
        path: Option<ObjectPath>,
        mut descriptor: Descriptor,
    ) -> Result<Proxy<S>> {
        let mut proxy = Proxy {
            session: Arc::clone(&session),
            path: path.clone(),
            doc: descriptor.doc.take(),
            methods: IndexMap::new(),
            properties: IndexMap::new(),
            objects: IndexMap::new(),
            items: None,
        };

        if let Some(Members::Full(methods)) = descriptor.methods {
            for (name, meta) in methods {
                proxy.methods.insert(name.clone(), Arc::new(stub(name, meta)));
            }
        }
        if let Some(Members::Full(properties)) = descriptor.properties {
            proxy.properties = properties;
        }
        if let Some(Members::Full(objects)) = descriptor.objects {
            for (name, child_desc) in objects {
                let child_path = match &path {
                    Some(p) => p.child(&name),
                    None => ObjectPath::root(&name),
                };
                let child = Proxy::from_descriptor(
                    Arc::clone(&session),
                    Some(child_path),
                    child_desc,
                )?;
                proxy.objects.insert(name, child);
            }
        }

        if descriptor.container.is_some() {
            let base = path.clone().ok_or_else(|| {
                ClientError::State("The registry itself cannot be a container".into())
            })?;
            // One stub instance per method, shared by every item.
            let shared: IndexMap<String, Arc<MethodStub>> = descriptor
                .item_methods
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(|(name, meta)| (name.clone(), Arc::new(stub(name, meta))))
                .collect();
            let item_doc = descriptor.item_doc.clone();

            proxy.items = Some(match descriptor.items {
                Some(Items::List(items)) => ProxyItems::List(
                    items
                        .into_iter()
                        .enumerate()
                        .map(|(i, d)| {
                            item_proxy(
                                Arc::clone(&session),
                                base.indexed(Index::Int(i as i64)),
                                d,
                                &shared,
                                item_doc.as_deref(),
                            )
                        })
                        .collect::<Result<_>>()?,
                ),
                Some(Items::Dict(items)) => ProxyItems::Dict(
                    items
                        .into_iter()
                        .map(|(k, d)| {
                            let child = item_proxy(
                                Arc::clone(&session),
                                base.indexed(Index::Key(k.clone())),
                                d,
                                &shared,
                                item_doc.as_deref(),
                            )?;
                            Ok((k, child))
                        })
                        .collect::<Result<_>>()?,
                ),
                None => match descriptor.container {
                    Some(ContainerKind::List) => ProxyItems::List(Vec::new()),
                    _ => ProxyItems::Dict(IndexMap::new()),
                },
            });
        }

        Ok(proxy)
    }

    fn require_path(&self) -> Result<&ObjectPath> {
        self.path.as_ref().ok_or_else(|| {
            ClientError::State("The registry proxy has no methods of its own".into())
        })
    }

    fn lookup(&self, name: &str) -> Result<()> {
        if attribute_blacklisted(name) {
            return Err(ClientError::Attribute(format!(
                "{name} is not a valid method or property!"
            )));
        }
        Ok(())
    }

    /// The remote docstring.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// The object path this proxy stands for; `None` for the registry root.
    pub fn path(&self) -> Option<&ObjectPath> {
        self.path.as_ref()
    }

    /// Names of the resolved methods.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    /// Names of the resolved properties.
    pub fn property_names(&self) -> Vec<&str> {
        self.properties.keys().map(String::as_str).collect()
    }

    /// Names of the resolved child objects.
    pub fn object_names(&self) -> Vec<&str> {
        self.objects.keys().map(String::as_str).collect()
    }

    /// Metadata for one resolved method (shared across container items).
    pub fn method(&self, name: &str) -> Result<&Arc<MethodStub>> {
        self.lookup(name)?;
        self.methods.get(name).ok_or_else(|| {
            ClientError::Attribute(format!("{} has no method '{name}'", self.describe_self()))
        })
    }

    /// A locally stored property value.
    pub fn property(&self, name: &str) -> Result<&Value> {
        self.lookup(name)?;
        self.properties.get(name).ok_or_else(|| {
            ClientError::Attribute(format!("{} has no property '{name}'", self.describe_self()))
        })
    }

    /// A resolved child object.
    pub fn object(&self, name: &str) -> Result<&Proxy<S>> {
        self.lookup(name)?;
        self.objects.get(name).ok_or_else(|| {
            ClientError::Attribute(format!("{} has no object '{name}'", self.describe_self()))
        })
    }

    /// `true` if this proxy stands for a container node.
    pub fn is_container(&self) -> bool {
        self.items.is_some()
    }

    /// Number of container items; `None` for non-containers.
    pub fn len(&self) -> Option<usize> {
        self.items.as_ref().map(|items| match items {
            ProxyItems::List(v) => v.len(),
            ProxyItems::Dict(m) => m.len(),
        })
    }

    pub fn is_empty(&self) -> Option<bool> {
        self.len().map(|n| n == 0)
    }

    /// Index into a container proxy.
    pub fn item(&self, index: &Index) -> Result<&Proxy<S>> {
        let items = self.items.as_ref().ok_or_else(|| {
            ClientError::State(format!("{} is not a container", self.describe_self()))
        })?;
        match (items, index) {
            (ProxyItems::List(v), Index::Int(i)) => {
                let len = v.len() as i64;
                let resolved = if *i < 0 { len + i } else { *i };
                usize::try_from(resolved)
                    .ok()
                    .and_then(|i| v.get(i))
                    .ok_or_else(|| ClientError::Attribute("list index out of range".into()))
            }
            (ProxyItems::Dict(m), Index::Key(k)) => m
                .get(k)
                .ok_or_else(|| ClientError::Attribute(format!("'{k}'"))),
            _ => Err(ClientError::Attribute(
                "index type does not match container shape".into(),
            )),
        }
    }

    /// Iterate over container item proxies, in order.
    pub fn iter_items(&self) -> impl Iterator<Item = &Proxy<S>> {
        let items: Vec<&Proxy<S>> = match &self.items {
            Some(ProxyItems::List(v)) => v.iter().collect(),
            Some(ProxyItems::Dict(m)) => m.values().collect(),
            None => Vec::new(),
        };
        items.into_iter()
    }

    /// Container keys for dict-shaped proxies.
    pub fn keys(&self) -> Option<Vec<&str>> {
        match &self.items {
            Some(ProxyItems::Dict(m)) => Some(m.keys().map(String::as_str).collect()),
            _ => None,
        }
    }

    fn describe_self(&self) -> String {
        match &self.path {
            Some(path) => format!("'{path}'"),
            None => "the registry".to_string(),
        }
    }
}

fn stub(name: String, meta: MethodDescriptor) -> MethodStub {
    MethodStub {
        name,
        doc: meta.doc,
        signature: meta.signature,
    }
}

/// Build one container item, re-inflating the hoisted metadata: the shared
/// docstring fills in where the item has none, and the shared method stubs
/// are installed by reference so identity is preserved across items.
fn item_proxy<S>(
    session: Arc<S>,
    path: ObjectPath,
    descriptor: Descriptor,
    shared_methods: &IndexMap<String, Arc<MethodStub>>,
    item_doc: Option<&str>,
) -> Result<Proxy<S>> {
    let mut proxy = Proxy::from_descriptor(session, Some(path), descriptor)?;
    if !proxy.is_container() {
        if proxy.doc.is_none() {
            proxy.doc = item_doc.map(str::to_string);
        }
        for (name, stub) in shared_methods {
            proxy
                .methods
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(stub));
        }
    }
    Ok(proxy)
}

// -- Cooperative mode ---------------------------------------------------------

/// Create a resolved local reference to a networked resource.
///
/// With `objname` this resolves one registry entry; without it the whole
/// registry is resolved and entries are exposed as child objects.
pub async fn resolve(uri: &str, objname: Option<&str>) -> Result<TuberProxy> {
    resolve_with_session(Arc::new(Session::new(uri)), objname).await
}

/// [`resolve`] over a preconfigured session.
pub async fn resolve_with_session(
    session: Arc<Session>,
    objname: Option<&str>,
) -> Result<TuberProxy> {
    let path = objname.map(ObjectPath::root);
    let mut ctx = Context::new(Arc::clone(&session));
    let handle = ctx.describe(path.as_ref(), true);
    ctx.send(false).await?;
    let meta = handle.result().await?;
    build_resolved(session, path, &meta)
}

impl TuberProxy {
    /// Invoke a resolved method and await its result.
    pub async fn call(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    ) -> Result<Value> {
        // Unknown names fail locally, before anything reaches the wire.
        self.method(method)?;
        let path = self.require_path()?.clone();
        let mut ctx = self.context();
        let handle = ctx.invoke(&path, method, args, kwargs)?;
        ctx.send(false).await?;
        handle.result().await
    }

    /// A fresh batching context on this proxy's session.
    pub fn context(&self) -> Context {
        Context::new(Arc::clone(&self.session))
    }

    /// Discard the cached descriptor and fetch it again.
    pub async fn refresh(&mut self) -> Result<()> {
        let refreshed =
            resolve_with_session(Arc::clone(&self.session), root_name(&self.path)?).await?;
        *self = refreshed;
        Ok(())
    }
}

// -- Serial mode --------------------------------------------------------------

/// Create a resolved local reference to a networked resource, serially.
pub fn resolve_simple(uri: &str, objname: Option<&str>) -> Result<SimpleTuberProxy> {
    resolve_simple_with_session(Arc::new(BlockingSession::new(uri)), objname)
}

/// [`resolve_simple`] over a preconfigured session.
pub fn resolve_simple_with_session(
    session: Arc<BlockingSession>,
    objname: Option<&str>,
) -> Result<SimpleTuberProxy> {
    let path = objname.map(ObjectPath::root);
    let mut ctx = SimpleContext::new(Arc::clone(&session));
    let handle = ctx.describe(path.as_ref(), true);
    ctx.send(false)?;
    let meta = handle.wait()?;
    build_resolved(session, path, &meta)
}

impl SimpleTuberProxy {
    /// Invoke a resolved method and block on its result.
    pub fn call(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    ) -> Result<Value> {
        self.method(method)?;
        let path = self.require_path()?.clone();
        let mut ctx = self.context();
        let handle = ctx.invoke(&path, method, args, kwargs)?;
        ctx.send(false)?;
        handle.wait()
    }

    /// A fresh batching context on this proxy's session.
    pub fn context(&self) -> SimpleContext {
        SimpleContext::new(Arc::clone(&self.session))
    }

    /// Discard the cached descriptor and fetch it again.
    pub fn refresh(&mut self) -> Result<()> {
        let refreshed =
            resolve_simple_with_session(Arc::clone(&self.session), root_name(&self.path)?)?;
        *self = refreshed;
        Ok(())
    }
}

// -- Shared construction ------------------------------------------------------

fn build_resolved<S>(
    session: Arc<S>,
    path: Option<ObjectPath>,
    meta: &Value,
) -> Result<Proxy<S>> {
    // Object describes return a descriptor; a registry describe returns
    // {"objects": {...}}, which parses as a descriptor whose children are
    // the registry roots.
    let descriptor =
        Descriptor::from_value(meta).map_err(|e| ClientError::Protocol(e.to_string()))?;
    Proxy::from_descriptor(session, path, descriptor)
}

fn root_name(path: &Option<ObjectPath>) -> Result<Option<&str>> {
    match path {
        None => Ok(None),
        Some(p) => match p.elements() {
            [only] if only.indices.is_empty() => Ok(Some(only.attr.as_str())),
            _ => Err(ClientError::State(
                "Only registry roots can be re-resolved".into(),
            )),
        },
    }
}
