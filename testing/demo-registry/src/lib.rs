//! Sample exported objects used by the integration tests of both the
//! server and client crates. The registry built by [`demo_registry`]
//! exercises every node kind: typed properties, methods with defaults,
//! warning and failure paths, nested objects, and list/dict containers.

use indexmap::IndexMap;

use tuber_core::object::{Attr, FnMethod, ObjectContainer, TuberObject};
use tuber_core::value::{NdArray, TypedData, Value};
use tuber_core::warnings;
use tuber_core::{Registry, TuberError};

/// An object with no exported attributes at all.
#[derive(Debug)]
pub struct NullObject;

impl TuberObject for NullObject {
    fn type_name(&self) -> &str {
        "NullObject"
    }

    fn attr_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn attr(&self, _name: &str) -> Option<Attr<'_>> {
        None
    }
}

/// Typed properties, and methods that echo them back through default
/// arguments.
#[derive(Debug)]
pub struct Types {
    string_function: FnMethod,
    integer_function: FnMethod,
    float_function: FnMethod,
    list_function: FnMethod,
    dict_function: FnMethod,
}

pub const STRING: &str = "this is a string property";
pub const INTEGER: i64 = 1234;
pub const FLOAT: f64 = 0.1234;

pub fn list_value() -> Value {
    Value::Array(vec![
        Value::Int(1),
        Value::Int(2),
        Value::Int(3),
        Value::Int(4),
    ])
}

pub fn dict_value() -> Value {
    let mut map = IndexMap::new();
    map.insert("1".to_string(), Value::String("2".into()));
    map.insert("3".to_string(), Value::String("4".into()));
    Value::Map(map)
}

fn echo_method(default: Value, signature: &str) -> FnMethod {
    FnMethod::new(move |args, kwargs| {
        if let Some(v) = kwargs.get("arg") {
            return Ok(v.clone());
        }
        Ok(args.first().cloned().unwrap_or_else(|| default.clone()))
    })
    .with_signature(signature)
}

impl Types {
    pub fn new() -> Types {
        Types {
            string_function: echo_method(
                Value::String(STRING.into()),
                "(arg='this is a string property')",
            )
            .with_doc("Return the string argument."),
            integer_function: echo_method(Value::Int(INTEGER), "(arg=1234)"),
            float_function: echo_method(Value::Float(FLOAT), "(arg=0.1234)"),
            list_function: echo_method(list_value(), "(arg=[1, 2, 3, 4])"),
            dict_function: echo_method(dict_value(), "(arg={'1': '2', '3': '4'})"),
        }
    }
}

impl Default for Types {
    fn default() -> Self {
        Types::new()
    }
}

impl TuberObject for Types {
    fn type_name(&self) -> &str {
        "Types"
    }

    fn doc(&self) -> Option<String> {
        Some("Property and argument type fixtures.".into())
    }

    fn attr_names(&self) -> Vec<String> {
        vec![
            "STRING".into(),
            "INTEGER".into(),
            "FLOAT".into(),
            "LIST".into(),
            "DICT".into(),
            "string_function".into(),
            "integer_function".into(),
            "float_function".into(),
            "list_function".into(),
            "dict_function".into(),
        ]
    }

    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        match name {
            "STRING" => Some(Attr::Property(Value::String(STRING.into()))),
            "INTEGER" => Some(Attr::Property(Value::Int(INTEGER))),
            "FLOAT" => Some(Attr::Property(Value::Float(FLOAT))),
            "LIST" => Some(Attr::Property(list_value())),
            "DICT" => Some(Attr::Property(dict_value())),
            "string_function" => Some(Attr::Method(&self.string_function)),
            "integer_function" => Some(Attr::Method(&self.integer_function)),
            "float_function" => Some(Attr::Method(&self.float_function)),
            "list_function" => Some(Attr::Method(&self.list_function)),
            "dict_function" => Some(Attr::Method(&self.dict_function)),
            _ => None,
        }
    }
}

/// Numeric helpers plus the warning and failure paths.
#[derive(Debug)]
pub struct Wrapper {
    increment: FnMethod,
    scale: FnMethod,
    complain: FnMethod,
    explode: FnMethod,
}

impl Wrapper {
    pub fn new() -> Wrapper {
        Wrapper {
            increment: FnMethod::new(|args, _| {
                let items = args
                    .first()
                    .and_then(Value::as_array)
                    .ok_or_else(|| TuberError::Type("increment expects a list".into()))?;
                items
                    .iter()
                    .map(|v| {
                        v.as_int()
                            .map(|i| Value::Int(i + 1))
                            .ok_or_else(|| TuberError::Type("increment expects integers".into()))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            })
            .with_doc("increment(x: list[int])\n\nIncrement every element of a list."),
            scale: FnMethod::new(|args, kwargs| {
                let items = args
                    .first()
                    .and_then(Value::as_array)
                    .ok_or_else(|| TuberError::Type("scale expects a list".into()))?;
                let factor = kwargs
                    .get("factor")
                    .and_then(Value::as_int)
                    .unwrap_or(2);
                Ok(Value::Array(
                    items
                        .iter()
                        .map(|v| Value::Int(v.as_int().unwrap_or(0) * factor))
                        .collect(),
                ))
            })
            .with_signature("(x, factor=2)"),
            complain: FnMethod::new(|_, _| {
                warnings::warn("This is a warning");
                Ok(Value::String("all done".into()))
            })
            .with_doc("Warn and carry on."),
            explode: FnMethod::new(|_, _| {
                warnings::warn("This is a warning");
                Err(TuberError::Runtime("Oops!".into()))
            }),
        }
    }
}

impl Default for Wrapper {
    fn default() -> Self {
        Wrapper::new()
    }
}

impl TuberObject for Wrapper {
    fn type_name(&self) -> &str {
        "Wrapper"
    }

    fn attr_names(&self) -> Vec<String> {
        vec![
            "increment".into(),
            "scale".into(),
            "complain".into(),
            "explode".into(),
        ]
    }

    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        match name {
            "increment" => Some(Attr::Method(&self.increment)),
            "scale" => Some(Attr::Method(&self.scale)),
            "complain" => Some(Attr::Method(&self.complain)),
            "explode" => Some(Attr::Method(&self.explode)),
            _ => None,
        }
    }
}

/// A leaf node held inside containers.
#[derive(Debug)]
pub struct Leaf {
    name: String,
    poke: FnMethod,
}

impl Leaf {
    pub fn new(name: &str) -> Leaf {
        let tag = name.to_string();
        Leaf {
            name: name.to_string(),
            poke: FnMethod::new(move |_, _| Ok(Value::String(format!("poked {tag}"))))
                .with_doc("Prod this leaf and hear back."),
        }
    }
}

impl TuberObject for Leaf {
    fn type_name(&self) -> &str {
        "Leaf"
    }

    fn doc(&self) -> Option<String> {
        Some("A single leaf.".into())
    }

    fn attr_names(&self) -> Vec<String> {
        vec!["name".into(), "poke".into()]
    }

    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        match name {
            "name" => Some(Attr::Property(Value::String(self.name.clone()))),
            "poke" => Some(Attr::Method(&self.poke)),
            _ => None,
        }
    }
}

/// A node with a nested object and a list container of leaves.
#[derive(Debug)]
pub struct Tree {
    trunk: Leaf,
    children: ObjectContainer,
}

impl Tree {
    pub fn new() -> Tree {
        let children: Vec<Box<dyn TuberObject>> = vec![
            Box::new(Leaf::new("first")),
            Box::new(Leaf::new("second")),
            Box::new(Leaf::new("third")),
        ];
        Tree {
            trunk: Leaf::new("trunk"),
            children: ObjectContainer::from_list(children).expect("non-empty container"),
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl TuberObject for Tree {
    fn type_name(&self) -> &str {
        "Tree"
    }

    fn doc(&self) -> Option<String> {
        Some("A tree of pokable leaves.".into())
    }

    fn attr_names(&self) -> Vec<String> {
        vec!["trunk".into(), "children".into()]
    }

    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        match name {
            "trunk" => Some(Attr::Object(&self.trunk)),
            "children" => Some(Attr::Object(&self.children)),
            _ => None,
        }
    }
}

/// An array source for the CBOR typed-array paths.
#[derive(Debug)]
pub struct Arrays {
    linspace: FnMethod,
    total: FnMethod,
}

impl Arrays {
    pub fn new() -> Arrays {
        Arrays {
            linspace: FnMethod::new(|args, _| {
                let n = args.first().and_then(Value::as_int).unwrap_or(4);
                let n = usize::try_from(n)
                    .map_err(|_| TuberError::Value("length must be non-negative".into()))?;
                let data = TypedData::F64((0..n).map(|i| i as f64).collect());
                Ok(Value::NdArray(NdArray::flat(data)))
            })
            .with_signature("(n=4)"),
            total: FnMethod::new(|args, _| {
                let arr = match args.first() {
                    Some(Value::NdArray(arr)) => arr,
                    _ => return Err(TuberError::Type("total expects an array".into())),
                };
                let sum = match arr.data() {
                    TypedData::F64(v) => v.iter().sum::<f64>(),
                    TypedData::F32(v) => v.iter().map(|x| *x as f64).sum(),
                    TypedData::I64(v) => v.iter().map(|x| *x as f64).sum(),
                    TypedData::I32(v) => v.iter().map(|x| *x as f64).sum(),
                    _ => return Err(TuberError::Type("unsupported element type".into())),
                };
                Ok(Value::Float(sum))
            }),
        }
    }

}

impl Default for Arrays {
    fn default() -> Self {
        Arrays::new()
    }
}

impl TuberObject for Arrays {
    fn type_name(&self) -> &str {
        "Arrays"
    }

    fn attr_names(&self) -> Vec<String> {
        vec!["linspace".into(), "total".into()]
    }

    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        match name {
            "linspace" => Some(Attr::Method(&self.linspace)),
            "total" => Some(Attr::Method(&self.total)),
            _ => None,
        }
    }
}

/// Build a dict container of leaves keyed by side.
pub fn leaf_dict() -> ObjectContainer {
    let mut items: IndexMap<String, Box<dyn TuberObject>> = IndexMap::new();
    items.insert("left".into(), Box::new(Leaf::new("left")));
    items.insert("right".into(), Box::new(Leaf::new("right")));
    ObjectContainer::from_dict(items).expect("non-empty container")
}

/// The registry served by the integration tests.
pub fn demo_registry() -> Registry {
    Registry::new()
        .with("NullObject", Box::new(NullObject))
        .with("Types", Box::new(Types::new()))
        .with("Wrapper", Box::new(Wrapper::new()))
        .with("Tree", Box::new(Tree::new()))
        .with("Forest", Box::new(leaf_dict()))
        .with("Arrays", Box::new(Arrays::new()))
}
