use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::RoutineId;

/// Name -> value mapping used for locals, globals and scope dictionaries.
pub type Namespace = BTreeMap<String, Value>;

/// A type (class) living in the host's loaded-module registry.
#[derive(Debug, Clone)]
pub struct HostType {
    name: String,
    bases: Vec<Arc<HostType>>,
    methods: HashMap<String, RoutineId>,
}

impl HostType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            methods: HashMap::new(),
        }
    }

    pub fn with_base(mut self, base: Arc<HostType>) -> Self {
        self.bases.push(base);
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, routine: RoutineId) -> Self {
        self.methods.insert(name.into(), routine);
        self
    }

    /// Qualified name, e.g. `django.template.base.Node`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a method, falling back to the base types in declaration order.
    pub fn method(&self, name: &str) -> Option<RoutineId> {
        if let Some(id) = self.methods.get(name) {
            return Some(*id);
        }
        self.bases.iter().find_map(|base| base.method(name))
    }

    pub fn is_subclass_of(&self, other: &HostType) -> bool {
        self.name == other.name || self.bases.iter().any(|base| base.is_subclass_of(other))
    }
}

/// An object owned by the host program, inspected through attribute lookups.
pub trait HostObject: fmt::Debug + Send + Sync {
    fn host_type(&self) -> Arc<HostType>;

    fn attr(&self, name: &str) -> Option<Value>;

    /// The host's string form of the object.
    fn display(&self) -> String;
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(Namespace),
    Object(Arc<dyn HostObject>),
}

impl Value {
    pub fn object(obj: impl HostObject + 'static) -> Self {
        Value::Object(Arc::new(obj))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Namespace> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn HostObject>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Attribute lookup; dictionaries answer with their keys.
    pub fn attr(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(o) => o.attr(name),
            Value::Dict(d) => d.get(name).cloned(),
            _ => None,
        }
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn attr_path(&self, path: &[&str]) -> Option<Value> {
        let mut current = self.clone();
        for name in path {
            current = current.attr(name)?;
        }
        Some(current)
    }

    pub fn is_instance(&self, ty: &HostType) -> bool {
        match self {
            Value::Object(o) => o.host_type().is_subclass_of(ty),
            _ => false,
        }
    }

    /// Host truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Dict(_) => "dict".to_string(),
            Value::Object(o) => o.host_type().name().to_string(),
        }
    }

    /// JSON rendering used when presenting variables.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Float(f) => json!(f),
            Value::Str(s) => json!(s),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Dict(d) => serde_json::Value::Object(
                d.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Object(o) => json!({
                "type": o.host_type().name(),
                "repr": o.display(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Dict(d) => {
                write!(f, "{{")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}': {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Object(o) => write!(f, "{}", o.display()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Namespace> for Value {
    fn from(d: Namespace) -> Self {
        Value::Dict(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Dict(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}
