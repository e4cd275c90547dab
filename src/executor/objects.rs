//! Host objects the demo engine places in its activation records.

use std::sync::Arc;

use crate::host::{HostObject, HostType, Namespace, Value};
use crate::parser::Position;

#[derive(Debug, Clone)]
pub struct OriginObject {
    pub name: String,
}

impl HostObject for OriginObject {
    fn host_type(&self) -> Arc<HostType> {
        Arc::new(HostType::new("django.template.base.Origin"))
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            _ => None,
        }
    }

    fn display(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone)]
pub struct TokenObject {
    pub position: Position,
}

impl HostObject for TokenObject {
    fn host_type(&self) -> Arc<HostType> {
        Arc::new(HostType::new("django.template.base.Token"))
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "position" => Some(position_value(self.position)),
            _ => None,
        }
    }

    fn display(&self) -> String {
        format!("<Token {:?}>", self.position)
    }
}

/// How a node records where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStyle {
    /// `node.token.position` plus `node.origin`
    Token,
    /// `node.source == (origin, (start, end))`
    Legacy,
}

#[derive(Debug, Clone)]
pub struct NodeObject {
    pub ty: Arc<HostType>,
    pub origin: String,
    pub position: Position,
    pub style: SourceStyle,
    pub description: String,
}

impl HostObject for NodeObject {
    fn host_type(&self) -> Arc<HostType> {
        self.ty.clone()
    }

    fn attr(&self, name: &str) -> Option<Value> {
        let origin = || {
            Value::object(OriginObject {
                name: self.origin.clone(),
            })
        };
        match (self.style, name) {
            (SourceStyle::Token, "token") => Some(Value::object(TokenObject {
                position: self.position,
            })),
            (SourceStyle::Token, "origin") => Some(origin()),
            (SourceStyle::Legacy, "source") => {
                Some(Value::List(vec![origin(), position_value(self.position)]))
            }
            _ => None,
        }
    }

    fn display(&self) -> String {
        self.description.clone()
    }
}

#[derive(Debug, Clone)]
pub struct TemplateObject {
    pub ty: Arc<HostType>,
    pub name: String,
    pub origin: String,
}

impl HostObject for TemplateObject {
    fn host_type(&self) -> Arc<HostType> {
        self.ty.clone()
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            "origin" => Some(Value::object(OriginObject {
                name: self.origin.clone(),
            })),
            _ => None,
        }
    }

    fn display(&self) -> String {
        format!("<Template: {}>", self.name)
    }
}

/// Snapshot of the render context's scope chain, outermost first.
#[derive(Debug, Clone)]
pub struct ContextObject {
    pub dicts: Vec<Namespace>,
}

impl HostObject for ContextObject {
    fn host_type(&self) -> Arc<HostType> {
        Arc::new(HostType::new("django.template.context.Context"))
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "dicts" => Some(Value::List(
                self.dicts.iter().cloned().map(Value::Dict).collect(),
            )),
            _ => None,
        }
    }

    fn display(&self) -> String {
        format!("<Context: {} scopes>", self.dicts.len())
    }
}

/// The node list renderer of engines that report errors per node.
#[derive(Debug, Clone)]
pub struct NodeListObject {
    pub ty: Arc<HostType>,
    pub len: usize,
}

impl HostObject for NodeListObject {
    fn host_type(&self) -> Arc<HostType> {
        self.ty.clone()
    }

    fn attr(&self, _name: &str) -> Option<Value> {
        None
    }

    fn display(&self) -> String {
        format!("<NodeList: {} nodes>", self.len)
    }
}

/// Lazily translated text; shown to the user as its rendered string.
#[derive(Debug, Clone)]
pub struct LazyTextObject {
    pub text: String,
}

impl HostObject for LazyTextObject {
    fn host_type(&self) -> Arc<HostType> {
        Arc::new(HostType::new("django.utils.functional.__proxy__"))
    }

    fn attr(&self, _name: &str) -> Option<Value> {
        None
    }

    fn display(&self) -> String {
        self.text.clone()
    }
}

fn position_value((start, end): Position) -> Value {
    Value::List(vec![Value::Int(start as i64), Value::Int(end as i64)])
}
