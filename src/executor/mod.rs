//! A small template engine whose rendering runs as host activation records,
//! used to drive the bridge end to end.

mod eval;
mod frame;
mod layout;
mod objects;
mod runner;

pub use eval::{evaluate_expr, SimpleEvaluator};
pub use frame::EngineFrame;
pub use layout::{EngineLayout, EngineShape};
pub use objects::{
    ContextObject, LazyTextObject, NodeListObject, NodeObject, OriginObject, SourceStyle,
    TemplateObject, TokenObject,
};
pub use runner::{Engine, NoTrace, Template};
