//! Template-level debugging for template engines running inside a host
//! interpreter: frame classification, stepping decisions, translation of
//! node evaluations to template source locations, recursion-collapsing stack
//! views, step-out targets and evaluation in a paused template scope.

pub mod config;
pub mod debugger;
pub mod error;
pub mod executor;
pub mod extensions;
pub mod host;
pub mod parser;
