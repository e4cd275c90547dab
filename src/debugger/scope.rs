use log::debug;

use crate::error::EvalError;
use crate::host::{ActivationRecord, Namespace, Value};

/// How a statement should be compiled by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// One interactive statement; expression results are echoed
    Single,
    /// A block of statements
    Block,
}

impl ExecMode {
    pub fn for_source(source: &str) -> Self {
        let trimmed = source.trim();
        if trimmed.contains('\n') || trimmed.contains('\r') {
            ExecMode::Block
        } else {
            ExecMode::Single
        }
    }
}

/// The host language's evaluator, used for expressions typed while paused.
pub trait HostEvaluator {
    fn eval(&self, expr: &str, globals: &Namespace, locals: &mut Namespace)
        -> Result<Value, EvalError>;

    fn exec(
        &self,
        source: &str,
        mode: ExecMode,
        globals: &Namespace,
        locals: &mut Namespace,
    ) -> Result<(), EvalError>;
}

/// Flatten the template context's scope chain; later dictionaries win.
pub fn template_locals(frame: &dyn ActivationRecord) -> Namespace {
    let mut locals = Namespace::new();
    let Some(dicts) = frame.local("context").and_then(|c| c.attr("dicts")) else {
        debug!("frame has no template context");
        return locals;
    };
    let Some(dicts) = dicts.as_list() else {
        return locals;
    };

    for scope in dicts {
        if let Some(scope) = scope.as_dict() {
            locals.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    for value in locals.values_mut() {
        if is_lazy_text(value) {
            *value = Value::Str(value.to_string());
        }
    }
    locals
}

/// Lazily translated strings are shown as their text.
fn is_lazy_text(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|o| o.host_type().name().contains("__proxy__"))
}

pub fn evaluate(
    evaluator: &dyn HostEvaluator,
    expr: &str,
    frame: &dyn ActivationRecord,
) -> Result<Value, EvalError> {
    let mut locals = template_locals(frame);
    evaluator.eval(expr, &frame.globals(), &mut locals)
}

pub fn execute(
    evaluator: &dyn HostEvaluator,
    source: &str,
    frame: &dyn ActivationRecord,
) -> Result<(), EvalError> {
    let mut locals = template_locals(frame);
    let mode = ExecMode::for_source(source);
    evaluator.exec(&format!("{}\n", source), mode, &frame.globals(), &mut locals)
}
