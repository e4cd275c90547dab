use crate::debugger::{ExecMode, HostEvaluator};
use crate::error::EvalError;
use crate::host::{Namespace, Value};

/// Evaluator for the demo host: literals, dotted lookups and `name = expr`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleEvaluator;

impl SimpleEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl HostEvaluator for SimpleEvaluator {
    fn eval(
        &self,
        expr: &str,
        globals: &Namespace,
        locals: &mut Namespace,
    ) -> Result<Value, EvalError> {
        evaluate_expr(expr, |name| {
            locals.get(name).or_else(|| globals.get(name)).cloned()
        })
    }

    fn exec(
        &self,
        source: &str,
        mode: ExecMode,
        globals: &Namespace,
        locals: &mut Namespace,
    ) -> Result<(), EvalError> {
        let statements: Vec<&str> = match mode {
            ExecMode::Single => vec![source.trim()],
            ExecMode::Block => source.lines().map(str::trim).collect(),
        };

        for statement in statements.into_iter().filter(|s| !s.is_empty()) {
            match split_assignment(statement) {
                Some((name, expr)) => {
                    let value = self.eval(expr, globals, locals)?;
                    locals.insert(name.to_string(), value);
                }
                None => {
                    self.eval(statement, globals, locals)?;
                }
            }
        }
        Ok(())
    }
}

/// Evaluate a literal or dotted name using `lookup` for the first segment.
pub fn evaluate_expr<F>(expr: &str, lookup: F) -> Result<Value, EvalError>
where
    F: Fn(&str) -> Option<Value>,
{
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(EvalError::Syntax("empty expression".to_string()));
    }
    if let Some(literal) = parse_literal(expr)? {
        return Ok(literal);
    }

    let mut segments = expr.split('.');
    let head = segments.next().unwrap_or_default();
    if !is_identifier(head) {
        return Err(EvalError::Syntax(expr.to_string()));
    }
    let mut value = lookup(head).ok_or_else(|| EvalError::UndefinedName(head.to_string()))?;

    for segment in segments {
        value = lookup_segment(&value, segment)?;
    }
    Ok(value)
}

fn lookup_segment(value: &Value, segment: &str) -> Result<Value, EvalError> {
    if let Ok(index) = segment.parse::<usize>() {
        if let Some(items) = value.as_list() {
            return items
                .get(index)
                .cloned()
                .ok_or_else(|| EvalError::Type(format!("list index {} out of range", index)));
        }
    }
    if !is_identifier(segment) {
        return Err(EvalError::Syntax(segment.to_string()));
    }
    value.attr(segment).ok_or_else(|| EvalError::Attribute {
        type_name: value.type_name(),
        attr: segment.to_string(),
    })
}

fn parse_literal(expr: &str) -> Result<Option<Value>, EvalError> {
    match expr {
        "None" => return Ok(Some(Value::None)),
        "True" => return Ok(Some(Value::Bool(true))),
        "False" => return Ok(Some(Value::Bool(false))),
        _ => {}
    }

    for quote in ['"', '\''] {
        if expr.starts_with(quote) {
            return match expr[1..].strip_suffix(quote) {
                Some(inner) if !inner.contains(quote) => Ok(Some(Value::from(inner))),
                _ => Err(EvalError::Syntax(format!("unterminated string {}", expr))),
            };
        }
    }

    if expr.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        if let Ok(i) = expr.parse::<i64>() {
            return Ok(Some(Value::Int(i)));
        }
        if let Ok(f) = expr.parse::<f64>() {
            return Ok(Some(Value::Float(f)));
        }
        return Err(EvalError::Syntax(expr.to_string()));
    }
    Ok(None)
}

fn split_assignment(statement: &str) -> Option<(&str, &str)> {
    let (name, expr) = statement.split_once('=')?;
    let name = name.trim();
    if expr.starts_with('=') || !is_identifier(name) {
        return None;
    }
    Some((name, expr))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
