use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use super::eval::evaluate_expr;
use super::frame::EngineFrame;
use super::layout::{EngineLayout, EngineShape};
use super::objects::{ContextObject, NodeListObject, NodeObject, TemplateObject};
use crate::error::TemplateError;
use crate::host::{ActivationRecord, EventKind, HostType, LoadedModules, Namespace, Tracer, Value};
use crate::parser::{normalize_newlines, parse_template, Node, NodeKind};

/// Tracer that never stops anything.
#[derive(Debug, Default)]
pub struct NoTrace;

impl Tracer for NoTrace {
    fn trace(&mut self, _frame: &dyn ActivationRecord, _event: EventKind) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// A loaded, parsed template.
#[derive(Debug)]
pub struct Template {
    pub name: String,
    pub path: PathBuf,
    pub nodes: Vec<Node>,
}

/// Small template runtime whose evaluation is visible as activation records.
pub struct Engine {
    dirs: Vec<PathBuf>,
    layout: EngineLayout,
    registry: Arc<LoadedModules>,
    cache: Mutex<HashMap<String, Arc<Template>>>,
}

impl Engine {
    /// Create the engine and register its modules, as importing it would.
    pub fn new(dirs: Vec<PathBuf>, shape: EngineShape) -> Self {
        let registry = Arc::new(LoadedModules::new());
        let engine = Self::with_registry(dirs, shape, registry);
        engine.layout.install(&engine.registry);
        engine
    }

    /// Create the engine without importing it into `registry` yet.
    pub fn with_registry(dirs: Vec<PathBuf>, shape: EngineShape, registry: Arc<LoadedModules>) -> Self {
        Self {
            dirs,
            layout: EngineLayout::new(shape, "/usr/lib/site-packages/django"),
            registry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &EngineLayout {
        &self.layout
    }

    pub fn registry(&self) -> Arc<LoadedModules> {
        self.registry.clone()
    }

    pub fn load(&self, name: &str) -> Result<Arc<Template>, TemplateError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(template) = cache.get(name) {
            return Ok(template.clone());
        }

        let path = self
            .dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
        let source = fs::read_to_string(&path).map_err(|source| TemplateError::Io {
            path: path.clone(),
            source,
        })?;
        let nodes = parse_template(name, &normalize_newlines(&source))?;
        debug!("loaded template {} from {}", name, path.display());

        let template = Arc::new(Template {
            name: name.to_string(),
            path,
            nodes,
        });
        cache.insert(name.to_string(), template.clone());
        Ok(template)
    }

    /// Render `name` with `vars`, called from the host record `caller`.
    pub fn render_to_string(
        &self,
        name: &str,
        vars: Namespace,
        caller: Option<&dyn ActivationRecord>,
        tracer: &mut dyn Tracer,
    ) -> Result<String, TemplateError> {
        let frame = EngineFrame::new(
            self.layout.render_to_string,
            caller,
            self.layout.module_file("template/loader.py"),
            58,
        )
        .with_local("template_name", Value::from(name));
        let mut render = Render {
            engine: self,
            tracer,
            scopes: vec![vars],
            reported: false,
        };
        render.enter(&frame, |render| {
            let template = render.engine.load(name)?;
            render.template(&template, &frame, true)
        })
    }
}

/// State of one top-level render.
struct Render<'e> {
    engine: &'e Engine,
    tracer: &'e mut dyn Tracer,
    scopes: Vec<Namespace>,
    /// Set once the failing node has announced its error.
    reported: bool,
}

impl Render<'_> {
    /// Deliver call/return events around `body`.
    fn enter<T>(
        &mut self,
        frame: &dyn ActivationRecord,
        body: impl FnOnce(&mut Self) -> Result<T, TemplateError>,
    ) -> Result<T, TemplateError> {
        self.event(frame, EventKind::Call)?;
        let result = body(self)?;
        self.event(frame, EventKind::Return)?;
        Ok(result)
    }

    fn event(&mut self, frame: &dyn ActivationRecord, event: EventKind) -> Result<(), TemplateError> {
        match self.tracer.trace(frame, event) {
            ControlFlow::Continue(()) => Ok(()),
            ControlFlow::Break(()) => Err(TemplateError::Aborted),
        }
    }

    fn context_value(&self) -> Value {
        Value::object(ContextObject {
            dicts: self.scopes.clone(),
        })
    }

    /// A top-level render enters through the marker routine; includes reuse
    /// the running render and go straight to `_render`.
    fn template(
        &mut self,
        template: &Template,
        caller: &dyn ActivationRecord,
        top_level: bool,
    ) -> Result<String, TemplateError> {
        let engine = self.engine;
        let layout = &engine.layout;
        let (routine, line) = if top_level {
            (layout.template_render, 203)
        } else {
            (layout.template_inner_render, 190)
        };
        let object = TemplateObject {
            ty: layout.template.clone(),
            name: template.name.clone(),
            origin: template.path.to_string_lossy().into_owned(),
        };
        let frame = EngineFrame::new(
            routine,
            Some(caller),
            layout.module_file("template/base.py"),
            line,
        )
        .with_local("self", Value::object(object))
        .with_local("context", self.context_value());

        self.enter(&frame, |render| render.nodes(&template.nodes, template, &frame))
    }

    fn nodes(
        &mut self,
        nodes: &[Node],
        template: &Template,
        caller: &dyn ActivationRecord,
    ) -> Result<String, TemplateError> {
        let mut out = String::new();
        for node in nodes {
            out.push_str(&self.node(node, template, caller, nodes.len())?);
        }
        Ok(out)
    }

    fn node(
        &mut self,
        node: &Node,
        template: &Template,
        caller: &dyn ActivationRecord,
        siblings: usize,
    ) -> Result<String, TemplateError> {
        let engine = self.engine;
        let layout = &engine.layout;
        if layout.shape == EngineShape::Legacy {
            let list_frame = EngineFrame::new(
                layout.render_node,
                Some(caller),
                layout.module_file("template/debug.py"),
                78,
            )
            .with_local(
                "self",
                Value::object(NodeListObject {
                    ty: layout.node_list.clone(),
                    len: siblings,
                }),
            )
            .with_local("node", self.node_value(node, template))
            .with_local("context", self.context_value());

            return self.enter(&list_frame, |render| {
                let result = render.node_body(node, template, &list_frame);
                if render.needs_report(&result) {
                    render.reported = true;
                    render.event(&list_frame, EventKind::Exception)?;
                }
                result
            });
        }
        self.node_body(node, template, caller)
    }

    fn node_value(&self, node: &Node, template: &Template) -> Value {
        Value::object(NodeObject {
            ty: self.node_type(node),
            origin: template.path.to_string_lossy().into_owned(),
            position: node.position,
            style: self.engine.layout.shape.source_style(),
            description: node.describe(),
        })
    }

    fn node_type(&self, node: &Node) -> Arc<HostType> {
        let layout = &self.engine.layout;
        match node.kind {
            NodeKind::Text(_) => layout.text_node.clone(),
            NodeKind::Variable(_) => layout.variable_node.clone(),
            NodeKind::If { .. } => layout.if_node.clone(),
            NodeKind::For { .. } => layout.for_node.clone(),
            NodeKind::Include { .. } => layout.include_node.clone(),
        }
    }

    fn node_file(&self, node: &Node) -> PathBuf {
        let relative = match node.kind {
            NodeKind::Text(_) | NodeKind::Variable(_) => "template/base.py",
            NodeKind::If { .. } | NodeKind::For { .. } => "template/defaulttags.py",
            NodeKind::Include { .. } => "template/loader_tags.py",
        };
        self.engine.layout.module_file(relative)
    }

    fn node_body(
        &mut self,
        node: &Node,
        template: &Template,
        caller: &dyn ActivationRecord,
    ) -> Result<String, TemplateError> {
        let ty = self.node_type(node);
        let frame = EngineFrame::new(
            self.engine.layout.node_render(&ty),
            Some(caller),
            self.node_file(node),
            1,
        )
        .with_local("self", self.node_value(node, template))
        .with_local("context", self.context_value());

        self.enter(&frame, |render| {
            let result = render.evaluate(node, template, &frame);
            if render.engine.layout.shape == EngineShape::Modern && render.needs_report(&result) {
                render.reported = true;
                render.report_exception(template, &frame)?;
            }
            result
        })
    }

    /// Only the innermost failing node reports; aborts are never reported.
    fn needs_report<T>(&self, result: &Result<T, TemplateError>) -> bool {
        match result {
            Err(TemplateError::Aborted) | Ok(_) => false,
            Err(_) => !self.reported,
        }
    }

    /// Engines of the modern shape collect error context through a dedicated
    /// call made from the failing node's render.
    fn report_exception(&mut self, template: &Template, node_frame: &dyn ActivationRecord) -> Result<(), TemplateError> {
        let engine = self.engine;
        let layout = &engine.layout;
        let frame = EngineFrame::new(
            layout.exception_info,
            Some(node_frame),
            layout.module_file("template/base.py"),
            312,
        )
        .with_local(
            "self",
            Value::object(TemplateObject {
                ty: layout.template.clone(),
                name: template.name.clone(),
                origin: template.path.to_string_lossy().into_owned(),
            }),
        );
        self.event(&frame, EventKind::Call)?;
        self.event(&frame, EventKind::Exception)?;
        self.event(&frame, EventKind::Return)
    }

    fn evaluate(
        &mut self,
        node: &Node,
        template: &Template,
        frame: &dyn ActivationRecord,
    ) -> Result<String, TemplateError> {
        match &node.kind {
            NodeKind::Text(text) => Ok(text.clone()),
            NodeKind::Variable(expr) => Ok(self
                .resolve(expr)
                .filter(|v| !v.is_none())
                .map(|v| v.to_string())
                .unwrap_or_default()),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let truthy = self.resolve(condition).is_some_and(|v| v.is_truthy());
                let branch = if truthy { then_branch } else { else_branch };
                self.nodes(branch, template, frame)
            }
            NodeKind::For {
                target,
                iterable,
                body,
            } => {
                let items = match self.resolve(iterable) {
                    Some(Value::List(items)) => items,
                    _ => Vec::new(),
                };
                let mut out = String::new();
                for item in items {
                    let mut scope = Namespace::new();
                    scope.insert(target.clone(), item);
                    self.scopes.push(scope);
                    let rendered = self.nodes(body, template, frame);
                    self.scopes.pop();
                    out.push_str(&rendered?);
                }
                Ok(out)
            }
            NodeKind::Include {
                template: name,
                bindings,
            } => {
                let included = self.engine.load(name)?;
                let mut scope = Namespace::new();
                for (key, expr) in bindings {
                    scope.insert(key.clone(), self.resolve(expr).unwrap_or(Value::None));
                }
                self.scopes.push(scope);
                let rendered = self.template(&included, frame, false);
                self.scopes.pop();
                rendered
            }
        }
    }

    /// Variable lookup; missing names render as nothing, like the engine does.
    fn resolve(&self, expr: &str) -> Option<Value> {
        let lookup = |name: &str| self.scopes.iter().rev().find_map(|scope| scope.get(name).cloned());
        match evaluate_expr(expr, lookup) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("could not resolve '{}': {}", expr, e);
                None
            }
        }
    }
}
