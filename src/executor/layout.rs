use std::path::PathBuf;
use std::sync::Arc;

use super::objects::SourceStyle;
use crate::host::{HostModule, HostType, LoadedModules, Member, RoutineId};

/// Which engine generation the demo runtime imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineShape {
    /// Nodes carry `token`/`origin`; errors go through `Template.get_exception_info`
    Modern,
    /// Nodes carry `source`; every node is rendered through `DebugNodeList.render_node`
    Legacy,
}

impl EngineShape {
    pub fn source_style(self) -> SourceStyle {
        match self {
            EngineShape::Modern => SourceStyle::Token,
            EngineShape::Legacy => SourceStyle::Legacy,
        }
    }
}

/// Routine ids and types of the demo engine, laid out like the default
/// engine profile so the bridge finds them by name.
#[derive(Debug, Clone)]
pub struct EngineLayout {
    pub shape: EngineShape,
    pub install_dir: PathBuf,

    pub node: Arc<HostType>,
    pub text_node: Arc<HostType>,
    pub variable_node: Arc<HostType>,
    pub if_node: Arc<HostType>,
    pub for_node: Arc<HostType>,
    pub include_node: Arc<HostType>,
    pub template: Arc<HostType>,
    pub node_list: Arc<HostType>,

    pub template_render: RoutineId,
    pub template_inner_render: RoutineId,
    pub exception_info: RoutineId,
    pub render_node: RoutineId,
    pub render_to_string: RoutineId,
}

impl EngineLayout {
    pub fn new(shape: EngineShape, install_dir: impl Into<PathBuf>) -> Self {
        let node = Arc::new(
            HostType::new("django.template.base.Node").with_method("render", RoutineId::fresh()),
        );
        let subclass = |name: &str| {
            Arc::new(
                HostType::new(name)
                    .with_base(node.clone())
                    .with_method("render", RoutineId::fresh()),
            )
        };
        let text_node = subclass("django.template.base.TextNode");
        let variable_node = subclass("django.template.base.VariableNode");
        let if_node = subclass("django.template.defaulttags.IfNode");
        let for_node = subclass("django.template.defaulttags.ForNode");
        let include_node = subclass("django.template.loader_tags.IncludeNode");

        let template_render = RoutineId::fresh();
        let template_inner_render = RoutineId::fresh();
        let exception_info = RoutineId::fresh();
        let mut template = HostType::new("django.template.base.Template")
            .with_method("render", template_render)
            .with_method("_render", template_inner_render);
        if shape == EngineShape::Modern {
            template = template.with_method("get_exception_info", exception_info);
        }

        let render_node = RoutineId::fresh();
        let node_list = Arc::new(
            HostType::new("django.template.debug.DebugNodeList")
                .with_method("render_node", render_node),
        );

        Self {
            shape,
            install_dir: install_dir.into(),
            node,
            text_node,
            variable_node,
            if_node,
            for_node,
            include_node,
            template: Arc::new(template),
            node_list,
            template_render,
            template_inner_render,
            exception_info,
            render_node,
            render_to_string: RoutineId::fresh(),
        }
    }

    /// Host source file a module of the engine lives in.
    pub fn module_file(&self, relative: &str) -> PathBuf {
        self.install_dir.join(relative)
    }

    pub fn node_render(&self, ty: &HostType) -> RoutineId {
        ty.method("render")
            .unwrap_or_else(|| self.node.method("render").unwrap_or(self.template_render))
    }

    /// Every module the engine imports, in import order.
    pub fn modules(&self) -> Vec<HostModule> {
        let mut modules = vec![
            HostModule::new("django.template.base")
                .with_file(self.module_file("template/base.py"))
                .with_type(self.node.clone())
                .with_type(self.text_node.clone())
                .with_type(self.variable_node.clone())
                .with_type(self.template.clone()),
            HostModule::new("django.template.defaulttags")
                .with_file(self.module_file("template/defaulttags.py"))
                .with_type(self.if_node.clone())
                .with_type(self.for_node.clone()),
            HostModule::new("django.template.loader_tags")
                .with_file(self.module_file("template/loader_tags.py"))
                .with_type(self.include_node.clone()),
            HostModule::new("django.template.loader")
                .with_file(self.module_file("template/loader.py"))
                .with_member("render_to_string", Member::Routine(self.render_to_string)),
        ];
        if self.shape == EngineShape::Legacy {
            modules.push(
                HostModule::new("django.template.debug")
                    .with_file(self.module_file("template/debug.py"))
                    .with_type(self.node_list.clone()),
            );
        }
        modules.push(
            HostModule::new("django.template")
                .with_file(self.module_file("template/__init__.py"))
                .with_type(self.node.clone())
                .with_type(self.template.clone()),
        );
        modules
    }

    /// Register every module, as a fully imported engine would.
    pub fn install(&self, registry: &LoadedModules) {
        for module in self.modules() {
            registry.insert(module);
        }
    }

    /// Register only the named modules, as during a partial import.
    pub fn install_only(&self, registry: &LoadedModules, names: &[&str]) {
        for module in self.modules() {
            if names.contains(&module.name()) {
                registry.insert(module);
            }
        }
    }
}
