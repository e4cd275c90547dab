use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::*;
use crate::config::BridgeConfig;
use crate::error::EvalError;
use crate::executor::{
    ContextObject, EngineFrame, EngineLayout, EngineShape, LazyTextObject, NodeObject,
    SimpleEvaluator, TemplateObject,
};
use crate::host::{ActivationRecord, EventKind, HostType, LoadedModules, Namespace, RoutineId, Value};

const INSTALL_DIR: &str = "/opt/site-packages/django";

fn bridge_over(registry: Arc<LoadedModules>) -> TemplateBridge {
    TemplateBridge::new(registry, BridgeConfig::default(), Arc::new(SimpleEvaluator::new()))
}

fn installed(shape: EngineShape) -> (EngineLayout, TemplateBridge) {
    let layout = EngineLayout::new(shape, INSTALL_DIR);
    let registry = Arc::new(LoadedModules::new());
    layout.install(&registry);
    (layout, bridge_over(registry))
}

fn template_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn scope(pairs: &[(&str, Value)]) -> Namespace {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn context(dicts: Vec<Namespace>) -> Value {
    Value::object(ContextObject { dicts })
}

fn node_frame<'a>(
    layout: &EngineLayout,
    ty: &Arc<HostType>,
    origin: &Path,
    position: (usize, usize),
    caller: Option<&'a dyn ActivationRecord>,
) -> EngineFrame<'a> {
    let node = NodeObject {
        ty: ty.clone(),
        origin: origin.to_string_lossy().into_owned(),
        position,
        style: layout.shape.source_style(),
        description: "<Variable Node: name>".to_string(),
    };
    EngineFrame::new(
        layout.node_render(ty),
        caller,
        layout.module_file("template/base.py"),
        1,
    )
    .with_local("self", Value::object(node))
    .with_local("context", context(vec![scope(&[("name", Value::from("ada"))])]))
}

/// Record that stands for a template file purely through a `file` local.
fn tagged<'a>(
    routine: RoutineId,
    file: Option<&str>,
    line: u32,
    caller: Option<&'a dyn ActivationRecord>,
) -> EngineFrame<'a> {
    let frame = EngineFrame::new(routine, caller, "/app/views.py", line);
    match file {
        Some(file) => frame.with_local("file", Value::from(file)),
        None => frame,
    }
}

fn tagged_file(frame: &dyn ActivationRecord) -> Option<PathBuf> {
    frame
        .local("file")
        .and_then(|v| v.as_str().map(PathBuf::from))
}

#[test]
fn test_nothing_is_classified_before_the_engine_is_imported() {
    let registry = Arc::new(LoadedModules::new());
    let bridge = bridge_over(registry.clone());

    assert!(bridge.marker_frames().is_empty());
    assert!(bridge.sub_language_frames().is_empty());
    assert!(bridge.exception_binding().is_none());
    assert!(bridge.module_path_rules().is_empty());
    assert!(bridge.cache().known_exception_binding().is_none());

    let layout = EngineLayout::new(EngineShape::Modern, INSTALL_DIR);
    layout.install(&registry);
    assert!(bridge.marker_frames().contains(&layout.template_render));
    assert!(bridge.exception_binding().is_some());
}

#[test]
fn test_sub_language_frames_grow_as_modules_load() {
    let layout = EngineLayout::new(EngineShape::Modern, INSTALL_DIR);
    let registry = Arc::new(LoadedModules::new());
    layout.install_only(&registry, &["django.template", "django.template.base"]);
    let bridge = bridge_over(registry.clone());

    let early = bridge.sub_language_frames();
    assert!(early.contains(&layout.node_render(&layout.text_node)));
    assert!(early.contains(&layout.node_render(&layout.variable_node)));
    assert!(early.contains(&layout.exception_info));
    assert!(!early.contains(&layout.node_render(&layout.if_node)));
    assert!(!early.contains(&layout.template_render));
    assert_eq!(bridge.sub_language_frames(), early);

    layout.install(&registry);
    let late = bridge.sub_language_frames();
    assert!(late.is_superset(&early));
    assert!(late.contains(&layout.node_render(&layout.if_node)));
    assert!(late.contains(&layout.node_render(&layout.include_node)));
    assert!(!late.contains(&layout.template_inner_render));
}

#[test]
fn test_markers_are_only_the_template_entry_point() {
    let (layout, bridge) = installed(EngineShape::Modern);
    let markers = bridge.marker_frames();
    assert_eq!(markers.len(), 1);
    assert!(markers.contains(&layout.template_render));
}

#[test]
fn test_should_stop_on_node_calls_only_when_stepping() {
    let (layout, bridge) = installed(EngineShape::Modern);
    let file = template_file("{{ name }}");
    let frame = node_frame(&layout, &layout.variable_node, file.path(), (0, 10), None);

    assert!(bridge.should_stop(&frame, EventKind::Call, StepAction::StepInto));
    assert!(bridge.should_stop(&frame, EventKind::Call, StepAction::StepOver));
    assert!(!bridge.should_stop(&frame, EventKind::Call, StepAction::RunFree));
    assert!(!bridge.should_stop(&frame, EventKind::Call, StepAction::StepOut));

    for action in [StepAction::RunFree, StepAction::StepInto, StepAction::StepOver, StepAction::StepOut] {
        assert!(!bridge.should_stop(&frame, EventKind::Line, action));
        assert!(!bridge.should_stop(&frame, EventKind::Return, action));
        assert!(!bridge.should_stop(&frame, EventKind::Exception, action));
    }
}

#[test]
fn test_should_stop_on_reported_exceptions_only() {
    let (layout, bridge) = installed(EngineShape::Modern);
    let file = template_file("{% include \"missing.tmpl\" %}");
    let node = node_frame(&layout, &layout.include_node, file.path(), (0, 28), None);
    let report = EngineFrame::new(
        layout.exception_info,
        Some(&node),
        layout.module_file("template/base.py"),
        312,
    );

    for action in [StepAction::RunFree, StepAction::StepInto, StepAction::StepOver, StepAction::StepOut] {
        assert!(bridge.should_stop(&report, EventKind::Exception, action));
        assert!(!bridge.should_stop(&report, EventKind::Call, action));
        assert!(!bridge.should_stop(&report, EventKind::Return, action));
    }
    assert_eq!(bridge.classifier().kind(&report), FrameKind::ExceptionReport);
}

#[test]
fn test_modern_exception_frame_translates_to_the_failing_node() {
    let (layout, bridge) = installed(EngineShape::Modern);
    let file = template_file("<p>\n{% include \"missing.tmpl\" %}\n</p>");
    let node = node_frame(&layout, &layout.include_node, file.path(), (4, 32), None);
    let report = EngineFrame::new(
        layout.exception_info,
        Some(&node),
        layout.module_file("template/base.py"),
        312,
    )
    .with_local(
        "self",
        Value::object(TemplateObject {
            ty: layout.template.clone(),
            name: "page.tmpl".to_string(),
            origin: file.path().to_string_lossy().into_owned(),
        }),
    );

    let binding = bridge.exception_binding().unwrap();
    assert_eq!(binding.name(), "modern exception info");
    assert!(matches!(binding.shape(), ExceptionShape::EnclosingNode { .. }));

    let vf = bridge.translate(&report, false).unwrap();
    assert_eq!(vf.filename, file.path());
    assert_eq!(vf.location, Location::Line(2));
    assert_eq!(vf.source_snippet, "{% include \"missing.tmpl\" %}");
}

#[test]
fn test_legacy_node_list_shape_reads_node_local() {
    let (layout, bridge) = installed(EngineShape::Legacy);
    let file = template_file("Hello {{ name }}");
    let node = NodeObject {
        ty: layout.variable_node.clone(),
        origin: file.path().to_string_lossy().into_owned(),
        position: (6, 16),
        style: layout.shape.source_style(),
        description: "<Variable Node: name>".to_string(),
    };
    let render_node = EngineFrame::new(
        layout.render_node,
        None,
        layout.module_file("template/debug.py"),
        78,
    )
    .with_local("node", Value::object(node));

    let binding = bridge.exception_binding().unwrap();
    assert_eq!(binding.name(), "legacy node list");
    assert_eq!(binding.routine(), layout.render_node);

    let vf = bridge.translate(&render_node, true).unwrap();
    assert_eq!(vf.location, Location::Span { start: 6, end: 16 });
    assert_eq!(vf.source_snippet, "{{ name }}");
    assert_eq!(vf.display_name, "<Variable Node: name>");
    assert!(bridge.should_stop(&render_node, EventKind::Exception, StepAction::RunFree));
}

#[test]
fn test_failed_probe_is_retried() {
    let layout = EngineLayout::new(EngineShape::Legacy, INSTALL_DIR);
    let registry = Arc::new(LoadedModules::new());
    layout.install_only(&registry, &["django.template", "django.template.base"]);
    let bridge = bridge_over(registry.clone());

    assert!(bridge.exception_binding().is_none());
    layout.install(&registry);
    assert_eq!(bridge.exception_binding().unwrap().routine(), layout.render_node);
}

#[test]
fn test_node_translation_uses_token_positions() {
    let (layout, bridge) = installed(EngineShape::Modern);
    let file = template_file("Hello\n{{ name }}\n");
    let frame = node_frame(&layout, &layout.variable_node, file.path(), (6, 16), None);

    let vf = bridge.translate(&frame, true).unwrap();
    assert_eq!(vf.location, Location::Span { start: 6, end: 16 });
    assert_eq!(vf.display_name, "<Variable Node: name>");

    let vf = bridge.translate(&frame, false).unwrap();
    assert_eq!(vf.location, Location::Line(2));
    assert_eq!(vf.source_snippet, "{{ name }}");
}

#[test]
fn test_missing_origin_falls_back_to_enclosing_template() {
    let (layout, bridge) = installed(EngineShape::Modern);
    let file = template_file("{{ name }}");
    let marker = EngineFrame::new(
        layout.template_render,
        None,
        layout.module_file("template/base.py"),
        203,
    )
    .with_local(
        "self",
        Value::object(TemplateObject {
            ty: layout.template.clone(),
            name: "base.tmpl".to_string(),
            origin: file.path().to_string_lossy().into_owned(),
        }),
    );
    let gone = Path::new("/nonexistent/child.tmpl");

    let frame = node_frame(&layout, &layout.variable_node, gone, (0, 10), Some(&marker));
    let vf = bridge.translate(&frame, false).unwrap();
    assert_eq!(vf.filename, file.path());

    let orphan = node_frame(&layout, &layout.variable_node, gone, (0, 10), None);
    assert!(bridge.translate(&orphan, false).is_none());
}

#[test]
fn test_case_insensitive_paths_are_lowercased() {
    let layout = EngineLayout::new(EngineShape::Legacy, INSTALL_DIR);
    let registry = Arc::new(LoadedModules::new());
    layout.install(&registry);
    let mut config = BridgeConfig::default();
    config.paths.case_insensitive = Some(true);
    let bridge = TemplateBridge::new(registry, config, Arc::new(SimpleEvaluator::new()));

    let frame = node_frame(
        &layout,
        &layout.variable_node,
        Path::new("/Templates/Page.TMPL"),
        (0, 10),
        None,
    );
    let location = bridge.locate(&frame).unwrap();
    assert_eq!(location.filename, PathBuf::from("/templates/page.tmpl"));
}

#[test]
fn test_innermost_of_same_file_frames_is_visible() {
    let routine = RoutineId::new(1);
    let markers = Default::default();
    let f2 = tagged(routine, Some("a.tmpl"), 3, None);
    let f1 = tagged(routine, Some("a.tmpl"), 2, Some(&f2));
    let f0 = tagged(routine, Some("a.tmpl"), 1, Some(&f1));
    let stack: Vec<&dyn ActivationRecord> = vec![&f0, &f1, &f2];

    assert!(is_visible(&stack, 0, &markers, tagged_file));
    assert!(!is_visible(&stack, 1, &markers, tagged_file));
    assert!(!is_visible(&stack, 2, &markers, tagged_file));
}

#[test]
fn test_marker_boundary_keeps_both_sides_visible() {
    let node = RoutineId::new(1);
    let marker = RoutineId::new(2);
    let markers = [marker].into_iter().collect();
    let f2 = tagged(node, Some("a.tmpl"), 3, None);
    let f1 = tagged(marker, None, 2, Some(&f2));
    let f0 = tagged(node, Some("a.tmpl"), 1, Some(&f1));
    let stack: Vec<&dyn ActivationRecord> = vec![&f0, &f1, &f2];

    assert!(is_visible(&stack, 0, &markers, tagged_file));
    assert!(is_visible(&stack, 2, &markers, tagged_file));
}

#[test]
fn test_untranslatable_frames_are_skipped_or_hidden() {
    let node = RoutineId::new(1);
    let host = RoutineId::new(3);
    let markers = Default::default();
    let f2 = tagged(node, Some("a.tmpl"), 3, None);
    let f1 = tagged(host, None, 2, Some(&f2));
    let f0 = tagged(node, Some("a.tmpl"), 1, Some(&f1));
    let stack: Vec<&dyn ActivationRecord> = vec![&f0, &f1, &f2];

    assert!(!is_visible(&stack, 1, &markers, tagged_file));
    assert!(!is_visible(&stack, 2, &markers, tagged_file));
    assert!(!is_visible(&stack, 3, &markers, tagged_file));
}

#[test]
fn test_step_out_lands_above_first_marker_of_another_file() {
    let node = RoutineId::new(1);
    let marker = RoutineId::new(2);
    let markers = [marker].into_iter().collect();
    let host = tagged(RoutineId::new(3), None, 40, None);
    let outer = tagged(marker, Some("b.tmpl"), 30, Some(&host));
    let inner = tagged(marker, Some("a.tmpl"), 20, Some(&outer));
    let frame = tagged(node, Some("a.tmpl"), 10, Some(&inner));

    let target = step_out_target(&frame, true, &markers, tagged_file).unwrap();
    assert_eq!(target.source_line(), 40);
}

#[test]
fn test_step_out_walks_past_unready_markers() {
    let node = RoutineId::new(1);
    let marker = RoutineId::new(2);
    let markers = [marker].into_iter().collect();
    let host = tagged(RoutineId::new(3), None, 40, None);
    let outer = tagged(marker, None, 30, Some(&host));
    let inner = tagged(marker, Some("a.tmpl"), 20, Some(&outer));
    let frame = tagged(node, Some("a.tmpl"), 10, Some(&inner));

    // No marker names another file: fall out past the last marker.
    let target = step_out_target(&frame, true, &markers, tagged_file).unwrap();
    assert_eq!(target.source_line(), 40);

    // A frame that does not translate differs from any translatable marker.
    let lost = tagged(node, None, 11, Some(&inner));
    let target = step_out_target(&lost, true, &markers, tagged_file).unwrap();
    assert_eq!(target.source_line(), 30);
}

#[test]
fn test_step_out_of_host_code_returns_caller() {
    let markers = Default::default();
    let caller = tagged(RoutineId::new(3), None, 7, None);
    let frame = tagged(RoutineId::new(4), None, 8, Some(&caller));

    let target = step_out_target(&frame, false, &markers, tagged_file).unwrap();
    assert_eq!(target.source_line(), 7);
    assert!(step_out_target(&caller, false, &markers, tagged_file).is_none());
}

#[test]
fn test_module_path_rules_follow_install_dir() {
    let (_, bridge) = installed(EngineShape::Modern);
    let rules = bridge.module_path_rules();
    let install = Path::new(INSTALL_DIR);

    assert!(rules.contains(&ModulePathRule::new(
        install.join("contrib/admin/templatetags/log"),
        true
    )));
    assert!(rules.contains(&ModulePathRule::new(install.join("contrib"), false)));
    assert!(rules.contains(&ModulePathRule::new(install, true)));

    assert_eq!(
        is_implementation_file(&rules, &install.join("template/base.py")),
        Some(true)
    );
    assert_eq!(
        is_implementation_file(&rules, &install.join("contrib/auth/models.py")),
        Some(false)
    );
    assert_eq!(
        is_implementation_file(&rules, &install.join("contrib/admin/templatetags/log.py")),
        Some(true)
    );
    assert_eq!(is_implementation_file(&rules, Path::new("/app/views.py")), None);
}

#[test]
fn test_locals_flatten_scope_chain() {
    let (layout, bridge) = installed(EngineShape::Modern);
    let frame = EngineFrame::new(layout.node_render(&layout.text_node), None, "/x.py", 1).with_local(
        "context",
        context(vec![
            scope(&[("x", Value::Int(1))]),
            scope(&[("x", Value::Int(2)), ("y", Value::Int(3))]),
        ]),
    );

    let locals = bridge.locals(&frame);
    assert_eq!(locals.len(), 2);
    assert_eq!(locals["x"].as_int(), Some(2));
    assert_eq!(locals["y"].as_int(), Some(3));
    assert!(bridge.globals(&frame).is_empty());
}

#[test]
fn test_locals_render_lazy_text_and_tolerate_missing_context() {
    let (layout, bridge) = installed(EngineShape::Modern);
    let lazy = Value::object(LazyTextObject {
        text: "Welcome".to_string(),
    });
    let frame = EngineFrame::new(layout.node_render(&layout.text_node), None, "/x.py", 1)
        .with_local("context", context(vec![scope(&[("title", lazy)])]));
    assert_eq!(bridge.locals(&frame)["title"].as_str(), Some("Welcome"));

    let bare = EngineFrame::new(layout.node_render(&layout.text_node), None, "/x.py", 1);
    assert!(bridge.locals(&bare).is_empty());
}

#[test]
fn test_evaluate_sees_context_and_propagates_errors() {
    let (layout, bridge) = installed(EngineShape::Modern);
    let file = template_file("{{ name }}");
    let frame = node_frame(&layout, &layout.variable_node, file.path(), (0, 10), None);

    assert_eq!(bridge.evaluate("name", &frame).unwrap().as_str(), Some("ada"));
    assert!(matches!(
        bridge.evaluate("missing", &frame),
        Err(EvalError::UndefinedName(_))
    ));
    assert!(bridge.execute("greeting = name", &frame).is_ok());
    assert!(matches!(
        bridge.execute("x = missing.attr", &frame),
        Err(EvalError::UndefinedName(_))
    ));
}

#[test]
fn test_classifier_kinds() {
    let (layout, bridge) = installed(EngineShape::Legacy);
    let classifier = bridge.classifier();
    let frame = |routine| EngineFrame::new(routine, None, "/x.py", 1);

    assert_eq!(classifier.kind(&frame(layout.template_render)), FrameKind::Marker);
    assert_eq!(
        classifier.kind(&frame(layout.node_render(&layout.for_node))),
        FrameKind::SubLanguage
    );
    assert_eq!(classifier.kind(&frame(layout.render_node)), FrameKind::ExceptionReport);
    assert_eq!(classifier.kind(&frame(layout.render_to_string)), FrameKind::Host);
    assert_eq!(classifier.kind(&frame(layout.template_inner_render)), FrameKind::Host);
}

#[test]
fn test_debug_context_reuses_classifier_until_registry_changes() {
    let layout = EngineLayout::new(EngineShape::Modern, INSTALL_DIR);
    let registry = Arc::new(LoadedModules::new());
    layout.install_only(&registry, &["django.template", "django.template.base"]);
    let bridge = Arc::new(bridge_over(registry.clone()));
    let mut ctx = DebugContext::new(bridge, |_: &mut Stop<'_>| Some(StepAction::RunFree));

    let first = ctx.classifier();
    assert!(Arc::ptr_eq(&first, &ctx.classifier()));
    let if_render = layout.node_render(&layout.if_node);
    assert!(!first.sub_language.contains(&if_render));

    layout.install(&registry);
    let second = ctx.classifier();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(second.sub_language.contains(&if_render));

    // Host events leave the cached classification alone
    let host = EngineFrame::new(layout.render_to_string, None, "/app/views.py", 3);
    assert!(ctx.on_event(&host, EventKind::Line).is_continue());
    assert!(ctx.on_event(&host, EventKind::Return).is_continue());
    assert!(Arc::ptr_eq(&second, &ctx.classifier()));

    // The user may load modules while stopped
    let file = template_file("Hello {{ name }}");
    let node = node_frame(&layout, &layout.variable_node, file.path(), (6, 16), None);
    ctx.set_action(StepAction::StepInto);
    assert!(ctx.on_event(&node, EventKind::Call).is_continue());
    assert!(!Arc::ptr_eq(&second, &ctx.classifier()));
}
