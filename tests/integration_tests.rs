use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use template_debugger::config::BridgeConfig;
use template_debugger::error::TemplateError;
use template_debugger::executor::{Engine, EngineShape, NoTrace};
use template_debugger::host::{Namespace, Value};

// Helper to create a template directory
fn create_templates(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create template dir");
    for (name, text) in files {
        fs::write(dir.path().join(name), text).expect("Failed to write template");
    }
    dir
}

fn render(dir: &Path, name: &str, vars: Namespace) -> Result<String, TemplateError> {
    let engine = Engine::new(vec![dir.to_path_buf()], EngineShape::Modern);
    engine.render_to_string(name, vars, None, &mut NoTrace)
}

fn vars(value: serde_json::Value) -> Namespace {
    match Value::from(value) {
        Value::Dict(map) => map,
        other => panic!("expected an object, got {:?}", other),
    }
}

#[cfg(test)]
mod render_tests {
    use super::*;

    #[test]
    fn test_basic_render() {
        let dir = create_templates(&[("hello.tmpl", "Hello {{ name }}!\n")]);
        let out = render(dir.path(), "hello.tmpl", vars(json!({"name": "Alice"}))).unwrap();
        assert_eq!(out, "Hello Alice!\n");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let dir = create_templates(&[("hello.tmpl", "[{{ nobody }}]")]);
        let out = render(dir.path(), "hello.tmpl", Namespace::new()).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_for_and_if() {
        let text = "{% for item in items %}{% if item.done %}+{% else %}-{% endif %}{{ item.name }} {% endfor %}";
        let dir = create_templates(&[("list.tmpl", text)]);
        let out = render(
            dir.path(),
            "list.tmpl",
            vars(json!({"items": [{"name": "a", "done": true}, {"name": "b", "done": false}]})),
        )
        .unwrap();
        assert_eq!(out, "+a -b ");
    }

    #[test]
    fn test_include_with_bindings_is_scoped() {
        let dir = create_templates(&[
            ("outer.tmpl", "{% include \"inner.tmpl\" with who=name %}/{{ who }}"),
            ("inner.tmpl", "<{{ who }}>"),
        ]);
        let out = render(dir.path(), "outer.tmpl", vars(json!({"name": "Bob"}))).unwrap();
        assert_eq!(out, "<Bob>/");
    }

    #[test]
    fn test_crlf_templates_render_with_lf() {
        let dir = create_templates(&[("win.tmpl", "a\r\n{{ x }}\r\nb\rc")]);
        let out = render(dir.path(), "win.tmpl", vars(json!({"x": 1}))).unwrap();
        assert_eq!(out, "a\n1\nb\nc");
    }

    #[test]
    fn test_template_dirs_searched_in_order() {
        let first = create_templates(&[("shared.tmpl", "first")]);
        let second = create_templates(&[("shared.tmpl", "second"), ("only.tmpl", "only")]);
        let engine = Engine::new(
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
            EngineShape::Modern,
        );
        let shared = engine.render_to_string("shared.tmpl", Namespace::new(), None, &mut NoTrace);
        let only = engine.render_to_string("only.tmpl", Namespace::new(), None, &mut NoTrace);
        assert_eq!(shared.unwrap(), "first");
        assert_eq!(only.unwrap(), "only");
    }

    #[test]
    fn test_missing_template() {
        let dir = create_templates(&[]);
        let result = render(dir.path(), "nope.tmpl", Namespace::new());
        assert!(matches!(result, Err(TemplateError::NotFound(name)) if name == "nope.tmpl"));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let dir = create_templates(&[("bad.tmpl", "ok\n{% if x %}never closed")]);
        let result = render(dir.path(), "bad.tmpl", Namespace::new());
        match result {
            Err(TemplateError::Syntax { name, position, .. }) => {
                assert_eq!(name, "bad.tmpl");
                assert_eq!(position, 3);
            }
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_shape_renders_identically() {
        let dir = create_templates(&[
            ("page.tmpl", "{% for n in nums %}{% include \"n.tmpl\" %}{% endfor %}"),
            ("n.tmpl", "({{ n }})"),
        ]);
        let nums = vars(json!({"nums": [1, 2, 3]}));
        let modern = Engine::new(vec![dir.path().to_path_buf()], EngineShape::Modern)
            .render_to_string("page.tmpl", nums.clone(), None, &mut NoTrace)
            .unwrap();
        let legacy = Engine::new(vec![dir.path().to_path_buf()], EngineShape::Legacy)
            .render_to_string("page.tmpl", nums, None, &mut NoTrace)
            .unwrap();
        assert_eq!(modern, "(1)(2)(3)");
        assert_eq!(modern, legacy);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debugger.toml");
        fs::write(
            &path,
            "[paths]\ncase_insensitive = true\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = BridgeConfig::load(Some(&path)).unwrap();
        assert!(config.paths.case_insensitive());
        assert_eq!(config.logging.level, "debug");
    }
}
