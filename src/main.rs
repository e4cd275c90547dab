use clap::Parser;
use log::{error, info};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;

use template_debugger::config::{BridgeConfig, LoggingConfig};
use template_debugger::debugger::{
    DebugContext, HostEvaluator, StackEntry, StepAction, Stop, StopHandler, TemplateBridge,
};
use template_debugger::error::{ConfigError, TemplateError};
use template_debugger::executor::{Engine, EngineFrame, EngineShape, SimpleEvaluator};
use template_debugger::extensions;
use template_debugger::host::{ModuleRegistry, Namespace, RoutineId, Value};

#[derive(Parser, Debug)]
#[command(name = "template-debugger")]
#[command(version, about = "Render a template and step through it node by node")]
struct Cli {
    /// Template to render, relative to the template directories
    template: String,

    /// Template directory (repeatable)
    #[arg(short, long = "dir", default_value = ".")]
    dirs: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Template breakpoint as FILE:LINE (repeatable)
    #[arg(short, long = "break", value_name = "FILE:LINE")]
    breakpoints: Vec<String>,

    /// Context variable as NAME=VALUE; VALUE is parsed as JSON when possible
    #[arg(long = "var", value_name = "NAME=VALUE")]
    vars: Vec<String>,

    /// Run until a breakpoint or error instead of stopping at the first node
    #[arg(long)]
    run: bool,

    /// Imitate engines that render every node through a debug node list
    #[arg(long)]
    legacy: bool,

    /// Report stops and output as JSON lines on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("could not install logger: {0}")]
    Logging(#[from] log::SetLoggerError),

    #[error("{0}")]
    Usage(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Template(TemplateError::Aborted)) => {
            eprintln!("👋 Debugger detached");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    // Nothing is logged before this point: the logger is configured from the file.
    let config = BridgeConfig::load(cli.config.as_deref())?;
    init_logging(&config.logging)?;
    debug_template(cli, config).map_err(|e| {
        if !matches!(e, CliError::Template(TemplateError::Aborted)) {
            error!("{}", e);
        }
        e
    })
}

fn debug_template(cli: Cli, config: BridgeConfig) -> Result<(), CliError> {
    info!("debugger started with {:?}", cli);

    let shape = if cli.legacy {
        EngineShape::Legacy
    } else {
        EngineShape::Modern
    };
    let engine = Engine::new(cli.dirs.clone(), shape);
    let registry: Arc<dyn ModuleRegistry> = engine.registry();
    let evaluator: Arc<dyn HostEvaluator + Send + Sync> = Arc::new(SimpleEvaluator::new());
    for hook in extensions::discover(&registry, &config, &evaluator) {
        info!("sub-language support active: {}", hook.name());
    }

    let bridge = Arc::new(TemplateBridge::new(registry, config, evaluator));
    let mut ctx = DebugContext::new(bridge, Prompt { json: cli.json });
    ctx.set_action(if cli.run {
        StepAction::RunFree
    } else {
        StepAction::StepInto
    });
    for arg in &cli.breakpoints {
        let (file, line) = parse_breakpoint(arg)?;
        ctx.add_breakpoint(file, line);
    }

    let vars = parse_vars(&cli.vars)?;
    let caller = EngineFrame::new(RoutineId::fresh(), None, "<cli>", 1);
    let output = engine.render_to_string(&cli.template, vars, Some(&caller), &mut ctx)?;

    if cli.json {
        println!("{}", json!({ "output": output }));
    } else {
        eprintln!("\n✅ Rendering completed");
        print!("{}", output);
        io::stdout().flush()?;
    }
    Ok(())
}

fn init_logging(config: &LoggingConfig) -> Result<(), CliError> {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&config.level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    if let Some(path) = &config.file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.format_timestamp(None).try_init()?;
    Ok(())
}

fn parse_breakpoint(arg: &str) -> Result<(PathBuf, usize), CliError> {
    let (file, line) = arg
        .rsplit_once(':')
        .ok_or_else(|| CliError::Usage(format!("breakpoint '{}' is not FILE:LINE", arg)))?;
    let line = line
        .parse()
        .map_err(|_| CliError::Usage(format!("invalid line number in '{}'", arg)))?;
    Ok((PathBuf::from(file), line))
}

fn parse_vars(args: &[String]) -> Result<Namespace, CliError> {
    let mut vars = Namespace::new();
    for arg in args {
        let (name, raw) = arg
            .split_once('=')
            .ok_or_else(|| CliError::Usage(format!("variable '{}' is not NAME=VALUE", arg)))?;
        let value = serde_json::from_str::<serde_json::Value>(raw)
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(raw));
        vars.insert(name.to_string(), value);
    }
    Ok(vars)
}

/// Interactive stop handler reading commands from stdin.
struct Prompt {
    json: bool,
}

impl Prompt {
    fn report(&self, stop: &Stop<'_>) {
        if self.json {
            println!(
                "{}",
                json!({ "stop": stop.reason, "event": stop.event, "stack": stop.stack })
            );
            return;
        }

        match stop.location() {
            Some(top) => {
                eprintln!(
                    "\n⏸  {:?} at {}:{} {}",
                    stop.reason,
                    top.filename.display(),
                    top.line.unwrap_or(0),
                    top.name
                );
                if let Some(source) = &top.source {
                    eprintln!("    {}", source);
                }
            }
            None => eprintln!("\n⏸  {:?}", stop.reason),
        }
    }

    fn print_stack(&self, stack: &[StackEntry]) {
        eprintln!("\n=== Stack ({} frames) ===", stack.len());
        for (i, entry) in stack.iter().enumerate() {
            let marker = if entry.template { "📄" } else { "  " };
            eprintln!(
                "  #{} {} {}:{} {}",
                i,
                marker,
                entry.filename.display(),
                entry.line.unwrap_or(0),
                entry.name
            );
        }
        eprintln!();
    }

    fn print_value(&self, value: &Value) {
        if self.json {
            println!("{}", json!({ "value": value.to_json() }));
        } else {
            eprintln!("  {}", value);
        }
    }

    fn print_locals(&self, locals: &Namespace) {
        if self.json {
            let map: serde_json::Map<_, _> = locals
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            println!("{}", json!({ "locals": map }));
            return;
        }
        eprintln!("\n=== Template Variables ===");
        for (name, value) in locals {
            eprintln!("  {}={}", name, value);
        }
        eprintln!();
    }
}

impl StopHandler for Prompt {
    fn on_stop(&mut self, stop: &mut Stop<'_>) -> Option<StepAction> {
        self.report(stop);

        loop {
            if !self.json {
                eprintln!("\nCommands: (s)tep, (n)ext, (o)ut, (c)ontinue, (b)reak FILE LINE, (d)elete FILE LINE, (p)rint EXPR, e(x)ec STMT, (l)ocals, (bt) stack, (q)uit");
            }
            eprint!("> ");
            io::stderr().flush().ok();

            let mut input = String::new();
            match io::stdin().read_line(&mut input) {
                Ok(0) | Err(_) => return Some(StepAction::RunFree),
                Ok(_) => {}
            }
            let line = input.trim();
            let Some(words) = shlex::split(line) else {
                eprintln!("❌ Unbalanced quotes");
                continue;
            };
            let command = words.first().map(String::as_str).unwrap_or("");
            let rest = line
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim())
                .unwrap_or("");

            match command {
                "" | "s" | "step" => return Some(StepAction::StepInto),
                "n" | "next" => return Some(StepAction::StepOver),
                "o" | "out" => return Some(StepAction::StepOut),
                "c" | "continue" => return Some(StepAction::RunFree),
                "q" | "quit" => return None,
                "b" | "break" => match words.as_slice() {
                    [_] => {
                        for (file, line) in stop.breakpoints().iter() {
                            eprintln!("  {}:{}", file.display(), line);
                        }
                    }
                    [_, file, line] => match line.parse::<usize>() {
                        Ok(line) => stop.add_breakpoint(file, line),
                        Err(_) => eprintln!("❌ Invalid line number"),
                    },
                    _ => eprintln!("❌ Usage: b FILE LINE"),
                },
                "d" | "delete" => match words.as_slice() {
                    [_, file, line] => match line.parse::<usize>() {
                        Ok(line) if stop.remove_breakpoint(file, line) => {}
                        Ok(_) => eprintln!("❌ No breakpoint at {}:{}", file, line),
                        Err(_) => eprintln!("❌ Invalid line number"),
                    },
                    _ => eprintln!("❌ Usage: d FILE LINE"),
                },
                "p" | "print" => match stop.evaluate(rest) {
                    Ok(value) => self.print_value(&value),
                    Err(e) => eprintln!("❌ {}", e),
                },
                "x" | "exec" => {
                    if let Err(e) = stop.execute(rest) {
                        eprintln!("❌ {}", e);
                    }
                }
                "l" | "locals" => self.print_locals(&stop.locals()),
                "bt" | "stack" => self.print_stack(&stop.stack),
                other => eprintln!("❓ Unknown command: {}", other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_install_failure_is_reported() {
        let config = LoggingConfig::default();
        // At most one logger per process; the second install must fail loudly
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(first.is_ok());
        assert!(matches!(second, Err(CliError::Logging(_))));
    }

    #[test]
    fn test_breakpoint_arguments() {
        let (file, line) = parse_breakpoint("pages/home.tmpl:12").unwrap();
        assert_eq!(file, PathBuf::from("pages/home.tmpl"));
        assert_eq!(line, 12);
        assert!(matches!(parse_breakpoint("home.tmpl"), Err(CliError::Usage(_))));
        assert!(matches!(parse_breakpoint("home.tmpl:x"), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_variables_parse_as_json_when_possible() {
        let vars = parse_vars(&[
            "user={\"name\": \"ada\"}".to_string(),
            "title=Hello".to_string(),
        ])
        .unwrap();
        assert_eq!(vars["user"].to_json(), json!({"name": "ada"}));
        assert_eq!(vars["title"].to_json(), json!("Hello"));
        assert!(matches!(parse_vars(&["nope".to_string()]), Err(CliError::Usage(_))));
    }
}
