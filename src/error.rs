use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of an expression or statement evaluated in a paused frame.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    UndefinedName(String),

    #[error("'{type_name}' object has no attribute '{attr}'")]
    Attribute { type_name: String, attr: String },

    #[error("invalid syntax: {0}")]
    Syntax(String),

    #[error("{0}")]
    Type(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template does not exist: {0}")]
    NotFound(String),

    #[error("{name}: invalid template syntax at byte {position}: {message}")]
    Syntax {
        name: String,
        position: usize,
        message: String,
    },

    #[error("could not read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("rendering stopped: debugger detached with quit")]
    Aborted,
}
