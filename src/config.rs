//! Configuration loading for the template debugger
//!
//! Loads an optional TOML file; every section falls back to defaults that
//! describe the Django template engine's module layout.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct BridgeConfig {
    #[serde(default)]
    pub engine: EngineProfile,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the template engine keeps the routines the bridge cares about.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EngineProfile {
    /// Module whose presence in the registry means the engine is loaded
    pub indicator_module: String,

    /// Module defining the node base type and compiled template type
    pub base_module: String,

    /// Short name of the compiled template type (looked up in the indicator module)
    pub template_type: String,

    /// Short name of the node base type (looked up in the indicator module)
    pub node_type: String,

    /// Per-node evaluation method, also the template entry point
    pub render_method: String,

    /// Submodules scanned for node types; missing ones are skipped
    pub template_modules: Vec<String>,

    /// Directory under the engine install dir holding contributed add-ons
    pub contrib_dir: String,

    /// Add-on template-tag modules (relative to `contrib_dir`) hidden from host stepping
    pub addon_tag_modules: Vec<String>,

    /// Legacy exception shape: `module`, `type` and `method` of the node list renderer
    pub legacy_debug_module: String,
    pub legacy_node_list_type: String,
    pub legacy_render_node_method: String,

    /// Modern exception shape: method on the template type in `base_module`
    pub exception_info_method: String,
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self {
            indicator_module: "django.template".to_string(),
            base_module: "django.template.base".to_string(),
            template_type: "Template".to_string(),
            node_type: "Node".to_string(),
            render_method: "render".to_string(),
            template_modules: [
                "django.template",
                "django.template.base",
                "django.template.debug",
                "django.template.defaulttags",
                "django.template.loader_tags",
                "django.template.library",
                "django.templatetags",
                "django.templatetags.i18n",
                "django.templatetags.l10n",
                "django.templatetags.static",
                "django.templatetags.tz",
                "django.templatetags.cache",
                "django.contrib.admin.templatetags.log",
                "django.contrib.comments.templatetags.comments",
                "django.contrib.webdesign.templatetags.webdesign",
                "django.contrib.flatpages.templatetags.flatpages",
                "django.contrib.staticfiles.templatetags.staticfiles",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            contrib_dir: "contrib".to_string(),
            addon_tag_modules: [
                "admin/templatetags/log",
                "comments/templatetags/comments",
                "webdesign/templatetags/webdesign",
                "flatpages/templatetags/flatpages",
                "staticfiles/templatetags/staticfiles",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            legacy_debug_module: "django.template.debug".to_string(),
            legacy_node_list_type: "DebugNodeList".to_string(),
            legacy_render_node_method: "render_node".to_string(),
            exception_info_method: "get_exception_info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct PathConfig {
    /// Lower-case template filenames before comparing; unset means "follow the platform"
    pub case_insensitive: Option<bool>,
}

impl PathConfig {
    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive.unwrap_or(cfg!(windows))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// env_logger filter, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append log output here instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl BridgeConfig {
    /// Load configuration from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
