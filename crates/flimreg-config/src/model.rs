use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory scanned for plugin manifests. Defaults to `<config_dir>/plugins`.
    #[serde(default)]
    pub plugins_dir: Option<PathBuf>,

    #[serde(default)]
    pub log_level: Option<String>,

    /// Source roots searched when resolving `python_name` entry points.
    /// Empty disables entry-point resolution.
    #[serde(default)]
    pub source_roots: Vec<PathBuf>,

    /// Require command ids to be namespaced by the plugin name.
    #[serde(default = "default_true")]
    pub strict_namespace: bool,

    /// Register the bundled FLIM phasor plotter manifest alongside discovered plugins.
    #[serde(default = "default_true")]
    pub include_builtin: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plugins_dir: None,
            log_level: Some("info".to_string()),
            source_roots: Vec::new(),
            strict_namespace: true,
            include_builtin: true,
        }
    }
}

fn default_true() -> bool {
    true
}
