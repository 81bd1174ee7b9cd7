use std::path::Path;

use flimreg_common::{CommandId, ConfigError, PluginName, Result, SampleKey};
use serde::{Deserialize, Serialize};

use crate::entry_point::EntryPointRef;

/// Declarative description of everything a plugin contributes to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: PluginName,
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,

    #[serde(default)]
    pub contributions: Contributions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributions {
    #[serde(default)]
    pub commands: Vec<CommandContribution>,

    #[serde(default)]
    pub readers: Vec<ReaderContribution>,

    #[serde(default)]
    pub sample_data: Vec<SampleDataContribution>,

    #[serde(default)]
    pub widgets: Vec<WidgetContribution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContribution {
    pub id: CommandId,

    /// Pointer to the implementing callable, `module.path:attribute`.
    #[serde(rename = "python_name")]
    pub entry_point: EntryPointRef,

    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderContribution {
    pub command: CommandId,

    #[serde(default)]
    pub accepts_directories: bool,

    /// Glob patterns matched against the file name. Order is significant.
    #[serde(default)]
    pub filename_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDataContribution {
    pub command: CommandId,
    pub display_name: String,
    pub key: SampleKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetContribution {
    pub command: CommandId,
    pub display_name: String,
}

/// On-disk encodings a manifest can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Toml,
    Json,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

impl PluginManifest {
    pub fn parse(content: &str, format: ManifestFormat) -> std::result::Result<Self, ConfigError> {
        let parsed = match format {
            ManifestFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            ManifestFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ManifestFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse {
            format: format.name(),
            message,
        })
    }

    pub fn from_yaml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        Self::parse(content, ManifestFormat::Yaml)
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        Self::parse(content, ManifestFormat::Toml)
    }

    pub fn from_json_str(content: &str) -> std::result::Result<Self, ConfigError> {
        Self::parse(content, ManifestFormat::Json)
    }

    /// Read a manifest from disk, choosing the decoder by file extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let format = ManifestFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content, format)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| flimreg_common::Error::Other(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
