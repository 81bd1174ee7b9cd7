use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors raised while loading or validating a manifest.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub fn as_config(&self) -> Option<&ConfigError> {
        match self {
            Error::Config(e) => Some(e),
            _ => None,
        }
    }
}

/// Everything that can be wrong with a plugin manifest.
///
/// All variants are fatal to the registration of the plugin that produced
/// them; there is no partially registered state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to parse {format} manifest: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("unsupported manifest format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid plugin name '{0}' (only ASCII alphanumerics, '-', '_' and '.' allowed)")]
    InvalidPluginName(String),

    #[error("{0} must not be empty")]
    EmptyField(String),

    #[error("duplicate command id '{0}'")]
    DuplicateCommand(String),

    #[error("command id '{id}' is not namespaced as '{plugin}.<local-id>'")]
    CommandNamespace { id: String, plugin: String },

    #[error("{kind} references undeclared command '{command}'")]
    DanglingCommand { kind: &'static str, command: String },

    #[error("invalid filename pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("duplicate sample data key '{0}'")]
    DuplicateSampleKey(String),

    #[error("invalid entry point '{value}': {reason}")]
    InvalidEntryPoint { value: String, reason: String },

    #[error("entry point '{entry_point}' for command '{command}' cannot be resolved: {reason}")]
    UnresolvedEntryPoint {
        command: String,
        entry_point: String,
        reason: String,
    },

    #[error("plugin '{0}' is already registered")]
    DuplicatePlugin(String),
}
