pub mod error;
pub mod types;

pub use error::{ConfigError, Error, Result};
pub use types::{CommandId, PluginName, SampleKey};
