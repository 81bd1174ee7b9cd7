use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Plugin identifier, e.g. `napari-flim-phasor-plotter`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginName(String);

/// Command identifier, namespaced as `<plugin-name>.<local-id>`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(String);

/// Key of a sample data entry.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleKey(String);

macro_rules! impl_id_type {
    ($t:ty) => {
        impl $t {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $t {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $t {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $t {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_id_type!(PluginName);
impl_id_type!(CommandId);
impl_id_type!(SampleKey);

impl CommandId {
    /// Split into `(namespace, local_id)` at the first `.`.
    pub fn split_namespace(&self) -> Option<(&str, &str)> {
        self.0.split_once('.')
    }

    /// True when the id reads `<plugin>.<local-id>` with a non-empty local id.
    pub fn is_namespaced_by(&self, plugin: &PluginName) -> bool {
        self.0
            .strip_prefix(plugin.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|local| !local.is_empty())
    }
}
