use std::fmt;
use std::path::Path;

use flimreg_common::ConfigError;
use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A compiled reader filename pattern. Matching is case-sensitive and applies
/// to the final path component only.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    source: String,
    pattern: Pattern,
}

impl FilenamePattern {
    pub fn new(source: &str) -> Result<Self, ConfigError> {
        if source.is_empty() {
            return Err(ConfigError::InvalidPattern {
                pattern: String::new(),
                reason: "pattern is empty".into(),
            });
        }
        // only the final path component is ever matched
        if source.contains(['/', '\\']) {
            return Err(ConfigError::InvalidPattern {
                pattern: source.to_string(),
                reason: "patterns match file names and cannot contain a path separator".into(),
            });
        }
        let pattern = Pattern::new(source).map_err(|e| ConfigError::InvalidPattern {
            pattern: source.to_string(),
            reason: e.msg.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            pattern,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches_name(&self, file_name: &str) -> bool {
        self.pattern.matches_with(file_name, MATCH_OPTIONS)
    }

    pub fn matches_path(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.matches_name(name))
    }
}

impl PartialEq for FilenamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for FilenamePattern {}

impl fmt::Display for FilenamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
