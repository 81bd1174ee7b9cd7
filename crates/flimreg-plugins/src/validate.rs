use std::collections::HashSet;

use flimreg_common::{CommandId, ConfigError};

use crate::entry_point::EntryPointResolver;
use crate::manifest::PluginManifest;
use crate::pattern::FilenamePattern;
use crate::traits::CommandBinding;

/// Knobs for manifest validation.
#[derive(Clone, Copy)]
pub struct ValidationOptions<'a> {
    /// Require command ids of the form `<plugin-name>.<local-id>`.
    pub strict_namespace: bool,
    /// When set, every command's entry point must resolve through it.
    pub resolver: Option<&'a dyn EntryPointResolver>,
}

impl Default for ValidationOptions<'_> {
    fn default() -> Self {
        Self {
            strict_namespace: true,
            resolver: None,
        }
    }
}

impl<'a> ValidationOptions<'a> {
    pub fn with_resolver(resolver: &'a dyn EntryPointResolver) -> Self {
        Self {
            resolver: Some(resolver),
            ..Self::default()
        }
    }

    pub fn lenient_namespace(mut self) -> Self {
        self.strict_namespace = false;
        self
    }
}

/// Validate a manifest, stopping at the first violation.
pub fn validate(manifest: &PluginManifest, options: ValidationOptions<'_>) -> Result<(), ConfigError> {
    match validate_all(manifest, options).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Validate a manifest and return every violation in declaration order.
pub fn validate_all(manifest: &PluginManifest, options: ValidationOptions<'_>) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    let name = &manifest.name;

    if name.is_empty() {
        errors.push(ConfigError::EmptyField("plugin name".into()));
    } else if !name
        .as_str()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        errors.push(ConfigError::InvalidPluginName(name.to_string()));
    }
    if manifest.display_name.trim().is_empty() {
        errors.push(ConfigError::EmptyField("display_name".into()));
    }

    let contributions = &manifest.contributions;
    let mut declared: HashSet<&CommandId> = HashSet::new();
    for command in &contributions.commands {
        if command.id.is_empty() {
            errors.push(ConfigError::EmptyField("command id".into()));
            continue;
        }
        if !declared.insert(&command.id) {
            errors.push(ConfigError::DuplicateCommand(command.id.to_string()));
        }
        if options.strict_namespace && !command.id.is_namespaced_by(name) {
            errors.push(ConfigError::CommandNamespace {
                id: command.id.to_string(),
                plugin: name.to_string(),
            });
        }
        if command.title.trim().is_empty() {
            errors.push(ConfigError::EmptyField(format!("title of command '{}'", command.id)));
        }
        if let Some(resolver) = options.resolver {
            if let Err(reason) = resolver.resolve(&command.entry_point) {
                errors.push(ConfigError::UnresolvedEntryPoint {
                    command: command.id.to_string(),
                    entry_point: command.entry_point.to_string(),
                    reason,
                });
            }
        }
    }

    check_bindings(&contributions.readers, &declared, &mut errors);
    for reader in &contributions.readers {
        for pattern in &reader.filename_patterns {
            if let Err(err) = FilenamePattern::new(pattern) {
                errors.push(err);
            }
        }
    }

    check_bindings(&contributions.sample_data, &declared, &mut errors);
    let mut keys = HashSet::new();
    for sample in &contributions.sample_data {
        if sample.key.is_empty() {
            errors.push(ConfigError::EmptyField("sample data key".into()));
        } else if !keys.insert(&sample.key) {
            errors.push(ConfigError::DuplicateSampleKey(sample.key.to_string()));
        }
        if sample.display_name.trim().is_empty() {
            errors.push(ConfigError::EmptyField(format!(
                "display_name of sample data '{}'",
                sample.key
            )));
        }
    }

    check_bindings(&contributions.widgets, &declared, &mut errors);
    for widget in &contributions.widgets {
        if widget.display_name.trim().is_empty() {
            errors.push(ConfigError::EmptyField(format!(
                "display_name of widget bound to '{}'",
                widget.command
            )));
        }
    }

    errors
}

fn check_bindings<B: CommandBinding>(
    bindings: &[B],
    declared: &HashSet<&CommandId>,
    errors: &mut Vec<ConfigError>,
) {
    for binding in bindings {
        if !declared.contains(binding.command()) {
            errors.push(ConfigError::DanglingCommand {
                kind: B::KIND,
                command: binding.command().to_string(),
            });
        }
    }
}
