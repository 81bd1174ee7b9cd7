use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use flimreg_common::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Reference to a callable implemented outside the manifest, written as
/// `package.module:attribute` (the attribute may itself be dotted, e.g.
/// `Widget.create`).
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryPointRef {
    module: String,
    attribute: String,
}

impl EntryPointRef {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Module path split into its dotted segments.
    pub fn module_segments(&self) -> impl Iterator<Item = &str> {
        self.module.split('.')
    }

    /// First segment of the attribute path, the name bound at module top level.
    pub fn top_level_name(&self) -> &str {
        self.attribute
            .split('.')
            .next()
            .unwrap_or(self.attribute.as_str())
    }
}

fn check_dotted(value: &str, part: &str, path: &str) -> Result<(), ConfigError> {
    if path.is_empty() {
        return Err(ConfigError::InvalidEntryPoint {
            value: value.to_string(),
            reason: format!("{part} path is empty"),
        });
    }
    if let Some(bad) = path.split('.').find(|seg| !IDENTIFIER.is_match(seg)) {
        return Err(ConfigError::InvalidEntryPoint {
            value: value.to_string(),
            reason: format!("'{bad}' is not a valid identifier in the {part} path"),
        });
    }
    Ok(())
}

impl FromStr for EntryPointRef {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (module, attribute) = s.split_once(':').ok_or_else(|| ConfigError::InvalidEntryPoint {
            value: s.to_string(),
            reason: "expected 'module.path:attribute'".into(),
        })?;
        check_dotted(s, "module", module)?;
        check_dotted(s, "attribute", attribute)?;
        Ok(Self {
            module: module.to_string(),
            attribute: attribute.to_string(),
        })
    }
}

impl TryFrom<String> for EntryPointRef {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntryPointRef> for String {
    fn from(value: EntryPointRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EntryPointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.attribute)
    }
}

/// Host-side lookup of the callables a manifest points at.
pub trait EntryPointResolver: Send + Sync {
    /// `Ok(())` when the callable exists, otherwise a human-readable reason.
    fn resolve(&self, entry_point: &EntryPointRef) -> Result<(), String>;
}

/// Resolver backed by an explicit set of known entry points.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    known: HashSet<EntryPointRef>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry_point: EntryPointRef) -> bool {
        self.known.insert(entry_point)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

impl FromIterator<EntryPointRef> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = EntryPointRef>>(iter: I) -> Self {
        Self {
            known: iter.into_iter().collect(),
        }
    }
}

impl EntryPointResolver for SymbolTable {
    fn resolve(&self, entry_point: &EntryPointRef) -> Result<(), String> {
        if self.known.contains(entry_point) {
            Ok(())
        } else {
            Err("not registered with the host".into())
        }
    }
}

/// Resolver that looks for the module source under one or more roots and
/// checks that the attribute is bound at module top level.
#[derive(Debug, Clone)]
pub struct SourceTreeResolver {
    roots: Vec<PathBuf>,
}

impl SourceTreeResolver {
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn module_file(&self, entry_point: &EntryPointRef) -> Option<PathBuf> {
        let relative: PathBuf = entry_point.module_segments().collect();
        self.roots.iter().find_map(|root| {
            let as_module = root.join(&relative).with_extension("py");
            if as_module.is_file() {
                return Some(as_module);
            }
            let as_package = root.join(&relative).join("__init__.py");
            as_package.is_file().then_some(as_package)
        })
    }
}

static DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:async\s+def|def|class)\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid definition regex")
});

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(from\s+[.\w]+\s+)?import\s+(.+)$").expect("valid import regex")
});

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s*,?\s*(?::[^=]*)?=")
        .expect("valid assignment regex")
});

/// True when `name` is bound at the top level of `source`.
fn binds_top_level(source: &str, name: &str) -> bool {
    top_level_statements(source)
        .iter()
        .any(|statement| statement_binds(statement, name))
}

/// Unindented logical statements of a Python module.
///
/// Comments are dropped, string literals collapse to `""`, bracketed and
/// backslash-continued lines are joined, and `;` splits statements.
fn top_level_statements(source: &str) -> Vec<String> {
    let bytes = source.as_bytes();
    let mut statements = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut depth = 0usize;
    let mut at_line_start = true;
    let mut indented = false;

    let mut finish = |current: &mut Vec<u8>, indented: bool| {
        let text = String::from_utf8_lossy(current).trim().to_string();
        if !indented && !text.is_empty() {
            statements.push(text);
        }
        current.clear();
    };

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'"' | b'\'' => {
                let triple = bytes[i..].starts_with(&[b, b, b]);
                i += if triple { 3 } else { 1 };
                while i < bytes.len() {
                    if bytes[i] == b'\\' {
                        i += 2;
                    } else if triple && bytes[i..].starts_with(&[b, b, b]) {
                        i += 3;
                        break;
                    } else if !triple && bytes[i] == b {
                        i += 1;
                        break;
                    } else if !triple && bytes[i] == b'\n' {
                        break;
                    } else {
                        i += 1;
                    }
                }
                current.extend_from_slice(b"\"\"");
                at_line_start = false;
                continue;
            }
            b'\\' if bytes[i + 1..].starts_with(b"\n") || bytes[i + 1..].starts_with(b"\r\n") => {
                current.push(b' ');
                i += if bytes[i + 1] == b'\r' { 3 } else { 2 };
                continue;
            }
            b'\n' if depth == 0 => {
                finish(&mut current, indented);
                at_line_start = true;
                indented = false;
            }
            b'\n' => current.push(b' '),
            b';' if depth == 0 => finish(&mut current, indented),
            b' ' | b'\t' | b'\r' | b'\x0c' => {
                if at_line_start {
                    indented = true;
                } else {
                    current.push(b' ');
                }
            }
            b'(' | b'[' | b'{' => {
                depth += 1;
                current.push(b);
                at_line_start = false;
            }
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                current.push(b);
                at_line_start = false;
            }
            _ => {
                current.push(b);
                at_line_start = false;
            }
        }
        i += 1;
    }
    finish(&mut current, indented);
    statements
}

fn statement_binds(statement: &str, name: &str) -> bool {
    if let Some(caps) = DEFINITION.captures(statement) {
        return &caps[1] == name;
    }
    if let Some(caps) = IMPORT.captures(statement) {
        let from_import = caps.get(1).is_some();
        return caps[2]
            .split(',')
            .filter_map(|item| imported_binding(item, from_import))
            .any(|bound| bound == name);
    }
    assignment_targets(statement).contains(&name)
}

/// Name bound by one comma-separated item of an import statement.
fn imported_binding(item: &str, from_import: bool) -> Option<&str> {
    let item = item.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());
    let mut words = item.split_whitespace();
    let imported = words.next().filter(|word| *word != "*")?;
    match (words.next(), words.next()) {
        (Some("as"), Some(alias)) => Some(alias),
        _ if from_import => Some(imported),
        // `import a.b` binds `a`
        _ => imported.split('.').next(),
    }
}

/// Plain names on the left of `=`, including chained and tuple targets.
fn assignment_targets(statement: &str) -> Vec<&str> {
    let mut targets = Vec::new();
    let mut rest = statement;
    while let Some(caps) = ASSIGNMENT.captures(rest) {
        let end = caps.get(0).map_or(rest.len(), |m| m.end());
        if rest[end..].starts_with('=') {
            break;
        }
        if let Some(names) = caps.get(1) {
            targets.extend(names.as_str().split(',').map(str::trim));
        }
        rest = rest[end..].trim_start();
    }
    targets
}

impl EntryPointResolver for SourceTreeResolver {
    fn resolve(&self, entry_point: &EntryPointRef) -> Result<(), String> {
        let path = self.module_file(entry_point).ok_or_else(|| {
            format!(
                "module '{}' not found under {} source root(s)",
                entry_point.module(),
                self.roots.len()
            )
        })?;
        debug!("resolving {} in {}", entry_point, path.display());

        let source = std::fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        if binds_top_level(&source, entry_point.top_level_name()) {
            Ok(())
        } else {
            Err(format!(
                "'{}' is not defined in {}",
                entry_point.top_level_name(),
                display_relative(&path, &self.roots)
            ))
        }
    }
}

fn display_relative(path: &Path, roots: &[PathBuf]) -> String {
    roots
        .iter()
        .find_map(|root| path.strip_prefix(root).ok())
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parse_module_and_attribute() {
        let ep: EntryPointRef = "napari_flim_phasor_plotter._reader:napari_get_reader"
            .parse()
            .unwrap();
        assert_eq!(ep.module(), "napari_flim_phasor_plotter._reader");
        assert_eq!(ep.attribute(), "napari_get_reader");
        assert_eq!(
            ep.to_string(),
            "napari_flim_phasor_plotter._reader:napari_get_reader"
        );
    }

    #[test]
    fn dotted_attribute_uses_first_segment_as_top_level_name() {
        let ep: EntryPointRef = "pkg._plotting:PhasorPlotterWidget.create".parse().unwrap();
        assert_eq!(ep.top_level_name(), "PhasorPlotterWidget");
    }

    #[test]
    fn rejects_malformed_references() {
        for bad in [
            "no_colon",
            ":func",
            "pkg.mod:",
            "pkg..mod:func",
            "pkg.mod:1func",
            "pkg-name.mod:func",
            "pkg.mod:func:extra",
        ] {
            let err = bad.parse::<EntryPointRef>().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEntryPoint { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn symbol_table_resolves_only_known_entries() {
        let known: EntryPointRef = "pkg.mod:known".parse().unwrap();
        let table: SymbolTable = [known.clone()].into_iter().collect();

        assert!(table.resolve(&known).is_ok());
        let unknown: EntryPointRef = "pkg.mod:unknown".parse().unwrap();
        assert!(table.resolve(&unknown).is_err());
    }

    #[test]
    fn source_tree_finds_modules_and_packages() {
        let root = tempfile::tempdir().unwrap();
        let pkg = root.path().join("flim_pkg");
        fs::create_dir_all(pkg.join("_io")).unwrap();
        fs::write(
            pkg.join("_reader.py"),
            "import numpy as np\n\ndef napari_get_reader(path):\n    return None\n",
        )
        .unwrap();
        fs::write(
            pkg.join("_io").join("__init__.py"),
            "from .convert_to_zarr import convert_folder_to_zarr\n",
        )
        .unwrap();
        fs::write(
            pkg.join("_widget.py"),
            "@magic_factory\ndef make_flim_phasor_plot(image_layer):\n    pass\n\nclass PhasorPlotterWidget:\n    pass\n",
        )
        .unwrap();

        let resolver = SourceTreeResolver::new([root.path()]);
        for ok in [
            "flim_pkg._reader:napari_get_reader",
            "flim_pkg._io:convert_folder_to_zarr",
            "flim_pkg._widget:make_flim_phasor_plot",
            "flim_pkg._widget:PhasorPlotterWidget.create",
        ] {
            let ep: EntryPointRef = ok.parse().unwrap();
            assert!(resolver.resolve(&ep).is_ok(), "{ok} should resolve");
        }

        let missing_attr: EntryPointRef = "flim_pkg._reader:read_ptu".parse().unwrap();
        let reason = resolver.resolve(&missing_attr).unwrap_err();
        assert!(reason.contains("'read_ptu' is not defined"));

        let missing_module: EntryPointRef = "flim_pkg._plotting:plot".parse().unwrap();
        let reason = resolver.resolve(&missing_module).unwrap_err();
        assert!(reason.contains("module 'flim_pkg._plotting' not found"));
    }

    #[test]
    fn nested_definitions_do_not_count_as_top_level() {
        let source = "class Reader:\n    def read(self):\n        pass\n";
        assert!(binds_top_level(source, "Reader"));
        assert!(!binds_top_level(source, "read"));
    }

    #[test]
    fn parenthesized_and_continued_imports_bind_every_name() {
        let source = "\
from ._reader import (
    napari_get_reader,  # entry point
    flim_file_reader,
)
from ._io import convert_folder_to_zarr, \\
    convert_file_to_zarr
";
        for name in [
            "napari_get_reader",
            "flim_file_reader",
            "convert_folder_to_zarr",
            "convert_file_to_zarr",
        ] {
            assert!(binds_top_level(source, name), "{name} should be bound");
        }
    }

    #[test]
    fn aliased_imports_bind_only_the_alias() {
        let source = "\
from ._reader import napari_get_reader as get_reader
import numpy as np
import os.path
from ._widget import *
";
        assert!(binds_top_level(source, "get_reader"));
        assert!(!binds_top_level(source, "napari_get_reader"));
        assert!(binds_top_level(source, "np"));
        assert!(!binds_top_level(source, "numpy"));
        assert!(binds_top_level(source, "os"));
        assert!(!binds_top_level(source, "make_flim_phasor_plot"));
    }

    #[test]
    fn docstring_mentions_do_not_bind() {
        let source = r#""""FLIM readers.

napari_get_reader: returns the reader for a path
make_flim_phasor_plot = widget factory
"""
'''Also see
flim_file_reader = None
'''

def read_ptu(path):
    """Single-line docstring."""
"#;
        assert!(!binds_top_level(source, "napari_get_reader"));
        assert!(!binds_top_level(source, "make_flim_phasor_plot"));
        assert!(!binds_top_level(source, "flim_file_reader"));
        assert!(binds_top_level(source, "read_ptu"));
    }

    #[test]
    fn comment_mentions_do_not_bind() {
        let source = "\
import numpy as np  # napari_get_reader lives in _reader
# napari_get_reader = None
# def flim_file_reader(path):
";
        assert!(binds_top_level(source, "np"));
        assert!(!binds_top_level(source, "napari_get_reader"));
        assert!(!binds_top_level(source, "flim_file_reader"));
    }

    #[test]
    fn assignments_bind_their_targets() {
        let source = "\
READER: Callable = make_reader()
first, second = load()
x = y = 1
DEBUG == 1
widget.name = 'phasor'
import os; sample = os.sep
";
        for name in ["READER", "first", "second", "x", "y", "sample"] {
            assert!(binds_top_level(source, name), "{name} should be bound");
        }
        assert!(!binds_top_level(source, "DEBUG"));
        assert!(!binds_top_level(source, "widget"));
    }

    #[test]
    fn package_reexports_resolve_through_the_bound_name() {
        let root = tempfile::tempdir().unwrap();
        let pkg = root.path().join("flim_pkg");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(
            pkg.join("__init__.py"),
            "\"\"\"napari_get_reader: see _reader.\"\"\"\nfrom ._reader import (\n    napari_get_reader,\n)\nfrom ._widget import make_flim_phasor_plot as make_plot\n",
        )
        .unwrap();

        let resolver = SourceTreeResolver::new([root.path()]);
        let reexported: EntryPointRef = "flim_pkg:napari_get_reader".parse().unwrap();
        assert!(resolver.resolve(&reexported).is_ok());
        let aliased: EntryPointRef = "flim_pkg:make_plot".parse().unwrap();
        assert!(resolver.resolve(&aliased).is_ok());

        let hidden: EntryPointRef = "flim_pkg:make_flim_phasor_plot".parse().unwrap();
        let reason = resolver.resolve(&hidden).unwrap_err();
        assert!(reason.contains("'make_flim_phasor_plot' is not defined"));
    }
}
