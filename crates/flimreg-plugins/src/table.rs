use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;

use flimreg_common::{CommandId, ConfigError, PluginName, Result, SampleKey};
use tracing::debug;

use crate::entry_point::EntryPointRef;
use crate::manifest::{
    CommandContribution, PluginManifest, ReaderContribution, SampleDataContribution,
    WidgetContribution,
};
use crate::pattern::FilenamePattern;
use crate::validate::{ValidationOptions, validate};

/// What a host is asking a reader to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

impl PathKind {
    /// Inspect the filesystem. Paths that do not exist count as files.
    pub fn probe(path: &Path) -> Self {
        if path.is_dir() {
            Self::Directory
        } else {
            Self::File
        }
    }
}

/// Validated, immutable registration table of a single plugin.
///
/// Built once from a manifest; every command reference inside is known to
/// resolve and every filename pattern is precompiled. Share it behind an
/// `Arc` for concurrent readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationTable {
    manifest: PluginManifest,
    commands: HashMap<CommandId, usize>,
    samples: HashMap<SampleKey, usize>,
    /// Compiled patterns, parallel to `manifest.contributions.readers`.
    reader_patterns: Vec<Vec<FilenamePattern>>,
}

impl RegistrationTable {
    pub fn load(
        manifest: PluginManifest,
        options: ValidationOptions<'_>,
    ) -> std::result::Result<Self, ConfigError> {
        validate(&manifest, options)?;

        let contributions = &manifest.contributions;
        let commands = contributions
            .commands
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        let samples = contributions
            .sample_data
            .iter()
            .enumerate()
            .map(|(i, s)| (s.key.clone(), i))
            .collect();
        let reader_patterns = contributions
            .readers
            .iter()
            .map(|r| {
                r.filename_patterns
                    .iter()
                    .map(|p| FilenamePattern::new(p))
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(
            "registered plugin {}: {} command(s), {} reader(s), {} sample(s), {} widget(s)",
            manifest.name,
            contributions.commands.len(),
            contributions.readers.len(),
            contributions.sample_data.len(),
            contributions.widgets.len()
        );

        Ok(Self {
            manifest,
            commands,
            samples,
            reader_patterns,
        })
    }

    /// Parse and load a manifest file.
    pub fn from_file(path: &Path, options: ValidationOptions<'_>) -> Result<Self> {
        let manifest = PluginManifest::from_file(path)?;
        Ok(Self::load(manifest, options)?)
    }

    /// The full declarative structure this table was built from.
    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn name(&self) -> &PluginName {
        &self.manifest.name
    }

    pub fn display_name(&self) -> &str {
        &self.manifest.display_name
    }

    pub fn commands(&self) -> &[CommandContribution] {
        &self.manifest.contributions.commands
    }

    pub fn command(&self, id: &str) -> Option<&CommandContribution> {
        self.commands
            .get(id)
            .map(|&i| &self.manifest.contributions.commands[i])
    }

    pub fn entry_point(&self, id: &str) -> Option<&EntryPointRef> {
        self.command(id).map(|c| &c.entry_point)
    }

    pub fn readers(&self) -> &[ReaderContribution] {
        &self.manifest.contributions.readers
    }

    /// Readers claiming `path`, in declaration order.
    ///
    /// Files are claimed when their name matches one of the reader's
    /// patterns; directories are claimed by readers that accept directories.
    pub fn readers_for_path(&self, path: &Path, kind: PathKind) -> Vec<&ReaderContribution> {
        self.readers()
            .iter()
            .zip(&self.reader_patterns)
            .filter(|(reader, patterns)| match kind {
                PathKind::Directory => reader.accepts_directories,
                PathKind::File => patterns.iter().any(|p| p.matches_path(path)),
            })
            .map(|(reader, _)| reader)
            .collect()
    }

    /// Readers claiming a set of files opened together as one stack.
    ///
    /// The stack is represented by its most frequent file extension; the
    /// first file carrying that extension is matched like a single file.
    pub fn readers_for_stack<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<&ReaderContribution> {
        let Some(ext) = dominant_extension(paths) else {
            return Vec::new();
        };
        paths
            .iter()
            .map(AsRef::as_ref)
            .find(|p| p.extension() == Some(ext))
            .map(|representative| self.readers_for_path(representative, PathKind::File))
            .unwrap_or_default()
    }

    pub fn sample_data(&self) -> &[SampleDataContribution] {
        &self.manifest.contributions.sample_data
    }

    pub fn sample(&self, key: &str) -> Option<&SampleDataContribution> {
        self.samples
            .get(key)
            .map(|&i| &self.manifest.contributions.sample_data[i])
    }

    pub fn widgets(&self) -> &[WidgetContribution] {
        &self.manifest.contributions.widgets
    }

    pub fn widget(&self, display_name: &str) -> Option<&WidgetContribution> {
        self.widgets()
            .iter()
            .find(|w| w.display_name == display_name)
    }
}

/// Most frequent extension among `paths`; ties go to the one seen first.
/// Paths without an extension are ignored.
pub fn dominant_extension<P: AsRef<Path>>(paths: &[P]) -> Option<&OsStr> {
    let mut counts: Vec<(&OsStr, usize)> = Vec::new();
    for ext in paths.iter().filter_map(|p| p.as_ref().extension()) {
        match counts.iter_mut().find(|(seen, _)| *seen == ext) {
            Some((_, n)) => *n += 1,
            None => counts.push((ext, 1)),
        }
    }
    let max = counts.iter().map(|(_, n)| *n).max()?;
    counts.into_iter().find(|(_, n)| *n == max).map(|(ext, _)| ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry_point::SymbolTable;
    use std::path::PathBuf;

    const MANIFEST: &str = r#"
name: flim-demo
display_name: FLIM Demo
contributions:
  commands:
    - id: flim-demo.get_reader
      python_name: flim_demo._reader:napari_get_reader
      title: Open FLIM data
    - id: flim-demo.get_csv_reader
      python_name: flim_demo._reader:read_csv_table
      title: Open phasor table
    - id: flim-demo.load_hazelnut
      python_name: flim_demo._sample_data:load_hazelnut_image
      title: Load hazelnut
    - id: flim-demo.phasor
      python_name: flim_demo._widget:make_flim_phasor_plot
      title: Calculate phasors
  readers:
    - command: flim-demo.get_reader
      accepts_directories: true
      filename_patterns: ["*.ptu", "*.PTU", "*.sdt", "*.SDT", "*.tif", "*.zarr"]
    - command: flim-demo.get_csv_reader
      filename_patterns: ["*.csv", "*.tif"]
  sample_data:
    - command: flim-demo.load_hazelnut
      display_name: Hazelnut (FLIM single image)
      key: hazelnut
  widgets:
    - command: flim-demo.phasor
      display_name: Calculate Phasors
"#;

    fn table() -> RegistrationTable {
        let manifest = PluginManifest::from_yaml_str(MANIFEST).unwrap();
        RegistrationTable::load(manifest, ValidationOptions::default()).unwrap()
    }

    fn commands_of<'a>(readers: &[&'a ReaderContribution]) -> Vec<&'a str> {
        readers.iter().map(|r| r.command.as_str()).collect()
    }

    #[test]
    fn lookups_by_id_and_key() {
        let table = table();
        assert_eq!(table.name().as_str(), "flim-demo");
        assert_eq!(
            table.command("flim-demo.phasor").map(|c| c.title.as_str()),
            Some("Calculate phasors")
        );
        assert_eq!(
            table.entry_point("flim-demo.load_hazelnut").map(|e| e.to_string()),
            Some("flim_demo._sample_data:load_hazelnut_image".to_string())
        );
        assert!(table.command("flim-demo.missing").is_none());

        let sample = table.sample("hazelnut").unwrap();
        assert_eq!(sample.command.as_str(), "flim-demo.load_hazelnut");
        assert!(table.sample("seminal_receptacle").is_none());

        let widget = table.widget("Calculate Phasors").unwrap();
        assert_eq!(table.command(widget.command.as_str()).unwrap().id, widget.command);
    }

    #[test]
    fn uppercase_ptu_file_is_claimed() {
        let table = table();
        let readers = table.readers_for_path(Path::new("/data/sample.PTU"), PathKind::File);
        assert_eq!(commands_of(&readers), vec!["flim-demo.get_reader"]);
    }

    #[test]
    fn directories_go_to_readers_accepting_them() {
        let table = table();
        let readers = table.readers_for_path(Path::new("/data/run_01"), PathKind::Directory);
        assert_eq!(commands_of(&readers), vec!["flim-demo.get_reader"]);
    }

    #[test]
    fn unclaimed_extension_has_no_reader() {
        let table = table();
        assert!(
            table
                .readers_for_path(Path::new("sample.xlsx"), PathKind::File)
                .is_empty()
        );
        assert!(
            table
                .readers_for_path(Path::new("sample.Tif"), PathKind::File)
                .is_empty()
        );
    }

    #[test]
    fn reader_without_patterns_claims_only_directories() {
        let manifest = PluginManifest::from_yaml_str(
            r#"
name: flim-folders
display_name: FLIM folders
contributions:
  commands:
    - id: flim-folders.read_folder
      python_name: flim_folders._reader:read_folder
      title: Open FLIM folder
  readers:
    - command: flim-folders.read_folder
      accepts_directories: true
"#,
        )
        .unwrap();
        assert!(manifest.contributions.readers[0].filename_patterns.is_empty());
        let table = RegistrationTable::load(manifest, ValidationOptions::default()).unwrap();

        for file in ["sample.ptu", "run_01", ".hidden", "stack.tif"] {
            assert!(
                table
                    .readers_for_path(Path::new(file), PathKind::File)
                    .is_empty(),
                "{file} should not be claimed"
            );
        }
        let readers = table.readers_for_path(Path::new("/data/run_01"), PathKind::Directory);
        assert_eq!(commands_of(&readers), vec!["flim-folders.read_folder"]);
        assert!(
            table
                .readers_for_stack(&["a.ptu", "b.ptu"])
                .is_empty()
        );
    }

    #[test]
    fn overlapping_patterns_keep_declaration_order() {
        let table = table();
        let readers = table.readers_for_path(Path::new("stack.tif"), PathKind::File);
        assert_eq!(
            commands_of(&readers),
            vec!["flim-demo.get_reader", "flim-demo.get_csv_reader"]
        );
    }

    #[test]
    fn stack_uses_dominant_extension() {
        let table = table();
        let paths = [
            PathBuf::from("cell_t001_z001.ptu"),
            PathBuf::from("notes.csv"),
            PathBuf::from("cell_t001_z002.ptu"),
        ];
        let readers = table.readers_for_stack(&paths);
        assert_eq!(commands_of(&readers), vec!["flim-demo.get_reader"]);

        let empty: [PathBuf; 0] = [];
        assert!(table.readers_for_stack(&empty).is_empty());
    }

    #[test]
    fn dominant_extension_ties_go_to_first_seen() {
        assert_eq!(
            dominant_extension(&["a.sdt", "b.ptu", "c.ptu", "d.sdt"]),
            Some(OsStr::new("sdt"))
        );
        assert_eq!(dominant_extension(&["README", "Makefile"]), None);
    }

    #[test]
    fn probe_distinguishes_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("image.ptu");
        std::fs::write(&file, b"PQTTTR").unwrap();

        assert_eq!(PathKind::probe(dir.path()), PathKind::Directory);
        assert_eq!(PathKind::probe(&file), PathKind::File);
        assert_eq!(PathKind::probe(&dir.path().join("missing.ptu")), PathKind::File);
    }

    #[test]
    fn loading_twice_yields_identical_tables() {
        assert_eq!(table(), table());
    }

    #[test]
    fn load_fails_when_entry_point_missing() {
        let manifest = PluginManifest::from_yaml_str(MANIFEST).unwrap();
        let symbols = SymbolTable::new();
        let err = RegistrationTable::load(manifest, ValidationOptions::with_resolver(&symbols))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedEntryPoint { .. }));
    }

    #[test]
    fn table_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RegistrationTable>();

        let table = std::sync::Arc::new(table());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let table = std::sync::Arc::clone(&table);
                std::thread::spawn(move || table.readers().len())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 2);
        }
    }
}
