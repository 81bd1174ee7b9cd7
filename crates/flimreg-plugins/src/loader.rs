use crate::builtin;
use crate::entry_point::EntryPointResolver;
use crate::manifest::ReaderContribution;
use crate::table::{PathKind, RegistrationTable};
use crate::validate::ValidationOptions;
use flimreg_common::{ConfigError, Error, PluginName, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

/// Manifest file names looked up inside a plugin directory, in priority order.
pub const MANIFEST_FILE_NAMES: [&str; 4] =
    ["napari.yaml", "napari.yml", "napari.toml", "napari.json"];

/// Discovers and loads plugin manifests from the plugins directory.
#[derive(Clone)]
pub struct PluginLoader {
    plugins_dir: PathBuf,
    strict_namespace: bool,
    resolver: Option<Arc<dyn EntryPointResolver>>,
}

impl PluginLoader {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            strict_namespace: true,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn EntryPointResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn strict_namespace(mut self, strict: bool) -> Self {
        self.strict_namespace = strict;
        self
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    pub fn options(&self) -> ValidationOptions<'_> {
        ValidationOptions {
            strict_namespace: self.strict_namespace,
            resolver: self.resolver.as_deref(),
        }
    }

    /// Manifest file inside `plugin_dir`, if any.
    pub fn manifest_path(plugin_dir: &Path) -> Option<PathBuf> {
        MANIFEST_FILE_NAMES
            .iter()
            .map(|name| plugin_dir.join(name))
            .find(|path| path.is_file())
    }

    /// Scan the plugins directory and return every plugin that loads cleanly.
    /// Plugins with an invalid manifest are skipped as a whole.
    pub fn discover(&self) -> Result<Vec<RegistrationTable>> {
        if !self.plugins_dir.exists() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.plugins_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();

        let mut tables = Vec::new();
        for path in dirs {
            if Self::manifest_path(&path).is_none() {
                debug!("skipping {}: no manifest", path.display());
                continue;
            }
            match self.load_plugin(&path) {
                Ok(table) => {
                    info!("loaded plugin: {} ({})", table.name(), table.display_name());
                    tables.push(table);
                }
                Err(e) => warn!("failed to load plugin at {}: {}", path.display(), e),
            }
        }

        Ok(tables)
    }

    /// Load a single plugin directory, failing on any manifest error.
    pub fn load_plugin(&self, plugin_dir: &Path) -> Result<RegistrationTable> {
        let manifest_path = Self::manifest_path(plugin_dir).ok_or_else(|| {
            Error::NotFound(format!("no plugin manifest in {}", plugin_dir.display()))
        })?;
        RegistrationTable::from_file(&manifest_path, self.options())
    }

    /// Watch the plugins directory. The receiver gets a message whenever a
    /// file is created, modified or removed.
    pub fn watch(&self) -> Result<(RecommendedWatcher, Receiver<()>)> {
        let (mut watcher, rx) = event_watcher(|_| true)?;
        watch_path(&mut watcher, &self.plugins_dir, RecursiveMode::Recursive)?;
        Ok((watcher, rx))
    }
}

/// Watch individual files, such as manifests open in an editor.
///
/// The parent directories are watched rather than the files, so a save that
/// replaces the file through a rename is still reported. Events for other
/// entries in those directories are dropped.
pub fn watch_files(files: &[PathBuf]) -> Result<(RecommendedWatcher, Receiver<()>)> {
    let targets: HashSet<PathBuf> = files.iter().map(|f| normalize(f)).collect();
    let dirs = parent_dirs(&targets);
    let (mut watcher, rx) = event_watcher(move |paths| touches(&targets, paths))?;
    for dir in &dirs {
        watch_path(&mut watcher, dir, RecursiveMode::NonRecursive)?;
    }
    Ok((watcher, rx))
}

fn event_watcher<F>(wanted: F) -> Result<(RecommendedWatcher, Receiver<()>)>
where
    F: Fn(&[PathBuf]) -> bool + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let watcher =
        notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let changed =
                    event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove();
                if changed && wanted(&event.paths) {
                    let _ = tx.send(());
                }
            }
            Err(e) => error!("watch error: {}", e),
        })
        .map_err(|e| Error::Other(format!("failed to start watcher: {e}")))?;
    Ok((watcher, rx))
}

fn watch_path(watcher: &mut RecommendedWatcher, path: &Path, mode: RecursiveMode) -> Result<()> {
    if path.exists() {
        watcher
            .watch(path, mode)
            .map_err(|e| Error::Other(format!("failed to watch {}: {e}", path.display())))?;
    } else {
        warn!(
            "{} does not exist, changes to it will not be seen until restart",
            path.display()
        );
    }
    Ok(())
}

/// `path` with its parent directory canonicalized. The file itself need
/// not exist, which is the case between the two halves of a rename.
fn normalize(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let parent = parent
        .canonicalize()
        .unwrap_or_else(|_| parent.to_path_buf());
    match path.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    }
}

fn parent_dirs(targets: &HashSet<PathBuf>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = targets
        .iter()
        .filter_map(|target| target.parent().map(Path::to_path_buf))
        .collect();
    dirs.sort();
    dirs.dedup();
    dirs
}

fn touches(targets: &HashSet<PathBuf>, event_paths: &[PathBuf]) -> bool {
    event_paths
        .iter()
        .any(|path| targets.contains(&normalize(path)))
}

type PluginMap = HashMap<PluginName, Arc<RegistrationTable>>;

/// Registry of every loaded plugin, keyed by plugin name.
///
/// Individual tables are immutable; `reload` swaps the whole set.
pub struct PluginRegistry {
    loader: PluginLoader,
    include_builtin: bool,
    plugins: RwLock<PluginMap>,
}

impl PluginRegistry {
    pub fn new(loader: PluginLoader) -> Self {
        Self {
            loader,
            include_builtin: false,
            plugins: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_dir(plugins_dir: impl Into<PathBuf>) -> Self {
        Self::new(PluginLoader::new(plugins_dir))
    }

    /// Also register the bundled FLIM phasor plotter manifest on reload.
    /// A discovered plugin with the same name takes precedence.
    pub fn with_builtin(mut self, include: bool) -> Self {
        self.include_builtin = include;
        self
    }

    /// Reload all plugins, replacing the current registry contents.
    pub fn reload(&self) -> Result<usize> {
        let mut map = HashMap::new();
        if self.include_builtin {
            let table = builtin::flim_phasor_table()?;
            map.insert(table.name().clone(), Arc::new(table));
        }

        let mut discovered = HashSet::new();
        for table in self.loader.discover()? {
            let name = table.name().clone();
            if !discovered.insert(name.clone()) {
                warn!("duplicate plugin name {name}, keeping the first one found");
                continue;
            }
            if map.contains_key(&name) {
                info!("plugin {name} overrides the bundled manifest");
            }
            map.insert(name, Arc::new(table));
        }

        let mut guard = self.write_plugins()?;
        *guard = map;
        Ok(guard.len())
    }

    /// Register an already loaded table. Names must be unique.
    pub fn insert(&self, table: RegistrationTable) -> Result<()> {
        let mut guard = self.write_plugins()?;
        if guard.contains_key(table.name()) {
            return Err(ConfigError::DuplicatePlugin(table.name().to_string()).into());
        }
        guard.insert(table.name().clone(), Arc::new(table));
        Ok(())
    }

    /// Unload a plugin.
    pub fn remove(&self, name: &str) -> Result<Option<Arc<RegistrationTable>>> {
        Ok(self.write_plugins()?.remove(name))
    }

    /// All plugins, sorted by name.
    pub fn list(&self) -> Result<Vec<Arc<RegistrationTable>>> {
        let mut tables: Vec<_> = self.read_plugins()?.values().cloned().collect();
        tables.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(tables)
    }

    pub fn get(&self, name: &str) -> Result<Option<Arc<RegistrationTable>>> {
        Ok(self.read_plugins()?.get(name).cloned())
    }

    /// Readers across all plugins that claim `path`, ordered by plugin name.
    pub fn readers_for_path(
        &self,
        path: &Path,
        kind: PathKind,
    ) -> Result<Vec<(PluginName, ReaderContribution)>> {
        Ok(self
            .list()?
            .iter()
            .flat_map(|table| {
                table
                    .readers_for_path(path, kind)
                    .into_iter()
                    .map(|reader| (table.name().clone(), reader.clone()))
                    .collect::<Vec<_>>()
            })
            .collect())
    }

    fn read_plugins(&self) -> Result<RwLockReadGuard<'_, PluginMap>> {
        self.plugins
            .read()
            .map_err(|_| Error::Other("plugin registry lock poisoned".into()))
    }

    fn write_plugins(&self) -> Result<RwLockWriteGuard<'_, PluginMap>> {
        self.plugins
            .write()
            .map_err(|_| Error::Other("plugin registry lock poisoned".into()))
    }
}
