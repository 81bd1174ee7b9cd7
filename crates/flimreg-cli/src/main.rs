mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use flimreg_config::{AppConfig, ConfigLoader};
use flimreg_plugins::{
    EntryPointResolver, PathKind, PluginLoader, PluginManifest, PluginRegistry, RegistrationTable,
    SourceTreeResolver, ValidationOptions, builtin, validate_all,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "flimreg",
    version,
    about = "flimreg - validate and inspect FLIM phasor plugin manifests"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Configuration directory (defaults to the XDG config dir)
    #[arg(long, env = "FLIMREG_CONFIG_DIR", global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one or more manifest files
    Validate {
        #[arg(required = true)]
        manifests: Vec<PathBuf>,

        /// Source root used to resolve python_name entry points (repeatable)
        #[arg(long = "source-root")]
        source_roots: Vec<PathBuf>,

        /// Allow command ids that are not prefixed with the plugin name
        #[arg(long)]
        lenient_namespace: bool,

        /// Revalidate whenever a manifest changes
        #[arg(long)]
        watch: bool,
    },

    /// Print the normalized registration table
    Show {
        /// Manifest file (defaults to the bundled FLIM phasor plotter manifest)
        manifest: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },

    /// Show which reader claims each path
    Match {
        /// Manifest file (defaults to the bundled FLIM phasor plotter manifest)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Treat all paths as a single stack
        #[arg(long)]
        stack: bool,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Inspect installed plugins
    Plugin {
        #[command(subcommand)]
        action: PluginCommands,
    },
}

#[derive(Subcommand)]
enum PluginCommands {
    /// List installed plugins
    List,
    /// Show every contribution of one plugin
    Info { name: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new(),
    };
    let config = config_loader.load()?;

    let log_level = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate {
            manifests,
            source_roots,
            lenient_namespace,
            watch,
        } => {
            let roots = if source_roots.is_empty() {
                config.source_roots.clone()
            } else {
                source_roots
            };
            let resolver = (!roots.is_empty()).then(|| SourceTreeResolver::new(roots));
            let options = ValidationOptions {
                strict_namespace: config.strict_namespace && !lenient_namespace,
                resolver: resolver.as_ref().map(|r| r as &dyn EntryPointResolver),
            };

            let all_valid = validate_files(&manifests, options);
            if watch {
                watch_and_validate(&manifests, options)?;
            } else if !all_valid {
                bail!("one or more manifests are invalid");
            }
        }
        Commands::Show { manifest, format } => {
            let table = load_table(manifest.as_deref(), &config)?;
            let rendered = match format {
                OutputFormat::Yaml => table.manifest().to_yaml()?,
                OutputFormat::Json => table.manifest().to_json()?,
            };
            println!("{}", rendered.trim_end());
        }
        Commands::Match {
            manifest,
            stack,
            paths,
        } => {
            let table = load_table(manifest.as_deref(), &config)?;
            if stack {
                let readers = table.readers_for_stack(&paths);
                let label = format!("stack of {} path(s)", paths.len());
                println!(
                    "{}",
                    report::claims(Path::new(&label), PathKind::File, &readers)
                );
            } else {
                for path in &paths {
                    let kind = PathKind::probe(path);
                    let readers = table.readers_for_path(path, kind);
                    println!("{}", report::claims(path, kind, &readers));
                }
            }
        }
        Commands::Plugin { action } => {
            config_loader.ensure_dirs()?;
            let registry = build_registry(&config_loader, &config);
            let count = registry.reload()?;
            info!("{count} plugin(s) registered");

            match action {
                PluginCommands::List => {
                    println!("Installed plugins:");
                    let tables = registry.list()?;
                    if tables.is_empty() {
                        println!("  (none)");
                    }
                    for table in tables {
                        println!("{}", report::summary(&table));
                    }
                }
                PluginCommands::Info { name } => match registry.get(&name)? {
                    Some(table) => print!("{}", report::details(&table)),
                    None => bail!("plugin '{name}' not found"),
                },
            }
        }
    }

    Ok(())
}

/// Validate every manifest and print a report. Returns true when all pass.
fn validate_files(manifests: &[PathBuf], options: ValidationOptions<'_>) -> bool {
    let mut all_valid = true;
    for path in manifests {
        let errors = match PluginManifest::from_file(path) {
            Ok(manifest) => validate_all(&manifest, options),
            Err(e) => match e.as_config() {
                Some(config_err) => vec![config_err.clone()],
                None => {
                    println!("{} {}: {e}", "✗".red(), path.display());
                    all_valid = false;
                    continue;
                }
            },
        };
        all_valid &= errors.is_empty();
        print!("{}", report::validation(path, &errors));
    }
    all_valid
}

fn watch_and_validate(manifests: &[PathBuf], options: ValidationOptions<'_>) -> Result<()> {
    let (_watcher, rx) = flimreg_plugins::loader::watch_files(manifests)?;
    info!("watching {} manifest(s) for changes", manifests.len());

    while rx.recv().is_ok() {
        // collapse bursts of events from a single save
        while rx.try_recv().is_ok() {}
        println!();
        validate_files(manifests, options);
    }
    warn!("watcher stopped");
    Ok(())
}

fn load_table(manifest: Option<&Path>, config: &AppConfig) -> Result<RegistrationTable> {
    match manifest {
        Some(path) => {
            let options = ValidationOptions {
                strict_namespace: config.strict_namespace,
                resolver: None,
            };
            RegistrationTable::from_file(path, options)
                .with_context(|| format!("failed to load {}", path.display()))
        }
        None => Ok(builtin::flim_phasor_table()?),
    }
}

fn build_registry(config_loader: &ConfigLoader, config: &AppConfig) -> PluginRegistry {
    let mut loader = PluginLoader::new(config_loader.plugins_dir(config))
        .strict_namespace(config.strict_namespace);
    if !config.source_roots.is_empty() {
        loader = loader.with_resolver(Arc::new(SourceTreeResolver::new(
            config.source_roots.clone(),
        )));
    }
    PluginRegistry::new(loader).with_builtin(config.include_builtin)
}
