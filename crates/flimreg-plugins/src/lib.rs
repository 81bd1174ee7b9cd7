pub mod builtin;
pub mod entry_point;
pub mod loader;
pub mod manifest;
pub mod pattern;
pub mod table;
pub mod traits;
pub mod validate;

pub use entry_point::{EntryPointRef, EntryPointResolver, SourceTreeResolver, SymbolTable};
pub use loader::{PluginLoader, PluginRegistry};
pub use manifest::{
    CommandContribution, Contributions, ManifestFormat, PluginManifest, ReaderContribution,
    SampleDataContribution, WidgetContribution,
};
pub use pattern::FilenamePattern;
pub use table::{PathKind, RegistrationTable};
pub use traits::CommandBinding;
pub use validate::{ValidationOptions, validate, validate_all};
