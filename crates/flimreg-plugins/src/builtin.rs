//! Manifest of the FLIM phasor plotter plugin, embedded at compile time.

use flimreg_common::ConfigError;

use crate::manifest::PluginManifest;
use crate::table::RegistrationTable;
use crate::validate::ValidationOptions;

pub const FLIM_PHASOR_MANIFEST: &str = include_str!("../manifests/napari.yaml");

pub fn flim_phasor_manifest() -> Result<PluginManifest, ConfigError> {
    PluginManifest::from_yaml_str(FLIM_PHASOR_MANIFEST)
}

pub fn flim_phasor_table() -> Result<RegistrationTable, ConfigError> {
    RegistrationTable::load(flim_phasor_manifest()?, ValidationOptions::default())
}
