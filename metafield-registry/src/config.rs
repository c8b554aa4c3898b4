//! Registry configuration.
//!
//! Values are layered with figment: built-in defaults, then an optional
//! TOML/YAML/JSON file, then `METAFIELD_`-prefixed environment variables
//! (e.g. `METAFIELD_STORAGE_DIR=/var/lib/metafields`).

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "METAFIELD_";

/// Version string written into snapshots.
pub const REGISTRY_VERSION: &str = "1.0";

/// Configuration for a [`FieldRegistry`](crate::FieldRegistry).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory holding the snapshot and the per-field `fields/` directory.
    /// Without it, nothing is persisted unless a path is passed explicitly.
    pub storage_dir: Option<PathBuf>,
    pub registry_version: String,
    /// Snapshot file name, relative to `storage_dir`.
    pub snapshot_file: String,
    /// Write `fields/<name>.json` on every register/unregister.
    pub persist_incrementally: bool,
    /// Load `fields/*.json` when the registry is built.
    pub load_field_files_on_build: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            registry_version: REGISTRY_VERSION.to_string(),
            snapshot_file: "registry.json".to_string(),
            persist_incrementally: true,
            load_field_files_on_build: true,
        }
    }
}

impl RegistryConfig {
    /// Load configuration from defaults, an optional file, and the environment.
    ///
    /// The file format is chosen by extension (`.toml`, `.yaml`/`.yml`,
    /// otherwise JSON). A missing file contributes nothing.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(RegistryConfig::default()));

        if let Some(path) = file {
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                _ => figment.merge(Json::file(path)),
            };
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX));
        let config: RegistryConfig = figment.extract()?;
        debug!(storage_dir = ?config.storage_dir, "loaded registry configuration");
        Ok(config)
    }

    /// Full path of the snapshot file, if storage is configured.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.storage_dir
            .as_ref()
            .map(|dir| dir.join(&self.snapshot_file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_have_no_storage() {
        let config = RegistryConfig::default();
        assert!(config.storage_dir.is_none());
        assert!(config.snapshot_path().is_none());
        assert_eq!(config.registry_version, REGISTRY_VERSION);
    }

    #[test]
    fn loads_toml_file_over_defaults() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("registry.toml");
        std::fs::write(
            &file,
            "storage_dir = \"/srv/fields\"\nsnapshot_file = \"all.json\"\npersist_incrementally = false\n",
        )
        .unwrap();

        let config = RegistryConfig::load(Some(&file)).unwrap();
        assert_eq!(config.storage_dir, Some(PathBuf::from("/srv/fields")));
        assert!(!config.persist_incrementally);
        assert!(config.load_field_files_on_build);
        assert_eq!(
            config.snapshot_path(),
            Some(PathBuf::from("/srv/fields/all.json"))
        );
    }

    #[test]
    fn loads_yaml_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("registry.yaml");
        std::fs::write(&file, "registry_version: \"2.1\"\n").unwrap();
        let config = RegistryConfig::load(Some(&file)).unwrap();
        assert_eq!(config.registry_version, "2.1");
    }
}
