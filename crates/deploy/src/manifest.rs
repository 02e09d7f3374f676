//! Deployment manifest: what to deploy, where, and where to record it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactStore;
use crate::errors::Error;
use crate::unit::{ContractUnit, strip_hex_prefix};

/// The default name for the kiln manifest file.
pub const MANIFEST_FILENAME: &str = "Kiln.toml";

/// Default confirmation timeout, in seconds.
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("build/contracts")
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("config/contract_addresses.json")
}

fn default_confirmation_timeout_secs() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}

/// Declarative description of one deployment run.
///
/// Serialized to/from TOML:
///
/// ```toml
/// rpc_url = "http://127.0.0.1:8545"
/// artifacts_dir = "build/contracts"
/// registry_path = "config/contract_addresses.json"
///
/// [[contracts]]
/// name = "DataFactModel"
///
/// [[contracts]]
/// name = "HashStorage"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// JSON-RPC endpoint of the target network.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Directory holding compiled contract artifacts.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    /// Path of the address registry written on success.
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    /// Sender account for deployment transactions. Defaults to the first
    /// unlocked account the node reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Maximum time to wait for each deployment to be mined, in seconds.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    /// Ordered list of contracts to deploy.
    pub contracts: Vec<ContractEntry>,
}

/// One contract entry of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEntry {
    /// Artifact/contract name.
    pub name: String,
    /// Pre-ABI-encoded constructor words (0x-prefixed hex), in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constructor_args: Vec<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            artifacts_dir: default_artifacts_dir(),
            registry_path: default_registry_path(),
            sender: None,
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            contracts: Vec::new(),
        }
    }
}

impl Manifest {
    /// Save the manifest to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize manifest to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write manifest to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Manifest saved");
        Ok(())
    }

    /// Load the manifest from a TOML file.
    ///
    /// If `path` is a directory, `Kiln.toml` inside it is read.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Manifest file or directory not found: {}", path.display());
        }

        let manifest_path = if path.is_dir() {
            path.join(MANIFEST_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&manifest_path).context(format!(
            "Failed to read manifest from {}",
            manifest_path.display()
        ))?;
        let manifest: Self =
            toml::from_str(&content).context("Failed to parse manifest as TOML")?;
        tracing::info!(path = %manifest_path.display(), "Manifest loaded");
        Ok(manifest)
    }

    /// Resolve the manifest entries into deployable units.
    ///
    /// Loads each contract's init code from the artifact store and
    /// validates the constructor words, so every plan defect surfaces here,
    /// before any network interaction.
    pub fn resolve_units(&self, store: &ArtifactStore) -> Result<Vec<ContractUnit>, Error> {
        let mut units = Vec::with_capacity(self.contracts.len());

        for entry in &self.contracts {
            for arg in &entry.constructor_args {
                hex::decode(strip_hex_prefix(arg)).map_err(|e| {
                    Error::Configuration(format!(
                        "constructor argument `{arg}` of `{}` is not valid hex: {e}",
                        entry.name
                    ))
                })?;
            }

            let init_code = store.load_init_code(&entry.name)?;
            units.push(
                ContractUnit::new(entry.name.clone(), init_code)
                    .with_args(entry.constructor_args.clone()),
            );
        }

        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_toml_round_trip() {
        let manifest = Manifest {
            rpc_url: "http://127.0.0.1:7545".to_string(),
            sender: Some("0x90F8bf6A479f320ead074411a4B0e7944Ea8c9C1".to_string()),
            contracts: vec![
                ContractEntry {
                    name: "DataFactModel".to_string(),
                    constructor_args: vec![],
                },
                ContractEntry {
                    name: "HashStorage".to_string(),
                    constructor_args: vec!["0x00000000000000000000000000000000000000000000000000000000000000ff".to_string()],
                },
            ],
            ..Default::default()
        };

        let temp_dir = TempDir::new("kiln-manifest").unwrap();
        let path = temp_dir.path().join(MANIFEST_FILENAME);

        manifest.save_to_file(&path).expect("Failed to save manifest");
        let loaded = Manifest::load_from_file(&path).expect("Failed to load manifest");

        assert_eq!(manifest, loaded);
    }

    #[test]
    fn test_load_from_directory_uses_default_filename() {
        let temp_dir = TempDir::new("kiln-manifest").unwrap();
        let manifest = Manifest::default();
        manifest
            .save_to_file(&temp_dir.path().join(MANIFEST_FILENAME))
            .unwrap();

        let loaded = Manifest::load_from_file(temp_dir.path()).unwrap();
        assert_eq!(loaded.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(loaded.registry_path, PathBuf::from("config/contract_addresses.json"));
    }

    #[test]
    fn test_minimal_manifest_parses_with_defaults() {
        let manifest: Manifest = toml::from_str(
            r#"
            [[contracts]]
            name = "HashStorage"
            "#,
        )
        .unwrap();

        assert_eq!(manifest.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(manifest.confirmation_timeout_secs, 120);
        assert_eq!(manifest.contracts.len(), 1);
        assert!(manifest.contracts[0].constructor_args.is_empty());
    }

    #[test]
    fn test_resolve_units_loads_init_code_in_order() {
        let temp_dir = TempDir::new("kiln-manifest").unwrap();
        std::fs::write(
            temp_dir.path().join("DataFactModel.json"),
            r#"{"bytecode": "0x6001"}"#,
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("HashStorage.json"),
            r#"{"bytecode": "0x6002"}"#,
        )
        .unwrap();

        let manifest = Manifest {
            contracts: vec![
                ContractEntry {
                    name: "DataFactModel".to_string(),
                    constructor_args: vec![],
                },
                ContractEntry {
                    name: "HashStorage".to_string(),
                    constructor_args: vec![],
                },
            ],
            ..Default::default()
        };

        let store = ArtifactStore::new(temp_dir.path());
        let units = manifest.resolve_units(&store).unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].name, "DataFactModel");
        assert_eq!(units[0].init_code, "0x6001");
        assert_eq!(units[1].name, "HashStorage");
        assert_eq!(units[1].init_code, "0x6002");
    }

    #[test]
    fn test_resolve_units_rejects_bad_constructor_hex() {
        let temp_dir = TempDir::new("kiln-manifest").unwrap();
        std::fs::write(
            temp_dir.path().join("HashStorage.json"),
            r#"{"bytecode": "0x6002"}"#,
        )
        .unwrap();

        let manifest = Manifest {
            contracts: vec![ContractEntry {
                name: "HashStorage".to_string(),
                constructor_args: vec!["0xzz".to_string()],
            }],
            ..Default::default()
        };

        let store = ArtifactStore::new(temp_dir.path());
        let err = manifest.resolve_units(&store).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
