//! Loading precompiled contract artifacts.

use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::Error;
use crate::unit::strip_hex_prefix;

/// Resolves contract names to their compiled init code.
///
/// Artifacts live as `<dir>/<Name>.json`, the layout produced by the
/// contract build toolchain, with the deployable bytecode under the
/// `bytecode` key. The store is handed explicitly to whoever assembles the
/// deployment plan; nothing resolves artifacts from ambient state.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

/// The subset of a compiled artifact the deployer cares about.
#[derive(Debug, Deserialize)]
struct Artifact {
    #[serde(default)]
    bytecode: Option<String>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the deployable init code for a named contract.
    ///
    /// Fails with a configuration error if the artifact is missing,
    /// unparsable, or carries no concrete bytecode (interfaces and
    /// abstract contracts compile to an empty `bytecode` field).
    pub fn load_init_code(&self, name: &str) -> Result<String, Error> {
        let path = self.dir.join(format!("{name}.json"));

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Configuration(format!(
                "failed to read artifact for `{name}` at {}: {e}",
                path.display()
            ))
        })?;

        let artifact: Artifact = serde_json::from_str(&content).map_err(|e| {
            Error::Configuration(format!("artifact for `{name}` is not valid JSON: {e}"))
        })?;

        let bytecode = artifact
            .bytecode
            .filter(|b| !strip_hex_prefix(b).is_empty())
            .ok_or_else(|| {
                Error::Configuration(format!("artifact for `{name}` has no deployable bytecode"))
            })?;

        hex::decode(strip_hex_prefix(&bytecode)).map_err(|e| {
            Error::Configuration(format!("artifact for `{name}` has malformed bytecode: {e}"))
        })?;

        Ok(bytecode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn write_artifact(dir: &TempDir, name: &str, body: &str) {
        std::fs::write(dir.path().join(format!("{name}.json")), body).unwrap();
    }

    #[test]
    fn test_loads_bytecode() {
        let dir = TempDir::new("kiln-artifacts").unwrap();
        write_artifact(
            &dir,
            "HashStorage",
            r#"{"contractName": "HashStorage", "abi": [], "bytecode": "0x6080604052"}"#,
        );

        let store = ArtifactStore::new(dir.path());
        assert_eq!(store.load_init_code("HashStorage").unwrap(), "0x6080604052");
    }

    #[test]
    fn test_missing_artifact_is_configuration_error() {
        let dir = TempDir::new("kiln-artifacts").unwrap();
        let store = ArtifactStore::new(dir.path());

        let err = store.load_init_code("Nonexistent").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("Nonexistent"));
    }

    #[test]
    fn test_empty_bytecode_is_rejected() {
        let dir = TempDir::new("kiln-artifacts").unwrap();
        write_artifact(&dir, "IFace", r#"{"contractName": "IFace", "bytecode": "0x"}"#);

        let store = ArtifactStore::new(dir.path());
        let err = store.load_init_code("IFace").unwrap_err();
        assert!(err.to_string().contains("no deployable bytecode"));
    }

    #[test]
    fn test_malformed_bytecode_is_rejected() {
        let dir = TempDir::new("kiln-artifacts").unwrap();
        write_artifact(&dir, "Bad", r#"{"bytecode": "0xnothex"}"#);

        let store = ArtifactStore::new(dir.path());
        let err = store.load_init_code("Bad").unwrap_err();
        assert!(err.to_string().contains("malformed bytecode"));
    }
}
