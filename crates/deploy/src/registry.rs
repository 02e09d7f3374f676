//! Deployment registry: the ordered name → address record of one run.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use fs2::FileExt;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::Error;

/// File name of the advisory lock guarding a registry directory.
pub const LOCK_FILENAME: &str = ".kiln.lock";

/// The confirmed outcome of deploying one contract unit.
///
/// Created the moment the deployment transaction is confirmed and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    /// Name of the deployed contract unit.
    pub name: String,
    /// Network-assigned address, stored verbatim as returned by the
    /// deploy capability.
    pub address: String,
    /// 0-based position of this unit in the deployment sequence.
    pub deployed_at: usize,
}

/// Ordered mapping of contract name to deployment record for one run.
///
/// Serializes as a flat JSON object whose key order is the deployment
/// order, the format downstream tooling reads back:
///
/// ```json
/// {
///   "DataFactModel": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
///   "HashStorage": "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, derive_more::Deref, derive_more::From)]
pub struct DeploymentRegistry {
    records: Vec<DeploymentRecord>,
}

impl DeploymentRegistry {
    /// Look up the record for a contract name.
    pub fn get(&self, name: &str) -> Option<&DeploymentRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Look up just the address for a contract name.
    pub fn address_of(&self, name: &str) -> Option<&str> {
        self.get(name).map(|r| r.address.as_str())
    }

    /// Atomically write the registry as pretty-printed JSON to `path`.
    ///
    /// The parent directory must already exist. The registry is written to
    /// a temporary file in the same directory and renamed over the target,
    /// so a pre-existing registry is either fully replaced or untouched.
    pub fn write_atomic(&self, path: &Path) -> Result<(), Error> {
        let persist = |cause: anyhow::Error| Error::Persistence {
            path: path.to_path_buf(),
            cause,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !parent.exists() {
            return Err(persist(anyhow!(
                "output directory {} does not exist",
                parent.display()
            )));
        }

        let mut json = serde_json::to_string_pretty(self)
            .context("failed to serialize registry")
            .map_err(persist)?;
        json.push('\n');

        let file_name = path
            .file_name()
            .ok_or_else(|| persist(anyhow!("registry path has no file name")))?;
        let tmp = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))
            .map_err(persist)?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to replace {}", path.display()))
            .map_err(persist)?;

        Ok(())
    }

    /// Load a registry file written by [`write_atomic`](Self::write_atomic).
    ///
    /// Record order follows the key order of the document and addresses are
    /// kept byte-for-byte as stored.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let persist = |cause: anyhow::Error| Error::Persistence {
            path: path.to_path_buf(),
            cause,
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read registry from {}", path.display()))
            .map_err(persist)?;

        serde_json::from_str(&content)
            .context("failed to parse registry JSON")
            .map_err(persist)
    }
}

impl Serialize for DeploymentRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(&record.name, &record.address)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DeploymentRegistry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RegistryVisitor;

        impl<'de> Visitor<'de> for RegistryVisitor {
            type Value = DeploymentRegistry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a map of contract name to address")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut records = Vec::new();
                while let Some((name, address)) = access.next_entry::<String, String>()? {
                    let deployed_at = records.len();
                    records.push(DeploymentRecord {
                        name,
                        address,
                        deployed_at,
                    });
                }
                Ok(DeploymentRegistry { records })
            }
        }

        deserializer.deserialize_map(RegistryVisitor)
    }
}

/// Exclusive advisory lock on a registry directory.
///
/// Two runs targeting the same output directory would race on the rename;
/// the second acquisition fails fast with [`Error::Locked`] before any
/// network call is made. Released when the guard is dropped.
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Acquire the lock for `dir`, failing immediately if another run
    /// already holds it.
    pub fn acquire(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(LOCK_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open lock file {}", path.display()))
            .map_err(|cause| Error::Persistence {
                path: path.clone(),
                cause,
            })?;

        file.try_lock_exclusive()
            .map_err(|_| Error::Locked { path: path.clone() })?;

        Ok(Self { file, path })
    }

    /// Path of the lock file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
