//! Error kinds surfaced by a deployment run.

use std::path::PathBuf;

/// Errors produced while sequencing, deploying, or persisting a run.
///
/// The variants are deliberately coarse: callers branch on the kind of
/// failure (bad plan, failed deployment, failed persistence), while the
/// underlying `anyhow` cause keeps the full context chain for logs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The deployment plan is malformed and no network call was made.
    #[error("invalid deployment plan: {0}")]
    Configuration(String),

    /// A single contract deployment failed; the remaining sequence was
    /// aborted and no registry was produced.
    #[error("deployment of `{unit}` failed: {cause:#}")]
    Deployment {
        /// Name of the contract unit whose deployment failed.
        unit: String,
        /// Underlying network or transaction failure.
        cause: anyhow::Error,
    },

    /// The registry could not be written after a fully successful run.
    ///
    /// The on-chain side effects already happened and are not reversible,
    /// so callers must log the in-memory registry before bailing out.
    #[error("failed to persist registry to {}: {:#}", .path.display(), .cause)]
    Persistence {
        /// Target registry path.
        path: PathBuf,
        /// Underlying filesystem or serialization failure.
        cause: anyhow::Error,
    },

    /// The run was cancelled between units; `unit` was never dispatched.
    #[error("deployment cancelled before dispatching `{unit}`")]
    Cancelled {
        /// Name of the first unit that was not dispatched.
        unit: String,
    },

    /// Another run holds the registry lock for the same output directory.
    #[error("another deployment is in progress (lock held at {})", .path.display())]
    Locked {
        /// Path of the contended lock file.
        path: PathBuf,
    },
}
