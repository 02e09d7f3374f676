use std::path::PathBuf;

use clap::Parser;
use kiln_deploy::MANIFEST_FILENAME;
use tracing::level_filters::LevelFilter;

/// A JSON-RPC endpoint, either a well-known local node or a custom URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Endpoint {
    /// A development node on the default local port.
    Localhost,
    #[strum(default)]
    Custom(String),
}

impl Endpoint {
    pub fn to_rpc_url(&self) -> String {
        match self {
            Endpoint::Localhost => "http://127.0.0.1:8545".to_string(),
            Endpoint::Custom(url) => url.clone(),
        }
    }
}

#[derive(Parser)]
#[command(name = "kiln")]
#[command(
    author,
    version,
    about = "Deploy precompiled contracts in order and record their addresses"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "KILN_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the deployment manifest (or a directory containing one).
    #[arg(short, long, alias = "conf", env = "KILN_CONFIG", default_value = MANIFEST_FILENAME)]
    pub config: PathBuf,

    /// The JSON-RPC endpoint to deploy to (name or URL).
    ///
    /// Overrides the manifest's `rpc_url` when provided.
    #[arg(long, alias = "rpc-url", env = "KILN_RPC")]
    pub rpc: Option<Endpoint>,

    /// Overrides the manifest's registry output path when provided.
    #[arg(long, env = "KILN_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Redeploy even if a registry file already exists.
    ///
    /// Without this flag an existing registry makes the run a no-op.
    #[arg(long, env = "KILN_FORCE", default_value_t = false)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_endpoint_parses_known_and_custom_values() {
        assert_eq!(Endpoint::from_str("localhost").unwrap(), Endpoint::Localhost);
        assert_eq!(
            Endpoint::from_str("http://10.0.0.2:7545").unwrap(),
            Endpoint::Custom("http://10.0.0.2:7545".to_string())
        );
    }

    #[test]
    fn test_endpoint_urls() {
        assert_eq!(Endpoint::Localhost.to_rpc_url(), "http://127.0.0.1:8545");
        assert_eq!(
            Endpoint::Custom("http://10.0.0.2:7545".to_string()).to_rpc_url(),
            "http://10.0.0.2:7545"
        );
    }
}
