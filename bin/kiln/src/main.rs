//! kiln is a CLI tool that deploys an ordered set of precompiled contracts
//! and records their addresses in a JSON registry.

mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use url::Url;

use cli::Cli;
use kiln_deploy::{ArtifactStore, Manifest, RpcDeployer, RunLock, Sequencer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let mut manifest = Manifest::load_from_file(&cli.config)?;

    // CLI overrides take precedence over the manifest.
    if let Some(endpoint) = &cli.rpc {
        manifest.rpc_url = endpoint.to_rpc_url();
    }
    if let Some(registry) = cli.registry {
        manifest.registry_path = registry;
    }

    deploy(manifest, cli.force).await
}

async fn deploy(manifest: Manifest, force: bool) -> Result<()> {
    let registry_path = manifest.registry_path.clone();

    if registry_path.exists() && !force {
        tracing::info!(
            path = %registry_path.display(),
            "Registry already exists, skipping deployment (use --force to redeploy)"
        );
        return Ok(());
    }

    let units = manifest.resolve_units(&ArtifactStore::new(&manifest.artifacts_dir))?;

    tracing::info!(
        rpc_url = %manifest.rpc_url,
        contracts = units.len(),
        "Starting deployment run..."
    );

    // Hold the registry directory lock for the whole run so concurrent runs
    // against the same output path fail fast instead of racing.
    let lock_dir = match registry_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let _lock = RunLock::acquire(lock_dir)?;

    // Ctrl+C aborts between deployments; an in-flight transaction is left
    // to the chain, since submitted transactions cannot be recalled.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, aborting before the next deployment");
            let _ = cancel_tx.send(true);
        }
    });

    let rpc_url = Url::parse(&manifest.rpc_url)
        .with_context(|| format!("Invalid RPC URL: {}", manifest.rpc_url))?;
    let mut deployer = RpcDeployer::new(rpc_url)?
        .confirmation_timeout(Duration::from_secs(manifest.confirmation_timeout_secs));
    if let Some(sender) = &manifest.sender {
        deployer = deployer.sender(sender);
    }

    let registry = Sequencer::with_cancellation(cancel_rx)
        .run(&units, &deployer)
        .await?;

    if let Err(err) = registry.write_atomic(&registry_path) {
        // The contracts are already on chain; dump the addresses so a human
        // can recover the registry by hand.
        let dump = serde_json::to_string_pretty(&registry)
            .expect("registry serialization should never fail");
        tracing::error!(registry = %dump, "Registry write failed; recorded addresses follow");
        return Err(err.into());
    }

    tracing::info!(
        path = %registry_path.display(),
        contracts = registry.len(),
        "Deployment registry written"
    );

    Ok(())
}
