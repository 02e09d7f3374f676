//! Serialized contract deployment sequencing.

use std::collections::HashSet;

use tokio::sync::watch;

use crate::errors::Error;
use crate::registry::{DeploymentRecord, DeploymentRegistry};
use crate::unit::ContractUnit;

/// The capability that actually lands a deployment on chain.
///
/// `deploy` suspends until the network confirms (or rejects) the
/// deployment transaction and returns the assigned contract address.
/// Implementations own any retry policy; the sequencer performs none.
#[allow(async_fn_in_trait)]
pub trait DeployCapability {
    /// Deploy a single unit and return its confirmed address.
    async fn deploy(&self, unit: &ContractUnit) -> anyhow::Result<String>;
}

/// Deploys an ordered list of contract units, one at a time.
///
/// Unit *i+1* is never dispatched before unit *i*'s address has been
/// confirmed: most networks require monotonically increasing transaction
/// nonces per sender, and parallel submission would race on the nonce.
#[derive(Debug, Default)]
pub struct Sequencer {
    cancel: Option<watch::Receiver<bool>>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a cancellation signal.
    ///
    /// When the sender side flips the value to `true`, the run aborts
    /// before dispatching the next unit. A deployment already submitted is
    /// not recalled; on-chain transactions cannot be cancelled.
    pub fn with_cancellation(cancel: watch::Receiver<bool>) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    /// Deploy every unit in order and collect the resulting registry.
    ///
    /// Fails with [`Error::Configuration`] before any capability call if
    /// the unit list is empty or contains duplicate names. Any single
    /// deployment failure aborts the remaining sequence; no partial
    /// registry is returned.
    pub async fn run<C: DeployCapability>(
        &self,
        units: &[ContractUnit],
        capability: &C,
    ) -> Result<DeploymentRegistry, Error> {
        validate_plan(units)?;

        let mut records = Vec::with_capacity(units.len());

        for (position, unit) in units.iter().enumerate() {
            if self.is_cancelled() {
                return Err(Error::Cancelled {
                    unit: unit.name.clone(),
                });
            }

            tracing::info!(
                unit = %unit.name,
                position,
                total = units.len(),
                "Dispatching deployment..."
            );

            let address = capability
                .deploy(unit)
                .await
                .map_err(|cause| Error::Deployment {
                    unit: unit.name.clone(),
                    cause,
                })?;

            tracing::info!(unit = %unit.name, address = %address, "Contract deployed");

            records.push(DeploymentRecord {
                name: unit.name.clone(),
                address,
                deployed_at: position,
            });
        }

        Ok(records.into())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// Reject empty plans and duplicate unit names before any network call.
fn validate_plan(units: &[ContractUnit]) -> Result<(), Error> {
    if units.is_empty() {
        return Err(Error::Configuration(
            "no contract units to deploy".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for unit in units {
        if !seen.insert(unit.name.as_str()) {
            return Err(Error::Configuration(format!(
                "duplicate contract unit name `{}`",
                unit.name
            )));
        }
    }

    Ok(())
}
