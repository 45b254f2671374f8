//! Cleanup of previously provisioned instances.
//!
//! The sweeper selects instances by shape, key name, state and tags, and
//! requests their termination without waiting for it to complete. Selection
//! criteria are sent to the provider as a server-side filter and re-applied
//! locally, so a lenient provider filter never widens the sweep.

use thiserror::Error;
use tracing::{info, warn};

use crate::provider::{ControlPlane, InstanceSelector, ProviderError, RegionTarget};

/// Summary of sweeper work.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SweepSummary {
    /// Region that was swept.
    pub region: RegionTarget,
    /// Instances matching the selector.
    pub matched: Vec<String>,
    /// Instances whose termination was accepted.
    pub terminated: Vec<String>,
    /// Instances whose termination request failed.
    pub failed: Vec<(String, ProviderError)>,
}

impl SweepSummary {
    /// Returns `true` when every matching instance was accepted for
    /// termination.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Errors returned by the sweeper.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SweepError {
    /// Raised when listing instances fails.
    #[error("failed to list instances in {region}: {source}")]
    List {
        /// Region being swept.
        region: RegionTarget,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },
}

/// Terminates instances matching a selector.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CleanupSweeper;

impl CleanupSweeper {
    /// Creates a sweeper.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Terminates every instance in the plane's region matching `selector`.
    ///
    /// Matching ids go out in one batch call. When the batch fails each id is
    /// retried on its own; per-id failures are recorded in the summary rather
    /// than aborting the sweep. Nothing is sent when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError::List`] when the instance listing fails.
    pub async fn sweep<P: ControlPlane + ?Sized>(
        &self,
        plane: &P,
        selector: &InstanceSelector,
    ) -> Result<SweepSummary, SweepError> {
        let region = plane.region().clone();
        let listed = plane
            .list_instances(selector)
            .await
            .map_err(|source| SweepError::List {
                region: region.clone(),
                source,
            })?;
        let matched: Vec<String> = listed
            .into_iter()
            .filter(|instance| selector.matches(instance))
            .map(|instance| instance.id)
            .collect();

        if matched.is_empty() {
            info!(region = %region, "no matching instances to terminate");
            return Ok(SweepSummary {
                region,
                matched,
                terminated: Vec::new(),
                failed: Vec::new(),
            });
        }

        info!(region = %region, count = matched.len(), ids = ?matched, "terminating instances");
        let (terminated, failed) = match plane.terminate_instances(&matched).await {
            Ok(accepted) => (accepted, Vec::new()),
            Err(err) => {
                warn!(
                    region = %region,
                    error = %err,
                    "batch termination failed, retrying per instance"
                );
                terminate_individually(plane, &matched).await
            }
        };

        Ok(SweepSummary {
            region,
            matched,
            terminated,
            failed,
        })
    }
}

async fn terminate_individually<P: ControlPlane + ?Sized>(
    plane: &P,
    ids: &[String],
) -> (Vec<String>, Vec<(String, ProviderError)>) {
    let mut terminated = Vec::new();
    let mut failed = Vec::new();
    for id in ids {
        match plane.terminate_instances(std::slice::from_ref(id)).await {
            Ok(accepted) => terminated.extend(accepted),
            Err(err) => {
                warn!(instance_id = %id, error = %err, "failed to terminate instance");
                failed.push((id.clone(), err));
            }
        }
    }
    (terminated, failed)
}
