//! Instance launch and readiness wait.

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::poll::{PollConfig, PollError, poll_until};
use crate::provider::{
    ComputeInstance, ControlPlane, InstanceState, LaunchSpec, MANAGED_BY_TAG, MANAGED_BY_VALUE,
    ProviderError,
};

/// A launched instance whose public address is known.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadyInstance {
    /// Last observed snapshot.
    pub instance: ComputeInstance,
    /// Public address reachable over SSH.
    pub public_address: IpAddr,
}

/// Errors raised while launching or waiting for an instance.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LaunchError {
    /// The provider refused to create the instance.
    #[error("launch rejected: {0}")]
    Rejected(#[source] ProviderError),
    /// A status check failed while waiting.
    #[error("failed to query instance {instance_id}: {source}")]
    Provider {
        /// Instance being waited on.
        instance_id: String,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },
    /// The instance left the path towards `running`.
    #[error("instance {instance_id} entered state {state} while booting")]
    UnexpectedState {
        /// Instance being waited on.
        instance_id: String,
        /// Observed state.
        state: InstanceState,
    },
    /// The instance did not become reachable in time.
    #[error("instance {instance_id} not reachable after {waited:?} (last state: {last_state})")]
    ProvisioningTimeout {
        /// Instance being waited on.
        instance_id: String,
        /// Time spent waiting.
        waited: Duration,
        /// Last observed state, `unknown` when never seen.
        last_state: String,
    },
}

impl LaunchError {
    /// Identifier of the created instance, when one exists.
    #[must_use]
    pub fn instance_id(&self) -> Option<&str> {
        match self {
            Self::Rejected(_) => None,
            Self::Provider { instance_id, .. }
            | Self::UnexpectedState { instance_id, .. }
            | Self::ProvisioningTimeout { instance_id, .. } => Some(instance_id),
        }
    }
}

enum WaitFailure {
    Provider(ProviderError),
    Left(InstanceState),
}

/// Launches single instances and waits for a public address.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InstanceLauncher {
    poll: PollConfig,
}

impl InstanceLauncher {
    /// Creates a launcher using `poll` for the readiness wait.
    #[must_use]
    pub const fn new(poll: PollConfig) -> Self {
        Self { poll }
    }

    /// Launches exactly one instance and waits until it runs with a public
    /// address.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Rejected`] when creation is refused, and the
    /// remaining variants when the wait fails.
    pub async fn launch<P: ControlPlane + ?Sized>(
        &self,
        plane: &P,
        spec: &LaunchSpec,
    ) -> Result<ReadyInstance, LaunchError> {
        let tagged = with_managed_tag(spec);
        let created = plane
            .run_instance(&tagged)
            .await
            .map_err(LaunchError::Rejected)?;
        let instance_id = created.id;
        info!(
            region = %plane.region(),
            instance_id = %instance_id,
            image_id = %tagged.image_id,
            instance_shape = %tagged.instance_shape,
            "instance created, waiting for public address"
        );

        let outcome = poll_until(self.poll, || check_ready(plane, &instance_id)).await;
        match outcome {
            Ok(ready) => {
                info!(
                    region = %plane.region(),
                    instance_id = %instance_id,
                    public_address = %ready.public_address,
                    "instance ready"
                );
                Ok(ready)
            }
            Err(PollError::Check(WaitFailure::Provider(source))) => Err(LaunchError::Provider {
                instance_id,
                source,
            }),
            Err(PollError::Check(WaitFailure::Left(state))) => {
                Err(LaunchError::UnexpectedState { instance_id, state })
            }
            Err(PollError::TimedOut { elapsed, .. }) => {
                let last_state = match plane.describe_instance(&instance_id).await {
                    Ok(Some(snapshot)) => snapshot.state.to_string(),
                    Ok(None) | Err(_) => String::from("unknown"),
                };
                Err(LaunchError::ProvisioningTimeout {
                    instance_id,
                    waited: elapsed,
                    last_state,
                })
            }
        }
    }
}

async fn check_ready<P: ControlPlane + ?Sized>(
    plane: &P,
    instance_id: &str,
) -> Result<Option<ReadyInstance>, WaitFailure> {
    let Some(snapshot) = plane
        .describe_instance(instance_id)
        .await
        .map_err(WaitFailure::Provider)?
    else {
        debug!(instance_id, "instance not visible yet");
        return Ok(None);
    };
    readiness(snapshot)
}

fn readiness(snapshot: ComputeInstance) -> Result<Option<ReadyInstance>, WaitFailure> {
    if snapshot.state.is_leaving() {
        return Err(WaitFailure::Left(snapshot.state));
    }
    if snapshot.state != InstanceState::Running {
        return Ok(None);
    }
    Ok(snapshot.public_address.map(|public_address| ReadyInstance {
        instance: snapshot,
        public_address,
    }))
}

fn with_managed_tag(spec: &LaunchSpec) -> LaunchSpec {
    let mut tagged = spec.clone();
    tagged.tags.retain(|(key, _)| key != MANAGED_BY_TAG);
    tagged
        .tags
        .push((MANAGED_BY_TAG.to_owned(), MANAGED_BY_VALUE.to_owned()));
    tagged
}
