//! The idempotent provisioning workflow.
//!
//! [`RegionProvisioner`] runs image resolution, rule set and key pair
//! provisioning, and the instance launch against one region.
//! [`RegionFailoverController`] repeats that chain across an ordered list of
//! regions until one succeeds or a failure makes further attempts pointless.
//! Resources created in a failed region are left in place; later runs reuse
//! them.

mod error;

use tracing::{info, warn};

use crate::bootstrap::BootstrapScript;
use crate::fallback::{FallbackError, Verdict, try_in_order};
use crate::image;
use crate::key_pair::{CredentialProvisioner, KeyPairPolicy, PersistedKey};
use crate::launcher::{InstanceLauncher, ReadyInstance};
use crate::network;
use crate::provider::{
    BootImage, ControlPlane, ImageFilter, IngressRule, LaunchSpec, RegionConnector, RegionTarget,
};

pub use error::{FailureClass, ProvisionError, RegionAttempt};

/// Everything one provisioning run needs, independent of region.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionSpec {
    /// Ordered image fallback chain.
    pub image_chain: Vec<ImageFilter>,
    /// Rule set name.
    pub rule_set_name: String,
    /// Ingress rules of the rule set.
    pub rules: Vec<IngressRule>,
    /// Key pair name.
    pub key_name: String,
    /// Treatment of an existing key pair.
    pub key_policy: KeyPairPolicy,
    /// Instance type.
    pub instance_shape: String,
    /// First-boot payload.
    pub bootstrap: BootstrapScript,
    /// Extra instance tags.
    pub tags: Vec<(String, String)>,
}

/// Successful provisioning result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionOutcome {
    /// Region the instance runs in.
    pub region: RegionTarget,
    /// Image the instance booted from.
    pub image: BootImage,
    /// Rule set attached to the instance.
    pub rule_set_id: String,
    /// Key file written by this run, if the key pair was created.
    pub key: Option<PersistedKey>,
    /// The reachable instance.
    pub instance: ReadyInstance,
}

/// Runs the provisioning chain against a single region.
#[derive(Clone, Debug)]
pub struct RegionProvisioner {
    keys: CredentialProvisioner,
    launcher: InstanceLauncher,
}

impl RegionProvisioner {
    /// Creates a provisioner from its components.
    #[must_use]
    pub const fn new(keys: CredentialProvisioner, launcher: InstanceLauncher) -> Self {
        Self { keys, launcher }
    }

    /// Provisions one instance in the plane's region.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] wrapping the first component failure.
    pub async fn provision<P: ControlPlane + ?Sized>(
        &self,
        plane: &P,
        spec: &ProvisionSpec,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let region = plane.region().clone();
        info!(region = %region, "provisioning");

        let boot_image = image::resolve(plane, &spec.image_chain).await?;
        let rule_set_id = network::ensure_rule_set(plane, &spec.rule_set_name, &spec.rules).await?;
        let key = self
            .keys
            .ensure(plane, &spec.key_name, spec.key_policy)
            .await?;
        let launch = LaunchSpec {
            image_id: boot_image.image_id.clone(),
            instance_shape: spec.instance_shape.clone(),
            key_name: spec.key_name.clone(),
            rule_set_ids: vec![rule_set_id.clone()],
            bootstrap: spec.bootstrap.clone(),
            tags: spec.tags.clone(),
        };
        let instance = self.launcher.launch(plane, &launch).await?;

        Ok(ProvisionOutcome {
            region,
            image: boot_image,
            rule_set_id,
            key,
            instance,
        })
    }
}

/// Tries the provisioning chain region by region.
#[derive(Clone, Debug)]
pub struct RegionFailoverController<C> {
    connector: C,
    provisioner: RegionProvisioner,
    suggestion: Option<RegionTarget>,
}

impl<C: RegionConnector> RegionFailoverController<C> {
    /// Creates a controller; `suggestion` is recommended once every region
    /// failed.
    #[must_use]
    pub const fn new(
        connector: C,
        provisioner: RegionProvisioner,
        suggestion: Option<RegionTarget>,
    ) -> Self {
        Self {
            connector,
            provisioner,
            suggestion,
        }
    }

    /// Provisions in the first region that succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::NoRegions`] for an empty list,
    /// [`ProvisionError::InRegion`] when a failure stops the failover, and
    /// [`ProvisionError::AllRegionsExhausted`] once every region failed.
    pub async fn provision_with_failover(
        &self,
        regions: &[RegionTarget],
        spec: &ProvisionSpec,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        if regions.is_empty() {
            return Err(ProvisionError::NoRegions);
        }

        let outcome = try_in_order(
            regions,
            |region| self.attempt(region, spec),
            |err| err.failure_class().verdict(),
        )
        .await;

        match outcome {
            Ok((_, provisioned)) => Ok(provisioned),
            Err(FallbackError::Aborted { attempt, .. }) => Err(ProvisionError::InRegion {
                region: attempt.candidate,
                source: Box::new(attempt.error),
            }),
            Err(FallbackError::Exhausted(attempts)) => Err(ProvisionError::AllRegionsExhausted {
                attempts,
                suggestion: self.suggestion.clone(),
            }),
        }
    }

    async fn attempt(
        &self,
        region: &RegionTarget,
        spec: &ProvisionSpec,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let result = match self.connector.connect(region).await {
            Ok(plane) => self.provisioner.provision(&plane, spec).await,
            Err(err) => Err(ProvisionError::Connect(err)),
        };
        if let Err(err) = &result {
            let class = err.failure_class();
            match class.verdict() {
                Verdict::Advance => warn!(
                    region = %region,
                    class = class.as_str(),
                    reason = %err,
                    "region failed, trying next region"
                ),
                Verdict::Abort => warn!(
                    region = %region,
                    class = class.as_str(),
                    reason = %err,
                    "region failed, not retrying elsewhere"
                ),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests;
