//! AWS EC2 binding of the control-plane interface.
//!
//! Every call goes through `Ec2ControlPlane::retrying`, which retries
//! transient failures with exponential backoff. Semantic failures are
//! classified and returned as-is.

mod error;
mod images;
mod instances;
mod key_pairs;
mod network;

use std::future::Future;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2::Client;
use aws_sdk_ec2::config::Credentials;
use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ProviderCredentials;
use crate::provider::{
    AccessKeyPair, BootImage, ComputeInstance, ControlPlane, ImageFilter, InstanceSelector,
    LaunchSpec, Network, ProviderError, ProviderFuture, RegionConnector, RegionTarget,
    RuleSetRequest,
};

/// Name recorded as the credential provider in SDK diagnostics.
const CREDENTIALS_SOURCE: &str = "skiff";

/// Backoff applied to transient provider failures: 1s doubling up to 20s,
/// at most four retries.
#[must_use]
fn default_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(20))
        .with_max_times(4)
}

/// Builds EC2 clients per region from static credentials.
#[derive(Clone, Debug)]
pub struct Ec2Connector {
    credentials: ProviderCredentials,
    backoff: ExponentialBuilder,
}

impl Ec2Connector {
    /// Creates a connector signing requests with `credentials`.
    #[must_use]
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self {
            credentials,
            backoff: default_backoff(),
        }
    }
}

impl RegionConnector for Ec2Connector {
    type Plane = Ec2ControlPlane;

    fn connect<'a>(&'a self, region: &'a RegionTarget) -> ProviderFuture<'a, Self::Plane> {
        Box::pin(async move {
            let credentials = Credentials::new(
                self.credentials.access_key.clone(),
                self.credentials.secret_key.clone(),
                None,
                None,
                CREDENTIALS_SOURCE,
            );
            let config = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.code().to_owned()))
                .credentials_provider(credentials)
                .load()
                .await;
            debug!(region = %region, "connected EC2 client");
            Ok(Ec2ControlPlane {
                client: Client::new(&config),
                region: region.clone(),
                backoff: self.backoff,
            })
        })
    }
}

/// EC2 client bound to one region.
#[derive(Clone, Debug)]
pub struct Ec2ControlPlane {
    client: Client,
    region: RegionTarget,
    backoff: ExponentialBuilder,
}

impl Ec2ControlPlane {
    /// Runs `call`, retrying transient failures with backoff.
    async fn retrying<T, F, Fut>(
        &self,
        operation: &'static str,
        call: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        call.retry(self.backoff)
            .when(ProviderError::is_transient)
            .notify(|err, delay| {
                warn!(
                    region = %self.region,
                    operation,
                    delay = ?delay,
                    error = %err,
                    "transient provider error, retrying"
                );
            })
            .await
    }
}

impl ControlPlane for Ec2ControlPlane {
    fn region(&self) -> &RegionTarget {
        &self.region
    }

    fn describe_images<'a>(
        &'a self,
        filter: &'a ImageFilter,
    ) -> ProviderFuture<'a, Vec<BootImage>> {
        Box::pin(self.retrying("DescribeImages", move || self.fetch_images(filter)))
    }

    fn list_networks(&self) -> ProviderFuture<'_, Vec<Network>> {
        Box::pin(self.retrying("DescribeVpcs", move || self.fetch_networks()))
    }

    fn create_rule_set<'a>(&'a self, request: &'a RuleSetRequest) -> ProviderFuture<'a, String> {
        Box::pin(self.retrying("CreateSecurityGroup", move || {
            self.create_security_group(request)
        }))
    }

    fn find_rule_set<'a>(
        &'a self,
        name: &'a str,
        network_id: &'a str,
    ) -> ProviderFuture<'a, Option<String>> {
        Box::pin(self.retrying("DescribeSecurityGroups", move || {
            self.find_security_group(name, network_id)
        }))
    }

    fn create_key_pair<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, AccessKeyPair> {
        Box::pin(self.retrying("CreateKeyPair", move || self.create_key(name)))
    }

    fn describe_key_pair<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<AccessKeyPair>> {
        Box::pin(self.retrying("DescribeKeyPairs", move || self.describe_key(name)))
    }

    fn delete_key_pair<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, ()> {
        Box::pin(self.retrying("DeleteKeyPair", move || self.delete_key(name)))
    }

    fn run_instance<'a>(&'a self, spec: &'a LaunchSpec) -> ProviderFuture<'a, ComputeInstance> {
        // One token per logical launch so a retried request never starts a
        // second instance.
        let client_token = Uuid::new_v4().simple().to_string();
        Box::pin(async move {
            self.retrying("RunInstances", || self.launch(spec, &client_token))
                .await
        })
    }

    fn describe_instance<'a>(&'a self, id: &'a str) -> ProviderFuture<'a, Option<ComputeInstance>> {
        Box::pin(self.retrying("DescribeInstances", move || self.fetch_instance(id)))
    }

    fn list_instances<'a>(
        &'a self,
        selector: &'a InstanceSelector,
    ) -> ProviderFuture<'a, Vec<ComputeInstance>> {
        Box::pin(self.retrying("DescribeInstances", move || {
            self.fetch_instances(selector)
        }))
    }

    fn terminate_instances<'a>(&'a self, ids: &'a [String]) -> ProviderFuture<'a, Vec<String>> {
        Box::pin(self.retrying("TerminateInstances", move || self.terminate(ids)))
    }
}
