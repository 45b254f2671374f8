//! Provider abstraction for the cloud control plane.
//!
//! The provisioning workflow only depends on the semantic operations exposed
//! here. One [`ControlPlane`] addresses exactly one region; a
//! [`RegionConnector`] hands out planes for the regions a run visits.

mod error;
mod types;

use std::future::Future;
use std::pin::Pin;

pub use error::{ProviderError, ProviderErrorKind};
pub use types::{
    AccessKeyPair, BootImage, ComputeInstance, ImageFilter, IngressRule, InstanceSelector,
    InstanceState, LaunchSpec, MANAGED_BY_TAG, MANAGED_BY_VALUE, Network, RegionTarget,
    RuleSetRequest,
};

/// Future returned by control-plane operations.
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Semantic operations consumed from a region's control plane.
pub trait ControlPlane: Send + Sync {
    /// Region this plane addresses.
    fn region(&self) -> &RegionTarget;

    /// Lists images matching the filter. Ordering is unspecified.
    fn describe_images<'a>(&'a self, filter: &'a ImageFilter)
    -> ProviderFuture<'a, Vec<BootImage>>;

    /// Lists the networks rule sets can be created in.
    fn list_networks(&self) -> ProviderFuture<'_, Vec<Network>>;

    /// Creates a rule set and authorises its ingress rules, returning its id.
    fn create_rule_set<'a>(&'a self, request: &'a RuleSetRequest) -> ProviderFuture<'a, String>;

    /// Looks a rule set up by name within a network.
    fn find_rule_set<'a>(
        &'a self,
        name: &'a str,
        network_id: &'a str,
    ) -> ProviderFuture<'a, Option<String>>;

    /// Creates a key pair. The response carries the private key material.
    fn create_key_pair<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, AccessKeyPair>;

    /// Looks a key pair up by name. Material is never returned.
    fn describe_key_pair<'a>(&'a self, name: &'a str)
    -> ProviderFuture<'a, Option<AccessKeyPair>>;

    /// Deletes a key pair by name.
    fn delete_key_pair<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, ()>;

    /// Launches exactly one instance and returns its initial snapshot.
    fn run_instance<'a>(&'a self, spec: &'a LaunchSpec) -> ProviderFuture<'a, ComputeInstance>;

    /// Fetches the current snapshot of an instance, `None` when not visible.
    fn describe_instance<'a>(&'a self, id: &'a str)
    -> ProviderFuture<'a, Option<ComputeInstance>>;

    /// Lists instances, using the selector as a server-side filter.
    fn list_instances<'a>(
        &'a self,
        selector: &'a InstanceSelector,
    ) -> ProviderFuture<'a, Vec<ComputeInstance>>;

    /// Requests termination of all ids in one call, returning the accepted ids.
    fn terminate_instances<'a>(&'a self, ids: &'a [String]) -> ProviderFuture<'a, Vec<String>>;
}

/// Connects to the control plane of a region.
pub trait RegionConnector: Send + Sync {
    /// Plane type produced by this connector.
    type Plane: ControlPlane;

    /// Builds a plane addressing `region`.
    fn connect<'a>(&'a self, region: &'a RegionTarget) -> ProviderFuture<'a, Self::Plane>;
}

impl<T: RegionConnector + ?Sized> RegionConnector for &T {
    type Plane = T::Plane;

    fn connect<'a>(&'a self, region: &'a RegionTarget) -> ProviderFuture<'a, Self::Plane> {
        (**self).connect(region)
    }
}
