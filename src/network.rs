//! Network access rule set provisioning.

use thiserror::Error;
use tracing::{debug, info};

use crate::fallback::{EnsureError, ensure_resource};
use crate::provider::{ControlPlane, IngressRule, Network, ProviderError, RuleSetRequest};

/// Errors raised while ensuring a rule set exists.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum NetworkError {
    /// The region lists no network to attach a rule set to.
    #[error("no network available in {region}")]
    NoNetworkAvailable {
        /// Region that was searched.
        region: String,
    },
    /// Raised when listing networks fails.
    #[error("failed to list networks: {0}")]
    Provider(#[source] ProviderError),
    /// Creation failed and no existing rule set could be found.
    #[error("failed to provision rule set {name}: {source}")]
    Provisioning {
        /// Rule set name.
        name: String,
        /// Create and lookup failures.
        #[source]
        source: EnsureError,
    },
}

/// Ensures the named rule set exists and returns its identifier.
///
/// Creation is always attempted first; any creation failure falls back to a
/// lookup by name within the chosen network. Repeated calls return the same
/// identifier.
///
/// # Errors
///
/// Returns [`NetworkError`] when the region has no network, listing fails, or
/// both creation and lookup fail.
pub async fn ensure_rule_set<P: ControlPlane + ?Sized>(
    plane: &P,
    name: &str,
    rules: &[IngressRule],
) -> Result<String, NetworkError> {
    let networks = plane.list_networks().await.map_err(NetworkError::Provider)?;
    let network = choose_network(&networks).ok_or_else(|| NetworkError::NoNetworkAvailable {
        region: plane.region().code().to_owned(),
    })?;
    debug!(network_id = %network.id, is_default = network.is_default, "selected network");

    let request = RuleSetRequest {
        name: name.to_owned(),
        description: format!("{name} managed by skiff"),
        network_id: network.id.clone(),
        rules: rules.to_vec(),
    };

    let ensured = ensure_resource(
        || plane.create_rule_set(&request),
        || plane.find_rule_set(name, &network.id),
        |_| true,
    )
    .await
    .map_err(|source| NetworkError::Provisioning {
        name: name.to_owned(),
        source,
    })?;

    let created = ensured.was_created();
    let id = ensured.into_inner();
    info!(
        region = %plane.region(),
        rule_set = name,
        rule_set_id = %id,
        created,
        "rule set ready"
    );
    Ok(id)
}

fn choose_network(networks: &[Network]) -> Option<&Network> {
    networks
        .iter()
        .find(|network| network.is_default)
        .or_else(|| networks.first())
}
