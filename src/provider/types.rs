//! Value types exchanged with the control plane.

use std::fmt;
use std::net::IpAddr;

use crate::bootstrap::BootstrapScript;

/// Tag key stamped on every instance launched by skiff.
pub const MANAGED_BY_TAG: &str = "managed-by";

/// Value paired with [`MANAGED_BY_TAG`].
pub const MANAGED_BY_VALUE: &str = "skiff";

/// Region whose control-plane endpoint a run addresses.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RegionTarget {
    code: String,
}

impl RegionTarget {
    /// Creates a target from a region code, trimming whitespace.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into().trim().to_owned(),
        }
    }

    /// Region code, for example `ap-east-1`.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for RegionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// One link in the image fallback chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageFilter {
    /// Human-readable distribution label, for example `Debian 12`.
    pub label: String,
    /// Account that publishes the image.
    pub owner_id: String,
    /// Name glob, for example `debian-12-amd64-*`.
    pub name_pattern: String,
    /// CPU architecture, for example `x86_64`.
    pub architecture: String,
}

impl ImageFilter {
    /// Builds a filter from its parts.
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        owner_id: impl Into<String>,
        name_pattern: impl Into<String>,
        architecture: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            owner_id: owner_id.into(),
            name_pattern: name_pattern.into(),
            architecture: architecture.into(),
        }
    }

    /// Official Debian 12 images.
    #[must_use]
    pub fn debian_12() -> Self {
        Self::new("Debian 12", "136693071363", "debian-12-amd64-*", "x86_64")
    }

    /// Canonical Ubuntu 22.04 images.
    #[must_use]
    pub fn ubuntu_22_04() -> Self {
        Self::new(
            "Ubuntu 22.04",
            "099720109477",
            "ubuntu/images/hvm-ssd/ubuntu-jammy-22.04-amd64-server-*",
            "x86_64",
        )
    }
}

/// Boot image discovered through the control plane.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BootImage {
    /// Provider identifier, for example `ami-0abc`.
    pub image_id: String,
    /// Image name.
    pub name: String,
    /// ISO-8601 creation timestamp; compares lexicographically.
    pub creation_timestamp: String,
    /// Publishing account.
    pub owner_id: String,
}

/// Network a rule set can be attached to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Network {
    /// Provider identifier.
    pub id: String,
    /// Whether the provider marks this as the region's default network.
    pub is_default: bool,
}

/// Ingress permission of a rule set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IngressRule {
    /// IP protocol, `-1` meaning all protocols.
    pub protocol: String,
    /// Source CIDR block.
    pub cidr: String,
}

impl IngressRule {
    /// All protocols and ports from anywhere.
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            protocol: String::from("-1"),
            cidr: String::from("0.0.0.0/0"),
        }
    }
}

/// Parameters for creating a network access rule set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RuleSetRequest {
    /// Rule set name, unique within the network.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Network the rule set belongs to.
    pub network_id: String,
    /// Ingress rules authorised right after creation.
    pub rules: Vec<IngressRule>,
}

/// Key pair known to the provider.
#[derive(Clone, Eq, PartialEq)]
pub struct AccessKeyPair {
    /// Key pair name.
    pub name: String,
    /// Private key material; only present on the creation response.
    pub private_key_material: Option<String>,
}

impl fmt::Debug for AccessKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKeyPair")
            .field("name", &self.name)
            .field(
                "private_key_material",
                &self.private_key_material.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Lifecycle state of a compute instance.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum InstanceState {
    /// Accepted, not yet booted.
    Pending,
    /// Booted.
    Running,
    /// Being terminated.
    ShuttingDown,
    /// Gone.
    Terminated,
    /// Being stopped.
    Stopping,
    /// Stopped.
    Stopped,
    /// Any state the workflow does not model.
    Other(String),
}

impl InstanceState {
    /// Provider spelling of the state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Returns `true` for states an instance never returns from on its own
    /// towards `running`.
    #[must_use]
    pub const fn is_leaving(&self) -> bool {
        matches!(
            self,
            Self::ShuttingDown | Self::Terminated | Self::Stopping | Self::Stopped
        )
    }
}

impl From<&str> for InstanceState {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a compute instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComputeInstance {
    /// Provider identifier.
    pub id: String,
    /// Current lifecycle state.
    pub state: InstanceState,
    /// Public address once networking is assigned.
    pub public_address: Option<IpAddr>,
    /// Instance type, for example `t3.medium`.
    pub instance_shape: String,
    /// Key pair bound at launch.
    pub key_name: Option<String>,
    /// Provider tags as key/value pairs.
    pub tags: Vec<(String, String)>,
}

impl ComputeInstance {
    /// Returns the value of a tag when present.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Everything needed to launch one instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchSpec {
    /// Resolved boot image.
    pub image_id: String,
    /// Instance type.
    pub instance_shape: String,
    /// Key pair bound to the instance.
    pub key_name: String,
    /// Rule sets attached to the instance.
    pub rule_set_ids: Vec<String>,
    /// First-boot payload, forwarded verbatim.
    pub bootstrap: BootstrapScript,
    /// Tags applied to the instance.
    pub tags: Vec<(String, String)>,
}

/// Filter selecting previously provisioned instances.
///
/// Every populated criterion must match. An empty `states` list matches any
/// state.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InstanceSelector {
    /// Required instance type.
    pub instance_shape: Option<String>,
    /// Required key pair name.
    pub key_name: Option<String>,
    /// Accepted states.
    pub states: Vec<InstanceState>,
    /// Required tags.
    pub tags: Vec<(String, String)>,
}

impl InstanceSelector {
    /// Selector matching any instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the given instance type.
    #[must_use]
    pub fn instance_shape(mut self, shape: impl Into<String>) -> Self {
        self.instance_shape = Some(shape.into());
        self
    }

    /// Requires the given key pair name.
    #[must_use]
    pub fn key_name(mut self, name: impl Into<String>) -> Self {
        self.key_name = Some(name.into());
        self
    }

    /// Restricts matches to the given states.
    #[must_use]
    pub fn states(mut self, states: impl IntoIterator<Item = InstanceState>) -> Self {
        self.states = states.into_iter().collect();
        self
    }

    /// Requires a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Returns `true` when the instance satisfies every criterion.
    #[must_use]
    pub fn matches(&self, instance: &ComputeInstance) -> bool {
        let shape_ok = self
            .instance_shape
            .as_ref()
            .is_none_or(|shape| *shape == instance.instance_shape);
        let key_ok = self
            .key_name
            .as_ref()
            .is_none_or(|key| instance.key_name.as_ref() == Some(key));
        let state_ok = self.states.is_empty() || self.states.contains(&instance.state);
        let tags_ok = self
            .tags
            .iter()
            .all(|(key, value)| instance.tag(key) == Some(value.as_str()));
        shape_ok && key_ok && state_ok && tags_ok
    }
}
