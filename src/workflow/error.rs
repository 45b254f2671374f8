//! Provisioning failures and their classification.

use thiserror::Error;

use crate::config::ConfigError;
use crate::fallback::{Attempt, Verdict};
use crate::image::ImageError;
use crate::key_pair::KeyPairError;
use crate::launcher::LaunchError;
use crate::network::NetworkError;
use crate::provider::{ProviderError, ProviderErrorKind, RegionTarget};

/// Failed provisioning attempt in one region.
pub type RegionAttempt = Attempt<RegionTarget, ProvisionError>;

/// Coarse failure classes driving the failover decision.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureClass {
    /// Missing or invalid local configuration.
    Configuration,
    /// The region lacks a required resource.
    NotFound,
    /// The region refused the launch request.
    LaunchCapacity,
    /// A provider call failed in a way another region may not.
    Transient,
    /// The instance may already exist, so another region could double it.
    Fatal,
}

impl FailureClass {
    /// Whether the failover controller moves on to the next region.
    #[must_use]
    pub const fn verdict(self) -> Verdict {
        match self {
            Self::NotFound | Self::LaunchCapacity | Self::Transient => Verdict::Advance,
            Self::Configuration | Self::Fatal => Verdict::Abort,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::NotFound => "not found",
            Self::LaunchCapacity => "launch capacity",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        }
    }
}

/// Errors surfaced by the provisioning workflow.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Local configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// No region was configured.
    #[error("no region configured")]
    NoRegions,
    /// Connecting to a region's control plane failed.
    #[error("failed to connect: {0}")]
    Connect(#[source] ProviderError),
    /// Boot image resolution failed.
    #[error(transparent)]
    Image(#[from] ImageError),
    /// Rule set provisioning failed.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// Key pair provisioning failed.
    #[error(transparent)]
    KeyPair(#[from] KeyPairError),
    /// Launching or waiting for the instance failed.
    #[error(transparent)]
    Launch(#[from] LaunchError),
    /// A failure in one region stopped the failover.
    #[error("{region}: {source}")]
    InRegion {
        /// Region the failure happened in.
        region: RegionTarget,
        /// The failure.
        #[source]
        source: Box<ProvisionError>,
    },
    /// Every candidate region failed.
    #[error("provisioning failed in every region ({})", summarize(.attempts))]
    AllRegionsExhausted {
        /// Failures per region, in the order tried.
        attempts: Vec<RegionAttempt>,
        /// Next region worth trying.
        suggestion: Option<RegionTarget>,
    },
}

impl ProvisionError {
    /// Classifies the failure for the failover decision.
    #[must_use]
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::Config(_) | Self::NoRegions => FailureClass::Configuration,
            Self::Connect(_) => FailureClass::Transient,
            Self::Image(ImageError::NotFound { .. })
            | Self::Network(NetworkError::NoNetworkAvailable { .. }) => FailureClass::NotFound,
            Self::Image(ImageError::Provider { .. })
            | Self::Network(NetworkError::Provider(_) | NetworkError::Provisioning { .. }) => {
                FailureClass::Transient
            }
            Self::KeyPair(err) if err.is_local() => FailureClass::Configuration,
            Self::KeyPair(_) => FailureClass::Transient,
            // No instance exists yet, so any refusal moves on to the next region.
            Self::Launch(LaunchError::Rejected(source)) => match source.kind {
                ProviderErrorKind::Transient => FailureClass::Transient,
                ProviderErrorKind::NotFound => FailureClass::NotFound,
                ProviderErrorKind::Capacity
                | ProviderErrorKind::Permission
                | ProviderErrorKind::Conflict
                | ProviderErrorKind::Other => FailureClass::LaunchCapacity,
            },
            Self::Launch(_) | Self::AllRegionsExhausted { .. } => FailureClass::Fatal,
            Self::InRegion { source, .. } => source.failure_class(),
        }
    }

    /// What the operator should do next.
    #[must_use]
    pub fn next_action(&self) -> String {
        match self {
            Self::Config(_) => String::from("provide the missing setting and rerun"),
            Self::NoRegions => {
                String::from("set AWS_DEFAULT_REGION or SKIFF_FAILOVER_REGIONS and rerun")
            }
            Self::KeyPair(err) if err.is_local() => {
                String::from("make the key directory (SKIFF_KEY_DIR) writable and rerun")
            }
            Self::Launch(err) => err.instance_id().map_or_else(
                || String::from("try another region or instance type"),
                |id| format!("inspect instance {id} in the console or run `skiff sweep`"),
            ),
            Self::InRegion { source, .. } => source.next_action(),
            Self::AllRegionsExhausted {
                suggestion: Some(region),
                ..
            } => format!("try region {region} (set AWS_DEFAULT_REGION={region})"),
            Self::AllRegionsExhausted {
                suggestion: None, ..
            } => String::from("add more regions to SKIFF_FAILOVER_REGIONS"),
            Self::Connect(_) | Self::Image(_) | Self::Network(_) | Self::KeyPair(_) => {
                String::from("rerun; existing key pairs and rule sets are reused")
            }
        }
    }
}

fn summarize(attempts: &[RegionAttempt]) -> String {
    if attempts.is_empty() {
        return String::from("no region tried");
    }
    attempts
        .iter()
        .map(|attempt| format!("{}: {}", attempt.candidate, attempt.error))
        .collect::<Vec<_>>()
        .join("; ")
}
