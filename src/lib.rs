//! Core library for the skiff provisioning tool.
//!
//! skiff brings up a single reachable EC2 instance with password SSH login.
//! Every step is idempotent: images are looked up, rule sets and key pairs are
//! created only when absent, and a failed region hands over to the next one.
//! The workflow depends only on the [`provider::ControlPlane`] interface; the
//! [`ec2`] module binds it to AWS.

pub mod bootstrap;
pub mod config;
pub mod ec2;
pub mod fallback;
pub mod image;
pub mod key_pair;
pub mod launcher;
pub mod network;
pub mod poll;
pub mod provider;
pub mod report;
pub mod scenario;
pub mod sweeper;
pub mod test_support;
pub mod workflow;

pub use bootstrap::{BootstrapError, BootstrapScript};
pub use config::{ConfigError, ProviderConfig, SkiffConfig};
pub use ec2::{Ec2Connector, Ec2ControlPlane};
pub use key_pair::{CredentialProvisioner, KeyMaterialStore, KeyPairError, KeyPairPolicy};
pub use launcher::{InstanceLauncher, LaunchError, ReadyInstance};
pub use provider::{ControlPlane, ProviderError, ProviderErrorKind, RegionConnector, RegionTarget};
pub use scenario::{Scenario, ScenarioError, ScenarioOutcome, ScenarioRunner};
pub use sweeper::{CleanupSweeper, SweepError, SweepSummary};
pub use workflow::{
    FailureClass, ProvisionError, ProvisionOutcome, ProvisionSpec, RegionFailoverController,
    RegionProvisioner,
};
