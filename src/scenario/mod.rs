//! The four fixed operator scenarios.
//!
//! Each scenario is a thin composition of the sweeper and the failover
//! controller, parameterised by [`SkiffConfig`]. [`ScenarioRunner`] is
//! generic over the region connector so the same code drives EC2 in the
//! binary and the in-memory fake in tests.

use thiserror::Error;
use tracing::info;

use crate::bootstrap::{BootstrapError, BootstrapScript, resolve_bootstrap_override};
use crate::config::{ConfigError, ProviderConfig, SkiffConfig};
use crate::ec2::Ec2Connector;
use crate::image::{default_image_chain, ubuntu_image_chain};
use crate::key_pair::{CredentialProvisioner, KeyMaterialStore, KeyPairPolicy};
use crate::launcher::InstanceLauncher;
use crate::provider::{
    ImageFilter, IngressRule, InstanceSelector, InstanceState, ProviderError, RegionConnector,
    RegionTarget,
};
use crate::sweeper::{CleanupSweeper, SweepError, SweepSummary};
use crate::workflow::{
    ProvisionError, ProvisionOutcome, ProvisionSpec, RegionFailoverController, RegionProvisioner,
};

/// Tag key carrying the operator-facing instance name.
pub const NAME_TAG: &str = "Name";

/// Operator scenario selected on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scenario {
    /// Provision in the default region, then the failover regions.
    Provision,
    /// Sweep the reset region, rotate the reset key pair and provision
    /// Ubuntu 22.04 there.
    Reset,
    /// Sweep the source region and provision in the destination region.
    Relocate,
    /// Terminate previously provisioned instances in the default region.
    Sweep,
}

impl Scenario {
    /// Command name of the scenario.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Reset => "reset",
            Self::Relocate => "relocate",
            Self::Sweep => "sweep",
        }
    }
}

/// A provisioned instance together with the login details of this run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Provisioned {
    /// Resources backing the instance.
    pub outcome: ProvisionOutcome,
    /// Root password set by the generated bootstrap script; `None` when an
    /// operator supplied script replaced it.
    pub password: Option<String>,
    /// Cleanup performed before provisioning, if the scenario sweeps first.
    pub swept: Option<SweepSummary>,
}

/// Result of a scenario run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScenarioOutcome {
    /// An instance is reachable.
    Provisioned(Box<Provisioned>),
    /// Only a cleanup ran.
    Swept(SweepSummary),
}

/// Errors raised by a scenario run.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The bootstrap payload could not be built.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The region to sweep could not be reached.
    #[error("failed to reach {region} for cleanup: {source}")]
    Connect {
        /// Region being swept.
        region: RegionTarget,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },
    /// Cleanup failed.
    #[error(transparent)]
    Sweep(#[from] SweepError),
    /// Provisioning failed.
    #[error(transparent)]
    Provision(Box<ProvisionError>),
}

impl From<ProvisionError> for ScenarioError {
    fn from(value: ProvisionError) -> Self {
        Self::Provision(Box::new(value))
    }
}

impl ScenarioError {
    /// What the operator should do about this failure.
    #[must_use]
    pub fn next_action(&self) -> String {
        match self {
            Self::Config(_) => String::from("provide the missing setting and rerun"),
            Self::Bootstrap(_) => String::from(
                "fix SKIFF_BOOTSTRAP_SCRIPT, SKIFF_BOOTSTRAP_SCRIPT_FILE or SKIFF_ADMIN_PASSWORD",
            ),
            Self::Connect { region, .. } | Self::Sweep(SweepError::List { region, .. }) => {
                format!("check credentials and connectivity for {region}, then rerun")
            }
            Self::Provision(err) => err.next_action(),
        }
    }
}

/// Runs scenarios against the regions handed out by a connector.
#[derive(Clone, Debug)]
pub struct ScenarioRunner<C> {
    connector: C,
    config: SkiffConfig,
    default_region: RegionTarget,
}

impl<C: RegionConnector> ScenarioRunner<C> {
    /// Creates a runner; `default_region` is the region addressed by
    /// `provision` and `sweep`.
    #[must_use]
    pub const fn new(connector: C, config: SkiffConfig, default_region: RegionTarget) -> Self {
        Self {
            connector,
            config,
            default_region,
        }
    }

    /// Runs `scenario` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] describing the step that failed.
    pub async fn run(&self, scenario: Scenario) -> Result<ScenarioOutcome, ScenarioError> {
        self.config.validate()?;
        info!(scenario = scenario.as_str(), "starting scenario");
        match scenario {
            Scenario::Provision => {
                let (bootstrap, password) = self.bootstrap(&[])?;
                let spec = self.spec(
                    &self.config.key_name,
                    KeyPairPolicy::CreateIfAbsent,
                    default_image_chain(),
                    bootstrap,
                );
                let mut regions = vec![self.default_region.clone()];
                regions.extend(self.config.failover_regions());
                self.provision(&regions, &spec, password, None).await
            }
            Scenario::Reset => {
                let (bootstrap, password) = self.bootstrap(&self.config.extra_login_users())?;
                let spec = self.spec(
                    &self.config.reset_key_name,
                    KeyPairPolicy::ResetAndRecreate,
                    ubuntu_image_chain(),
                    bootstrap,
                );
                let region = RegionTarget::new(&self.config.reset_region);
                let selector = InstanceSelector::new()
                    .instance_shape(&self.config.instance_shape)
                    .states(lingering_states());
                let swept = self.sweep(&region, &selector).await?;
                self.provision(&[region], &spec, password, Some(swept)).await
            }
            Scenario::Relocate => {
                let (bootstrap, password) = self.bootstrap(&[])?;
                let spec = self.spec(
                    &self.config.key_name,
                    KeyPairPolicy::CreateIfAbsent,
                    default_image_chain(),
                    bootstrap,
                );
                let source = RegionTarget::new(&self.config.relocate_from);
                let selector = InstanceSelector::new()
                    .key_name(&self.config.key_name)
                    .states([InstanceState::Running, InstanceState::Pending]);
                let swept = self.sweep(&source, &selector).await?;
                let destination = RegionTarget::new(&self.config.relocate_to);
                self.provision(&[destination], &spec, password, Some(swept)).await
            }
            Scenario::Sweep => {
                let selector = InstanceSelector::new()
                    .key_name(&self.config.key_name)
                    .instance_shape(&self.config.instance_shape)
                    .states(lingering_states());
                self.sweep(&self.default_region, &selector)
                    .await
                    .map(ScenarioOutcome::Swept)
            }
        }
    }

    async fn sweep(
        &self,
        region: &RegionTarget,
        selector: &InstanceSelector,
    ) -> Result<SweepSummary, ScenarioError> {
        let plane = self
            .connector
            .connect(region)
            .await
            .map_err(|source| ScenarioError::Connect {
                region: region.clone(),
                source,
            })?;
        Ok(CleanupSweeper::new().sweep(&plane, selector).await?)
    }

    fn spec(
        &self,
        key_name: &str,
        key_policy: KeyPairPolicy,
        image_chain: Vec<ImageFilter>,
        bootstrap: BootstrapScript,
    ) -> ProvisionSpec {
        ProvisionSpec {
            image_chain,
            rule_set_name: self.config.rule_set_name.clone(),
            rules: vec![IngressRule::allow_all()],
            key_name: key_name.to_owned(),
            key_policy,
            instance_shape: self.config.instance_shape.clone(),
            bootstrap,
            tags: vec![(NAME_TAG.to_owned(), self.config.instance_name.clone())],
        }
    }

    async fn provision(
        &self,
        regions: &[RegionTarget],
        spec: &ProvisionSpec,
        password: Option<String>,
        swept: Option<SweepSummary>,
    ) -> Result<ScenarioOutcome, ScenarioError> {
        let provisioner = RegionProvisioner::new(
            CredentialProvisioner::new(KeyMaterialStore::new(self.config.key_dir.as_str())),
            InstanceLauncher::new(self.config.poll_config()),
        );
        let suggestion = Some(RegionTarget::new(&self.config.suggested_region))
            .filter(|candidate| !candidate.code().is_empty() && !regions.contains(candidate));
        let controller = RegionFailoverController::new(&self.connector, provisioner, suggestion);
        let outcome = controller.provision_with_failover(regions, spec).await?;
        Ok(ScenarioOutcome::Provisioned(Box::new(Provisioned {
            outcome,
            password,
            swept,
        })))
    }

    /// Bootstrap payload and the root password it sets. Resolved before any
    /// provider call.
    fn bootstrap(
        &self,
        extra_users: &[String],
    ) -> Result<(BootstrapScript, Option<String>), ScenarioError> {
        let supplied = resolve_bootstrap_override(
            self.config.bootstrap_script.as_deref(),
            self.config.bootstrap_script_file.as_deref(),
        )?;
        if let Some(script) = supplied {
            info!("using operator supplied bootstrap script");
            return Ok((script, None));
        }
        let password = self.config.login_password();
        let script = BootstrapScript::password_login(&password, extra_users)?;
        Ok((script, Some(password)))
    }
}

const fn lingering_states() -> [InstanceState; 3] {
    [
        InstanceState::Running,
        InstanceState::Pending,
        InstanceState::Stopped,
    ]
}

/// Loads configuration from the environment and runs `scenario` against EC2.
///
/// # Errors
///
/// Returns [`ScenarioError::Config`] when credentials or settings are missing,
/// and any other [`ScenarioError`] raised by the run.
pub async fn run_from_environment(scenario: Scenario) -> Result<ScenarioOutcome, ScenarioError> {
    let provider = ProviderConfig::load_without_cli_args()?;
    let credentials = provider.credentials()?;
    let region = provider.region()?;
    let config = SkiffConfig::load_without_cli_args()?;
    ScenarioRunner::new(Ec2Connector::new(credentials), config, region)
        .run(scenario)
        .await
}
