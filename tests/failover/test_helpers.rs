//! Shared fixtures for failover BDD scenarios.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::fixture;
use skiff::bootstrap::BootstrapScript;
use skiff::image::default_image_chain;
use skiff::poll::PollConfig;
use skiff::provider::IngressRule;
use skiff::test_support::FakeConnector;
use skiff::{
    CredentialProvisioner, InstanceLauncher, KeyMaterialStore, KeyPairPolicy, ProvisionError,
    ProvisionOutcome, ProvisionSpec, RegionProvisioner, RegionTarget,
};
use tempfile::TempDir;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct FailoverContext {
    pub connector: FakeConnector,
    pub regions: Vec<RegionTarget>,
    pub spec: ProvisionSpec,
    pub key_dir: Arc<TempDir>,
    pub runs: Vec<Result<ProvisionOutcome, ProvisionError>>,
}

impl FailoverContext {
    pub fn provisioner(&self) -> Result<RegionProvisioner, FailoverTestError> {
        let dir = Utf8PathBuf::from_path_buf(self.key_dir.path().to_path_buf())
            .map_err(|path| FailoverTestError::Fixture(format!("non-utf8 {}", path.display())))?;
        Ok(RegionProvisioner::new(
            CredentialProvisioner::new(KeyMaterialStore::new(dir)),
            InstanceLauncher::new(PollConfig::fixed(
                Duration::from_millis(1),
                Duration::from_millis(100),
            )),
        ))
    }
}

#[derive(Clone, Debug, Error)]
pub enum FailoverTestError {
    #[error("invalid failover fixture: {0}")]
    Fixture(String),
}

pub type FailoverContextResult = Result<FailoverContext, FailoverTestError>;

#[fixture]
pub fn failover_context_result() -> FailoverContextResult {
    build_failover_context()
}

#[fixture]
pub fn failover_context(failover_context_result: FailoverContextResult) -> FailoverContext {
    failover_context_result
        .unwrap_or_else(|err| panic!("failover context fixture should initialise: {err}"))
}

fn build_failover_context() -> FailoverContextResult {
    let key_dir = TempDir::new().map_err(|err| FailoverTestError::Fixture(err.to_string()))?;
    let bootstrap = BootstrapScript::password_login("correct-horse", &[])
        .map_err(|err| FailoverTestError::Fixture(err.to_string()))?;
    Ok(FailoverContext {
        connector: FakeConnector::new(),
        regions: Vec::new(),
        spec: ProvisionSpec {
            image_chain: default_image_chain(),
            rule_set_name: String::from("SkiffOpenSG"),
            rules: vec![IngressRule::allow_all()],
            key_name: String::from("skiff-auto-key"),
            key_policy: KeyPairPolicy::CreateIfAbsent,
            instance_shape: String::from("t3.medium"),
            bootstrap,
            tags: vec![(String::from("Name"), String::from("skiff-node"))],
        },
        key_dir: Arc::new(key_dir),
        runs: Vec::new(),
    })
}
