//! Unit tests for the provisioning workflow.

use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::config::ConfigError;
use crate::image::{ImageError, default_image_chain};
use crate::key_pair::{KeyMaterialStore, KeyPairError};
use crate::launcher::LaunchError;
use crate::network::NetworkError;
use crate::poll::PollConfig;
use crate::provider::{InstanceState, ProviderError, ProviderErrorKind};
use crate::test_support::{FakeConnector, FakeControlPlane, LaunchScript};

struct Harness {
    _keys: TempDir,
    provisioner: RegionProvisioner,
    spec: ProvisionSpec,
}

#[fixture]
fn harness() -> Harness {
    let keys = TempDir::new().expect("temp dir");
    let dir = Utf8PathBuf::from_path_buf(keys.path().to_path_buf()).expect("utf8 temp dir");
    let provisioner = RegionProvisioner::new(
        CredentialProvisioner::new(KeyMaterialStore::new(dir)),
        InstanceLauncher::new(PollConfig::fixed(
            Duration::from_millis(1),
            Duration::from_millis(100),
        )),
    );
    let spec = ProvisionSpec {
        image_chain: default_image_chain(),
        rule_set_name: String::from("SkiffOpenSG"),
        rules: vec![IngressRule::allow_all()],
        key_name: String::from("auto-key"),
        key_policy: KeyPairPolicy::CreateIfAbsent,
        instance_shape: String::from("t3.medium"),
        bootstrap: BootstrapScript::new("#!/bin/sh\ntrue\n").expect("payload"),
        tags: vec![(String::from("Name"), String::from("node"))],
    };
    Harness {
        _keys: keys,
        provisioner,
        spec,
    }
}

fn regions(codes: &[&str]) -> Vec<RegionTarget> {
    codes.iter().map(|code| RegionTarget::new(*code)).collect()
}

fn capacity_error() -> ProviderError {
    ProviderError::new(
        ProviderErrorKind::Capacity,
        "RunInstances",
        "insufficient capacity",
    )
    .with_code("InsufficientInstanceCapacity")
}

#[rstest]
#[tokio::test]
async fn single_region_provisioning_reports_every_resource(harness: Harness) {
    let plane = FakeControlPlane::healthy(RegionTarget::new("ap-east-1"));
    let outcome = harness
        .provisioner
        .provision(&plane, &harness.spec)
        .await
        .expect("provision");
    assert_eq!(outcome.region.code(), "ap-east-1");
    assert_eq!(outcome.image.image_id, "ami-ap-east-1");
    assert!(outcome.rule_set_id.starts_with("sg-"));
    assert!(outcome.key.is_some(), "first run creates the key pair");
    let launched = plane.launched_specs();
    let [sent] = launched.as_slice() else {
        panic!("expected one launch, got {launched:?}");
    };
    assert_eq!(sent.rule_set_ids, vec![outcome.rule_set_id.clone()]);
    assert_eq!(sent.key_name, "auto-key");
}

#[rstest]
#[tokio::test]
async fn rerun_reuses_key_and_rule_set(harness: Harness) {
    let plane = FakeControlPlane::healthy(RegionTarget::new("ap-east-1"));
    let first = harness
        .provisioner
        .provision(&plane, &harness.spec)
        .await
        .expect("first run");
    let second = harness
        .provisioner
        .provision(&plane, &harness.spec)
        .await
        .expect("second run");
    assert_eq!(first.rule_set_id, second.rule_set_id);
    assert!(second.key.is_none(), "existing key pair yields no material");
    assert_eq!(plane.rule_set_count(), 1);
}

#[rstest]
#[tokio::test]
async fn failover_moves_past_capacity_failure(harness: Harness) {
    let first = FakeControlPlane::healthy(RegionTarget::new("ap-east-1"));
    first.fail_always("run_instance", capacity_error());
    let second = FakeControlPlane::healthy(RegionTarget::new("ap-southeast-1"));
    let connector = FakeConnector::new().with_plane(first).with_plane(second);
    let controller = RegionFailoverController::new(connector.clone(), harness.provisioner, None);

    let outcome = controller
        .provision_with_failover(&regions(&["ap-east-1", "ap-southeast-1"]), &harness.spec)
        .await
        .expect("second region should succeed");
    assert_eq!(outcome.region.code(), "ap-southeast-1");
    assert_eq!(connector.connected_regions(), ["ap-east-1", "ap-southeast-1"]);
    assert_eq!(connector.launched_count(), 1);
}

fn invalid_parameter_error() -> ProviderError {
    ProviderError::new(
        ProviderErrorKind::Other,
        "RunInstances",
        "the instance type is not supported",
    )
    .with_code("InvalidParameterValue")
}

#[rstest]
#[tokio::test]
async fn rejected_launch_moves_to_the_next_region(harness: Harness) {
    let first = FakeControlPlane::healthy(RegionTarget::new("us-east-1"));
    first.fail_always("run_instance", invalid_parameter_error());
    let second = FakeControlPlane::healthy(RegionTarget::new("eu-west-1"));
    let connector = FakeConnector::new().with_plane(first).with_plane(second);
    let controller = RegionFailoverController::new(connector.clone(), harness.provisioner, None);

    let outcome = controller
        .provision_with_failover(&regions(&["us-east-1", "eu-west-1"]), &harness.spec)
        .await
        .expect("second region should succeed");
    assert_eq!(outcome.region.code(), "eu-west-1");
    assert_eq!(connector.connected_regions(), ["us-east-1", "eu-west-1"]);
    assert_eq!(connector.launched_count(), 1);
}

#[rstest]
#[tokio::test]
async fn rejected_launch_in_the_only_region_exhausts(harness: Harness) {
    let only = FakeControlPlane::healthy(RegionTarget::new("us-east-1"));
    only.fail_always("run_instance", invalid_parameter_error());
    let connector = FakeConnector::new().with_plane(only);
    let controller = RegionFailoverController::new(connector, harness.provisioner, None);

    let err = controller
        .provision_with_failover(&regions(&["us-east-1"]), &harness.spec)
        .await
        .expect_err("only region rejects the launch");
    let ProvisionError::AllRegionsExhausted { ref attempts, .. } = err else {
        panic!("expected exhaustion, got {err:?}");
    };
    assert_eq!(attempts.len(), 1);
    assert!(err.to_string().contains("us-east-1"), "{err}");
}

#[rstest]
#[tokio::test]
async fn exhaustion_is_reported_once_with_suggestion(harness: Harness) {
    let only = FakeControlPlane::healthy(RegionTarget::new("us-east-1"));
    only.fail_always("run_instance", capacity_error());
    let connector = FakeConnector::new().with_plane(only);
    let controller = RegionFailoverController::new(
        connector.clone(),
        harness.provisioner,
        Some(RegionTarget::new("ap-southeast-1")),
    );

    let err = controller
        .provision_with_failover(&regions(&["us-east-1"]), &harness.spec)
        .await
        .expect_err("only region fails");
    let ProvisionError::AllRegionsExhausted {
        ref attempts,
        ref suggestion,
    } = err
    else {
        panic!("expected exhaustion, got {err:?}");
    };
    assert_eq!(attempts.len(), 1);
    assert_eq!(suggestion.as_ref().map(RegionTarget::code), Some("ap-southeast-1"));
    assert_eq!(connector.launched_count(), 0);
    assert!(err.next_action().contains("ap-southeast-1"));
}

#[rstest]
#[tokio::test]
async fn connect_failures_advance(harness: Harness) {
    let connector = FakeConnector::new()
        .with_plane(FakeControlPlane::healthy(RegionTarget::new("ap-northeast-1")));
    connector.fail_connect(
        "ap-east-1",
        ProviderError::new(ProviderErrorKind::Transient, "Connect", "dispatch failure"),
    );
    let controller = RegionFailoverController::new(connector, harness.provisioner, None);
    let outcome = controller
        .provision_with_failover(&regions(&["ap-east-1", "ap-northeast-1"]), &harness.spec)
        .await
        .expect("second region");
    assert_eq!(outcome.region.code(), "ap-northeast-1");
}

#[rstest]
#[tokio::test]
async fn provisioning_timeout_stops_failover(harness: Harness) {
    let stuck = FakeControlPlane::healthy(RegionTarget::new("ap-east-1"));
    stuck.script_launch(LaunchScript {
        final_state: InstanceState::Pending,
        address: None,
        ..LaunchScript::default()
    });
    let spare = FakeControlPlane::healthy(RegionTarget::new("ap-northeast-1"));
    let connector = FakeConnector::new().with_plane(stuck).with_plane(spare);
    let controller = RegionFailoverController::new(connector.clone(), harness.provisioner, None);

    let err = controller
        .provision_with_failover(&regions(&["ap-east-1", "ap-northeast-1"]), &harness.spec)
        .await
        .expect_err("timeout aborts");
    let ProvisionError::InRegion {
        ref region,
        ref source,
    } = err
    else {
        panic!("expected abort, got {err:?}");
    };
    assert_eq!(region.code(), "ap-east-1");
    assert!(matches!(
        **source,
        ProvisionError::Launch(LaunchError::ProvisioningTimeout { .. })
    ));
    assert_eq!(connector.connected_regions(), ["ap-east-1"]);
    assert!(err.next_action().contains("skiff sweep"));
}

#[rstest]
#[tokio::test]
async fn empty_region_list_is_a_configuration_error(harness: Harness) {
    let controller = RegionFailoverController::new(FakeConnector::new(), harness.provisioner, None);
    let err = controller
        .provision_with_failover(&[], &harness.spec)
        .await
        .expect_err("no regions");
    assert_eq!(err, ProvisionError::NoRegions);
    assert_eq!(err.failure_class(), FailureClass::Configuration);
}

fn provider(kind: ProviderErrorKind) -> ProviderError {
    ProviderError::new(kind, "Op", "message")
}

#[rstest]
#[case::config(
    ProvisionError::Config(ConfigError::MissingField(String::from("x"))),
    FailureClass::Configuration
)]
#[case::no_image(
    ProvisionError::Image(ImageError::NotFound { region: String::from("r"), tried: String::new() }),
    FailureClass::NotFound
)]
#[case::no_network(
    ProvisionError::Network(NetworkError::NoNetworkAvailable { region: String::from("r") }),
    FailureClass::NotFound
)]
#[case::capacity(
    ProvisionError::Launch(LaunchError::Rejected(provider(ProviderErrorKind::Capacity))),
    FailureClass::LaunchCapacity
)]
#[case::permission(
    ProvisionError::Launch(LaunchError::Rejected(provider(ProviderErrorKind::Permission))),
    FailureClass::LaunchCapacity
)]
#[case::invalid_launch(
    ProvisionError::Launch(LaunchError::Rejected(provider(ProviderErrorKind::Other))),
    FailureClass::LaunchCapacity
)]
#[case::duplicate_launch(
    ProvisionError::Launch(LaunchError::Rejected(provider(ProviderErrorKind::Conflict))),
    FailureClass::LaunchCapacity
)]
#[case::throttled_launch(
    ProvisionError::Launch(LaunchError::Rejected(provider(ProviderErrorKind::Transient))),
    FailureClass::Transient
)]
#[case::connect(
    ProvisionError::Connect(provider(ProviderErrorKind::Transient)),
    FailureClass::Transient
)]
#[case::key_provider(
    ProvisionError::KeyPair(KeyPairError::Provider {
        name: String::from("k"),
        source: provider(ProviderErrorKind::Transient),
    }),
    FailureClass::Transient
)]
#[case::key_persist(
    ProvisionError::KeyPair(KeyPairError::Persist {
        name: String::from("k"),
        message: String::from("read-only"),
    }),
    FailureClass::Configuration
)]
#[case::timeout(
    ProvisionError::Launch(LaunchError::ProvisioningTimeout {
        instance_id: String::from("i-1"),
        waited: Duration::from_secs(1),
        last_state: String::from("pending"),
    }),
    FailureClass::Fatal
)]
fn failure_classes_drive_failover(#[case] err: ProvisionError, #[case] expected: FailureClass) {
    assert_eq!(err.failure_class(), expected);
}

#[test]
fn only_recoverable_classes_advance() {
    for class in [
        FailureClass::NotFound,
        FailureClass::LaunchCapacity,
        FailureClass::Transient,
    ] {
        assert_eq!(class.verdict(), Verdict::Advance, "{class:?}");
    }
    for class in [FailureClass::Configuration, FailureClass::Fatal] {
        assert_eq!(class.verdict(), Verdict::Abort, "{class:?}");
    }
}
