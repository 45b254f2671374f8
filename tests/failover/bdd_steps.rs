//! BDD step definitions for the failover workflow.

use rstest_bdd_macros::{given, then, when};
use skiff::provider::{InstanceState, ProviderError, ProviderErrorKind};
use skiff::test_support::{FakeControlPlane, LaunchScript};
use skiff::{ProvisionError, RegionFailoverController, RegionTarget};
use tokio::runtime::Runtime;

use super::test_helpers::{FailoverContext, FailoverTestError};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Setup(#[from] FailoverTestError),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn parse_regions(list: &str) -> Vec<RegionTarget> {
    list.split(',')
        .filter(|code| !code.trim().is_empty())
        .map(RegionTarget::new)
        .collect()
}

fn plane<'a>(
    failover_context: &'a FailoverContext,
    region: &str,
) -> Result<&'a FakeControlPlane, StepError> {
    failover_context
        .connector
        .plane(region)
        .ok_or_else(|| StepError::Assertion(format!("region {region} is not registered")))
}

#[given("regions \"{regions}\" are available")]
fn regions_available(mut failover_context: FailoverContext, regions: String) -> FailoverContext {
    failover_context.regions = parse_regions(&regions);
    failover_context.connector = failover_context
        .regions
        .iter()
        .fold(failover_context.connector.clone(), |connector, region| {
            connector.with_plane(FakeControlPlane::healthy(region.clone()))
        });
    failover_context
}

#[given("region \"{region}\" has no capacity")]
fn region_without_capacity(
    failover_context: FailoverContext,
    region: String,
) -> Result<FailoverContext, StepError> {
    plane(&failover_context, &region)?.fail_always(
        "run_instance",
        ProviderError::new(
            ProviderErrorKind::Capacity,
            "RunInstances",
            "insufficient capacity",
        )
        .with_code("InsufficientInstanceCapacity"),
    );
    Ok(failover_context)
}

#[given("region \"{region}\" rejects the launch parameters")]
fn region_rejecting_launch(
    failover_context: FailoverContext,
    region: String,
) -> Result<FailoverContext, StepError> {
    plane(&failover_context, &region)?.fail_always(
        "run_instance",
        ProviderError::new(
            ProviderErrorKind::Other,
            "RunInstances",
            "the requested configuration is not supported",
        )
        .with_code("InvalidParameterValue"),
    );
    Ok(failover_context)
}

#[given("region \"{region}\" publishes no images")]
fn region_without_images(mut failover_context: FailoverContext, region: String) -> FailoverContext {
    let empty = FakeControlPlane::new(RegionTarget::new(region));
    empty.add_network("vpc-default", true);
    failover_context.connector = failover_context.connector.clone().with_plane(empty);
    failover_context
}

#[given("instances in region \"{region}\" never get an address")]
fn region_without_addresses(
    failover_context: FailoverContext,
    region: String,
) -> Result<FailoverContext, StepError> {
    plane(&failover_context, &region)?.script_launch(LaunchScript {
        final_state: InstanceState::Pending,
        address: None,
        ..LaunchScript::default()
    });
    Ok(failover_context)
}

fn provision(mut failover_context: FailoverContext) -> Result<FailoverContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let controller = RegionFailoverController::new(
        failover_context.connector.clone(),
        failover_context.provisioner()?,
        Some(RegionTarget::new("ap-southeast-1")),
    );
    let regions = failover_context.regions.clone();
    let spec = failover_context.spec.clone();
    let result =
        runtime.block_on(async move { controller.provision_with_failover(&regions, &spec).await });
    failover_context.runs.push(result);
    Ok(failover_context)
}

#[when("I provision with failover")]
fn provision_once(failover_context: FailoverContext) -> Result<FailoverContext, StepError> {
    provision(failover_context)
}

#[when("I provision with failover again")]
fn provision_again(failover_context: FailoverContext) -> Result<FailoverContext, StepError> {
    provision(failover_context)
}

fn last_run(
    failover_context: &FailoverContext,
) -> Result<&Result<skiff::ProvisionOutcome, ProvisionError>, StepError> {
    failover_context
        .runs
        .last()
        .ok_or_else(|| StepError::Assertion(String::from("no provisioning run recorded")))
}

#[then("the instance runs in \"{region}\"")]
fn instance_runs_in(failover_context: &FailoverContext, region: String) -> Result<(), StepError> {
    match last_run(failover_context)? {
        Ok(outcome) if outcome.region.code() == region => Ok(()),
        Ok(outcome) => Err(StepError::Assertion(format!(
            "expected {region}, instance runs in {}",
            outcome.region
        ))),
        Err(err) => Err(StepError::Assertion(format!(
            "expected success, got failure: {err}"
        ))),
    }
}

#[then("\"{count}\" instance was launched")]
fn instances_launched(failover_context: &FailoverContext, count: usize) -> Result<(), StepError> {
    let launched = failover_context.connector.launched_count();
    if launched == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} launches, got {launched}"
        )))
    }
}

#[then("regions \"{regions}\" were contacted")]
fn regions_contacted(failover_context: &FailoverContext, regions: String) -> Result<(), StepError> {
    let expected: Vec<String> = parse_regions(&regions)
        .iter()
        .map(|region| region.code().to_owned())
        .collect();
    let contacted = failover_context.connector.connected_regions();
    if contacted == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected:?} to be contacted, got {contacted:?}"
        )))
    }
}

#[then("the region \"{region}\" holds \"{count}\" rule set")]
fn rule_sets_held(
    failover_context: &FailoverContext,
    region: String,
    count: usize,
) -> Result<(), StepError> {
    let held = plane(failover_context, &region)?.rule_set_count();
    if held == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} rule sets in {region}, found {held}"
        )))
    }
}

#[then("the second run wrote no key file")]
fn second_run_reused_key(failover_context: &FailoverContext) -> Result<(), StepError> {
    let [Ok(first), Ok(second)] = failover_context.runs.as_slice() else {
        return Err(StepError::Assertion(format!(
            "expected two successful runs, got {:?}",
            failover_context.runs
        )));
    };
    if first.key.is_some() && second.key.is_none() && first.rule_set_id == second.rule_set_id {
        Ok(())
    } else {
        Err(StepError::Assertion(String::from(
            "rerun should reuse the key pair and rule set",
        )))
    }
}

#[then("all regions are exhausted after \"{count}\" attempts")]
fn regions_exhausted(failover_context: &FailoverContext, count: usize) -> Result<(), StepError> {
    match last_run(failover_context)? {
        Err(ProvisionError::AllRegionsExhausted {
            attempts,
            suggestion,
        }) if attempts.len() == count && suggestion.is_some() => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected exhaustion after {count} attempts with a suggestion, got {other:?}"
        ))),
    }
}

#[then("provisioning stops in region \"{region}\"")]
fn provisioning_stops(failover_context: &FailoverContext, region: String) -> Result<(), StepError> {
    match last_run(failover_context)? {
        Err(ProvisionError::InRegion {
            region: failed, ..
        }) if failed.code() == region => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failover to stop in {region}, got {other:?}"
        ))),
    }
}
