//! BDD scenarios for the failover workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{FailoverContextResult, failover_context_result};

#[scenario(
    path = "tests/features/failover.feature",
    name = "Provision in the first healthy region"
)]
fn scenario_first_region(failover_context_result: FailoverContextResult) {
    drop(failover_context_result);
}

#[scenario(
    path = "tests/features/failover.feature",
    name = "Capacity shortage moves to the next region"
)]
fn scenario_capacity_failover(failover_context_result: FailoverContextResult) {
    drop(failover_context_result);
}

#[scenario(
    path = "tests/features/failover.feature",
    name = "A rejected launch moves to the next region"
)]
fn scenario_rejected_launch(failover_context_result: FailoverContextResult) {
    drop(failover_context_result);
}

#[scenario(
    path = "tests/features/failover.feature",
    name = "Missing images move to the next region"
)]
fn scenario_missing_images(failover_context_result: FailoverContextResult) {
    drop(failover_context_result);
}

#[scenario(
    path = "tests/features/failover.feature",
    name = "A rerun reuses what the first run created"
)]
fn scenario_rerun(failover_context_result: FailoverContextResult) {
    drop(failover_context_result);
}

#[scenario(
    path = "tests/features/failover.feature",
    name = "Every region failing is reported once"
)]
fn scenario_exhausted(failover_context_result: FailoverContextResult) {
    drop(failover_context_result);
}

#[scenario(
    path = "tests/features/failover.feature",
    name = "A stuck instance stops the failover"
)]
fn scenario_stuck_instance(failover_context_result: FailoverContextResult) {
    drop(failover_context_result);
}
