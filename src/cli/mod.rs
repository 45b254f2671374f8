//! Command-line interface definitions for the `skiff` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `skiff` binary.
///
/// Every setting comes from the environment or `skiff.toml`; the scenarios
/// take no flags.
#[derive(Debug, Parser)]
#[command(
    name = "skiff",
    about = "Provision a reachable EC2 instance idempotently, with region failover",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Provision in the default region, falling back to the failover regions.
    #[command(
        name = "provision",
        about = "Provision in AWS_DEFAULT_REGION, then SKIFF_FAILOVER_REGIONS"
    )]
    Provision,
    /// Sweep the reset region, rotate the reset key pair and provision there.
    #[command(
        name = "reset",
        about = "Terminate instances in the reset region and provision a fresh one"
    )]
    Reset,
    /// Sweep the source region and provision in the destination region.
    #[command(
        name = "relocate",
        about = "Terminate instances in the source region and provision in the destination"
    )]
    Relocate,
    /// Terminate previously provisioned instances in the default region.
    #[command(
        name = "sweep",
        about = "Terminate instances matching the key pair and instance type"
    )]
    Sweep,
}
