//! Operator-facing rendering of scenario results.

use std::error::Error as _;
use std::io::{self, Write};

use crate::scenario::{Provisioned, ScenarioError, ScenarioOutcome};
use crate::sweeper::SweepSummary;

/// Writes the summary of a successful run.
///
/// # Errors
///
/// Returns any error raised by `out`.
pub fn write_outcome(mut out: impl Write, outcome: &ScenarioOutcome) -> io::Result<()> {
    match outcome {
        ScenarioOutcome::Provisioned(provisioned) => {
            if let Some(summary) = &provisioned.swept {
                write_sweep(&mut out, summary)?;
            }
            write_provisioned(&mut out, provisioned)
        }
        ScenarioOutcome::Swept(summary) => write_sweep(&mut out, summary),
    }
}

fn write_provisioned(out: &mut impl Write, provisioned: &Provisioned) -> io::Result<()> {
    let outcome = &provisioned.outcome;
    let address = outcome.instance.public_address;
    writeln!(out, "Instance ready in {}", outcome.region)?;
    writeln!(out, "  instance id:    {}", outcome.instance.instance.id)?;
    writeln!(out, "  public address: {address}")?;
    writeln!(
        out,
        "  image:          {} ({})",
        outcome.image.name, outcome.image.image_id
    )?;
    if let Some(password) = &provisioned.password {
        writeln!(out, "  root password:  {password}")?;
    }
    match &outcome.key {
        Some(key) => {
            writeln!(out, "  private key:    {}", key.path)?;
            writeln!(out, "Restrict the key file with: chmod 400 {}", key.path)?;
        }
        None => writeln!(
            out,
            "  private key:    existing key pair reused; use the file saved when it was created"
        )?,
    }
    writeln!(out, "Connect with: ssh root@{address}")
}

fn write_sweep(out: &mut impl Write, summary: &SweepSummary) -> io::Result<()> {
    writeln!(
        out,
        "Swept {}: {} matched, {} terminating, {} failed",
        summary.region,
        summary.matched.len(),
        summary.terminated.len(),
        summary.failed.len()
    )?;
    for (id, err) in &summary.failed {
        writeln!(out, "  {id}: {err}")?;
    }
    Ok(())
}

/// Writes the reason a run failed and what to do next.
///
/// # Errors
///
/// Returns any error raised by `out`.
pub fn write_failure(mut out: impl Write, err: &ScenarioError) -> io::Result<()> {
    writeln!(out, "error: {err}")?;
    let mut cause = err.source();
    while let Some(inner) = cause {
        writeln!(out, "  caused by: {inner}")?;
        cause = inner.source();
    }
    writeln!(out, "next step: {}", err.next_action())
}
