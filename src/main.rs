//! Binary entry point for the skiff CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use skiff::report::{write_failure, write_outcome};
use skiff::scenario::{Scenario, ScenarioError, ScenarioOutcome, run_from_environment};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();
    let exit_code = match dispatch(cli).await {
        Ok(outcome) => {
            write_outcome(io::stdout(), &outcome).ok();
            0
        }
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<ScenarioOutcome, ScenarioError> {
    run_from_environment(scenario_for(cli)).await
}

const fn scenario_for(cli: Cli) -> Scenario {
    match cli {
        Cli::Provision => Scenario::Provision,
        Cli::Reset => Scenario::Reset,
        Cli::Relocate => Scenario::Relocate,
        Cli::Sweep => Scenario::Sweep,
    }
}

fn report_error(err: &ScenarioError) {
    write_error(io::stderr(), err);
}

fn write_error(target: impl Write, err: &ScenarioError) {
    write_failure(target, err).ok();
}
