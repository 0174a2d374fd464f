//! Binary entry point for the cloud gaming operator CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cloud_gaming_operator::{
    ComputeError, ConfigError, ConfigOverrides, GceClient, LifecycleController, LifecycleError,
    OperatorConfig, Poller,
};

mod cli;

use cli::{Cli, Command};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("compute client error: {0}")]
    Compute(#[from] ComputeError),
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError<ComputeError>),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(&cli, &mut io::stdout()).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

/// Diagnostics go to stderr so stdout carries only operator output. The
/// filter comes from `RUST_LOG` and defaults to warnings.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
    {
        writeln!(io::stderr(), "failed to initialise logging: {err}").ok();
    }
}

fn overrides(cli: &Cli) -> ConfigOverrides {
    ConfigOverrides {
        project_id: cli.project_id.clone(),
        region: cli.region.clone(),
        zone: cli.zone.clone(),
        operation_timeout_secs: cli.operation_timeout_secs,
    }
}

async fn dispatch<W: Write + ?Sized>(cli: &Cli, out: &mut W) -> Result<(), CliError> {
    let config = OperatorConfig::load_without_cli_args()?.with_overrides(&overrides(cli));
    let scope = config.scope()?;
    let client = GceClient::from_config(&config)?;
    let poller = Poller::new(config.poll_interval()).with_timeout(config.operation_timeout());
    debug!(
        command = ?cli.command,
        project = %scope.project,
        zone = %scope.zone,
        endpoint = client.endpoint(),
        "dispatching"
    );
    let controller = LifecycleController::new(client, scope).with_poller(poller);

    match cli.command {
        Command::List => {
            controller.list(out).await?;
        }
        Command::Create => {
            controller.ensure_running(out).await?;
        }
        Command::Remove => {
            controller.snapshot_and_terminate(out).await?;
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
