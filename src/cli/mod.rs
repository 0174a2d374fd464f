//! Command-line interface definitions for the `cloud-gaming-operator` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, Subcommand};

/// Top-level CLI for the `cloud-gaming-operator` binary.
#[derive(Debug, Parser)]
#[command(
    name = "cloud-gaming-operator",
    about = "Start, list, and snapshot-and-remove the cloud gaming instance on Compute Engine",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Google Cloud project ID. Overrides CLOUD_GAMING_OPERATOR_PROJECT_ID.
    #[arg(short = 'p', long, global = true, value_name = "PROJECT")]
    pub(crate) project_id: Option<String>,
    /// Region used as the machine image storage location.
    #[arg(long, global = true, value_name = "REGION")]
    pub(crate) region: Option<String>,
    /// Zone hosting the instance.
    #[arg(long, global = true, value_name = "ZONE")]
    pub(crate) zone: Option<String>,
    /// Give up waiting for a provider operation after this many seconds.
    #[arg(long = "operation-timeout", global = true, value_name = "SECONDS")]
    pub(crate) operation_timeout_secs: Option<u64>,
    /// Workflow to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of `cloud-gaming-operator`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Subcommand)]
pub(crate) enum Command {
    /// List instances in the zone with their last start time.
    #[command(visible_alias = "l")]
    List,
    /// Create an instance from the machine image unless one is running.
    #[command(visible_alias = "c")]
    Create,
    /// Snapshot the instance into a new machine image, delete older images,
    /// then delete the instance.
    #[command(visible_alias = "r")]
    Remove,
}
