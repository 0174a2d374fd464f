//! Instance lifecycle workflows: list, ensure-running, and
//! snapshot-and-terminate.
//!
//! The managed zone is expected to hold zero or one instance and the project
//! exactly one machine image. Any other cardinality is surfaced as an error
//! for the operator to resolve by hand; the controller never picks one of
//! several candidates.

use std::io::{self, Write};

use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::compute::{ComputeApi, Scope};
use crate::model::{Instance, Operation};
use crate::poller::{GlobalOperations, Poller, WaitError, ZoneOperations};
use crate::report::write_operation;

mod create;
mod list;
mod remove;

pub use create::CreateOutcome;
pub use remove::RemoveSummary;

/// Errors surfaced by the lifecycle workflows.
#[derive(Debug, Error)]
pub enum LifecycleError<ApiError>
where
    ApiError: std::error::Error + 'static,
{
    /// Raised when a provider call fails.
    #[error("compute API call failed: {0}")]
    Provider(#[source] ApiError),
    /// Raised when waiting for an operation fails.
    #[error("{0}")]
    Wait(#[from] WaitError<ApiError>),
    /// Raised by `remove` when the zone holds no instance.
    #[error("no instances are running")]
    NoInstanceRunning,
    /// Raised by `remove` when the zone holds several instances.
    #[error(
        "{count} instances are running; operating on more than one instance is not supported, \
         delete them from the Cloud Console"
    )]
    MultipleInstances {
        /// Number of instances found.
        count: usize,
    },
    /// Raised by `create` when the project has no machine image.
    #[error("no machine image exists, so an instance cannot be created")]
    NoMachineImage,
    /// Raised by `create` when the project has several machine images.
    #[error("{count} machine images exist, so the image to create from cannot be determined")]
    AmbiguousMachineImage {
        /// Number of images found.
        count: usize,
    },
    /// Raised by `list` when an instance reports an unparsable start time.
    #[error("instance {instance} has a malformed last start timestamp '{value}'")]
    InvalidTimestamp {
        /// Instance name.
        instance: String,
        /// Raw timestamp.
        value: String,
    },
    /// Raised when operator output cannot be written.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Runs the lifecycle workflows against a [`ComputeApi`].
#[derive(Debug)]
pub struct LifecycleController<A, C = SystemClock> {
    api: A,
    scope: Scope,
    poller: Poller,
    clock: C,
}

impl<A> LifecycleController<A, SystemClock>
where
    A: ComputeApi,
{
    /// Creates a controller using the system clock and the default poller.
    #[must_use]
    pub fn new(api: A, scope: Scope) -> Self {
        Self::with_clock(api, scope, SystemClock)
    }
}

impl<A, C> LifecycleController<A, C>
where
    A: ComputeApi,
    C: Clock,
{
    /// Creates a controller with an explicit clock.
    #[must_use]
    pub fn with_clock(api: A, scope: Scope, clock: C) -> Self {
        Self {
            api,
            scope,
            poller: Poller::default(),
            clock,
        }
    }

    /// Replaces the operation poller.
    #[must_use]
    pub const fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    /// Provider client used by the workflows.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Scope the workflows operate in.
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    async fn instances(&self) -> Result<Vec<Instance>, LifecycleError<A::Error>> {
        self.api
            .list_instances(&self.scope)
            .await
            .map_err(LifecycleError::Provider)
    }

    async fn wait_zonal<W: Write + ?Sized>(
        &self,
        operation: Operation,
        out: &mut W,
    ) -> Result<Operation, LifecycleError<A::Error>> {
        write_operation(out, &operation)?;
        let source = ZoneOperations::new(&self.api, &self.scope);
        Ok(self.poller.wait(&source, operation, out).await?)
    }

    async fn wait_global<W: Write + ?Sized>(
        &self,
        operation: Operation,
        out: &mut W,
    ) -> Result<Operation, LifecycleError<A::Error>> {
        write_operation(out, &operation)?;
        let source = GlobalOperations::new(&self.api, &self.scope);
        Ok(self.poller.wait(&source, operation, out).await?)
    }
}

#[cfg(test)]
mod tests;
