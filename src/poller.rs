//! Waits for asynchronous provider operations to reach `DONE`.
//!
//! Compute Engine distinguishes zonal operations (instance create, stop,
//! delete) from global ones (machine image create, delete). The wait loop is
//! the same for both; only the status lookup differs, so it is expressed
//! through [`OperationSource`].

use std::io::{self, Write};
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::debug;

use crate::compute::{ApiFuture, ComputeApi, Scope};
use crate::model::Operation;
use crate::report::write_progress;

/// Interval between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Capability to fetch the current state of an operation by name.
pub trait OperationSource {
    /// Error returned by the lookup.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches the operation named `name`.
    fn fetch<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Operation, Self::Error>;
}

/// Looks operations up through the zonal operations endpoint.
#[derive(Debug)]
pub struct ZoneOperations<'a, A> {
    api: &'a A,
    scope: &'a Scope,
}

impl<'a, A> ZoneOperations<'a, A> {
    /// Binds the lookup to `scope`'s project and zone.
    #[must_use]
    pub const fn new(api: &'a A, scope: &'a Scope) -> Self {
        Self { api, scope }
    }
}

impl<A: ComputeApi> OperationSource for ZoneOperations<'_, A> {
    type Error = A::Error;

    fn fetch<'b>(&'b self, name: &'b str) -> ApiFuture<'b, Operation, Self::Error> {
        self.api.get_zone_operation(self.scope, name)
    }
}

/// Looks operations up through the global operations endpoint.
#[derive(Debug)]
pub struct GlobalOperations<'a, A> {
    api: &'a A,
    scope: &'a Scope,
}

impl<'a, A> GlobalOperations<'a, A> {
    /// Binds the lookup to `scope`'s project.
    #[must_use]
    pub const fn new(api: &'a A, scope: &'a Scope) -> Self {
        Self { api, scope }
    }
}

impl<A: ComputeApi> OperationSource for GlobalOperations<'_, A> {
    type Error = A::Error;

    fn fetch<'b>(&'b self, name: &'b str) -> ApiFuture<'b, Operation, Self::Error> {
        self.api.get_global_operation(self.scope, name)
    }
}

/// Errors raised while waiting for an operation.
#[derive(Debug, Error)]
pub enum WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// The status lookup failed; the wait stops immediately.
    #[error("failed to query operation {operation}: {source}")]
    Query {
        /// Operation being polled.
        operation: String,
        /// Provider error.
        #[source]
        source: E,
    },
    /// The operation finished with an error payload.
    #[error("operation {operation} failed: {message}")]
    Failed {
        /// Operation that failed.
        operation: String,
        /// Provider error messages.
        message: String,
    },
    /// The deadline passed before the operation finished.
    #[error("operation {operation} did not finish within {seconds} seconds")]
    Timeout {
        /// Operation being polled.
        operation: String,
        /// Configured timeout.
        seconds: u64,
    },
    /// Progress could not be written.
    #[error("failed to report operation progress: {0}")]
    Output(#[source] io::Error),
}

/// Fixed-interval operation poller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Poller {
    interval: Duration,
    timeout: Option<Duration>,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Poller {
    /// Creates a poller without a deadline.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    /// Bounds each wait; `None` waits indefinitely.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Interval between status queries.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until `operation` reports `DONE` and returns its final state.
    ///
    /// An operation that is already done is returned without querying the
    /// provider. Each tick is written to `out` as
    /// `Status: <STATUS>, Progress: <N>`.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Query`] as soon as a status lookup fails,
    /// [`WaitError::Failed`] when the finished operation carries an error
    /// payload, [`WaitError::Timeout`] when the deadline passes first, and
    /// [`WaitError::Output`] when progress cannot be written.
    pub async fn wait<S, W>(
        &self,
        source: &S,
        operation: Operation,
        out: &mut W,
    ) -> Result<Operation, WaitError<S::Error>>
    where
        S: OperationSource,
        W: Write + ?Sized,
    {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut current = operation;

        while !current.status.is_done() {
            let name = current.name.clone();
            let tick = async {
                sleep(self.interval).await;
                source.fetch(&name).await
            };
            let fetched = match deadline {
                Some(limit) => timeout_at(limit, tick)
                    .await
                    .map_err(|_| WaitError::Timeout {
                        operation: name.clone(),
                        seconds: self.timeout.map_or(0, |timeout| timeout.as_secs()),
                    })?,
                None => tick.await,
            };
            current = fetched.map_err(|err| WaitError::Query {
                operation: name.clone(),
                source: err,
            })?;
            debug!(
                operation = %name,
                status = %current.status,
                progress = current.progress,
                "polled operation"
            );
            write_progress(out, &current).map_err(WaitError::Output)?;
        }

        if let Some(payload) = current.failure() {
            return Err(WaitError::Failed {
                operation: current.name.clone(),
                message: payload.summary(),
            });
        }

        Ok(current)
    }
}
