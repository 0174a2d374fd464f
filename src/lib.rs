//! Core library for the cloud gaming instance operator.
//!
//! The crate manages a single Compute Engine instance used as a gaming rig:
//! it lists what is running, restores the instance from the project's one
//! machine image, and on teardown snapshots the instance into a fresh image
//! before deleting it and every older image.

pub mod clock;
pub mod compute;
pub mod config;
pub mod gce;
pub mod lifecycle;
pub mod model;
pub mod poller;
pub mod report;
pub mod test_support;

pub use clock::{Clock, FixedClock, SystemClock};
pub use compute::{ApiFuture, ComputeApi, Scope, ScopeError};
pub use config::{ConfigError, ConfigOverrides, OperatorConfig};
pub use gce::{ComputeError, GceClient};
pub use lifecycle::{CreateOutcome, LifecycleController, LifecycleError, RemoveSummary};
pub use model::{Instance, InstanceInsert, MachineImage, Operation, OperationStatus};
pub use poller::{DEFAULT_POLL_INTERVAL, OperationSource, Poller, WaitError};
