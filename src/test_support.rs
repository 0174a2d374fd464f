//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::future::ready;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::compute::{ApiFuture, ComputeApi, Scope};
use crate::model::{
    Instance, InstanceInsert, MachineImage, Operation, OperationError, OperationErrorDetail,
    OperationStatus,
};

/// Calls recorded by [`FakeCompute`], in the order they were issued.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ComputeCall {
    /// `instances.list`.
    ListInstances,
    /// `instances.insert` with the requested name and source image path.
    InsertInstance {
        /// Requested instance name.
        name: String,
        /// Source machine image path.
        source_machine_image: String,
    },
    /// `instances.stop`.
    StopInstance(String),
    /// `instances.delete`.
    DeleteInstance(String),
    /// `machineImages.list`.
    ListMachineImages,
    /// `machineImages.insert` with the full request body.
    InsertMachineImage(MachineImage),
    /// `machineImages.delete`.
    DeleteMachineImage(String),
    /// `zoneOperations.get`.
    GetZoneOperation(String),
    /// `globalOperations.get`.
    GetGlobalOperation(String),
}

/// Calls [`FakeCompute`] can be told to reject.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum FailPoint {
    /// Reject `instances.list`.
    ListInstances,
    /// Reject `instances.insert`.
    InsertInstance,
    /// Reject `instances.stop`.
    StopInstance,
    /// Reject `instances.delete`.
    DeleteInstance,
    /// Reject `machineImages.list`.
    ListMachineImages,
    /// Reject `machineImages.insert`.
    InsertMachineImage,
    /// Reject `machineImages.delete` for the named image.
    DeleteMachineImage(String),
    /// Reject every operation status lookup.
    GetOperation,
}

/// Errors returned by [`FakeCompute`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FakeComputeError {
    /// Raised for calls registered with [`FakeCompute::fail_on`].
    #[error("injected failure: {0}")]
    Injected(String),
    /// Raised when an operation is looked up under the wrong scope or was
    /// never issued.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum OperationScope {
    Zone,
    Global,
}

#[derive(Clone, Debug)]
struct TrackedOperation {
    scope: OperationScope,
    remaining_polls: u32,
}

#[derive(Debug, Default)]
struct FakeState {
    instances: Vec<Instance>,
    images: Vec<MachineImage>,
    operations: BTreeMap<String, TrackedOperation>,
    calls: Vec<ComputeCall>,
    failures: BTreeSet<FailPoint>,
    polls_before_done: u32,
    operation_error: Option<OperationError>,
    next_operation: u64,
}

impl FakeState {
    fn check(&self, point: &FailPoint) -> Result<(), FakeComputeError> {
        if self.failures.contains(point) {
            return Err(FakeComputeError::Injected(format!("{point:?}")));
        }
        Ok(())
    }

    fn start_operation(&mut self, scope: OperationScope, kind: &str, target: &str) -> Operation {
        self.next_operation += 1;
        let name = format!("operation-{}-{kind}", self.next_operation);
        let remaining_polls = self.polls_before_done;
        self.operations.insert(
            name.clone(),
            TrackedOperation {
                scope,
                remaining_polls,
            },
        );

        let mut extra = Map::new();
        extra.insert(String::from("operationType"), Value::from(kind));
        extra.insert(String::from("targetLink"), Value::from(target));
        if remaining_polls == 0 {
            self.finished(name, extra)
        } else {
            Operation {
                name,
                status: OperationStatus::Running,
                progress: 0,
                error: None,
                extra,
            }
        }
    }

    fn finished(&self, name: String, extra: Map<String, Value>) -> Operation {
        Operation {
            name,
            status: OperationStatus::Done,
            progress: 100,
            error: self.operation_error.clone(),
            extra,
        }
    }

    fn poll(&mut self, scope: OperationScope, name: &str) -> Result<Operation, FakeComputeError> {
        self.check(&FailPoint::GetOperation)?;
        let tracked = self
            .operations
            .get_mut(name)
            .filter(|tracked| tracked.scope == scope)
            .ok_or_else(|| FakeComputeError::UnknownOperation(name.to_owned()))?;
        tracked.remaining_polls = tracked.remaining_polls.saturating_sub(1);
        if tracked.remaining_polls == 0 {
            return Ok(self.finished(name.to_owned(), Map::new()));
        }
        Ok(Operation {
            name: name.to_owned(),
            status: OperationStatus::Running,
            progress: 50,
            error: None,
            extra: Map::new(),
        })
    }
}

/// In-memory [`ComputeApi`] that applies mutations immediately and reports
/// their operations as finishing after a configurable number of polls.
///
/// Clones share state, so a test can keep a handle after moving one into a
/// controller.
#[derive(Clone, Debug, Default)]
pub struct FakeCompute {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCompute {
    /// Creates an empty project whose operations finish immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a running instance.
    #[must_use]
    pub fn with_instance(self, name: &str, last_start_timestamp: Option<&str>) -> Self {
        self.state().instances.push(Instance {
            name: name.to_owned(),
            status: Some(String::from("RUNNING")),
            last_start_timestamp: last_start_timestamp.map(str::to_owned),
        });
        self
    }

    /// Adds a machine image.
    #[must_use]
    pub fn with_machine_image(self, name: &str) -> Self {
        self.state().images.push(MachineImage {
            name: name.to_owned(),
            ..MachineImage::default()
        });
        self
    }

    /// Makes each new operation report `RUNNING` until it has been polled
    /// `polls` times.
    #[must_use]
    pub fn with_polls_before_done(self, polls: u32) -> Self {
        self.state().polls_before_done = polls;
        self
    }

    /// Rejects every call matching `point`.
    pub fn fail_on(&self, point: FailPoint) {
        self.state().failures.insert(point);
    }

    /// Attaches an error payload to every operation once it is done.
    pub fn fail_operations_with(&self, code: &str, message: &str) {
        self.state().operation_error = Some(OperationError {
            errors: vec![OperationErrorDetail {
                code: Some(code.to_owned()),
                message: Some(message.to_owned()),
            }],
        });
    }

    /// Snapshot of the instances currently in the zone.
    #[must_use]
    pub fn instances(&self) -> Vec<Instance> {
        self.state().instances.clone()
    }

    /// Names of the machine images currently in the project.
    #[must_use]
    pub fn machine_image_names(&self) -> Vec<String> {
        self.state()
            .images
            .iter()
            .map(|image| image.name.clone())
            .collect()
    }

    /// Snapshot of the machine images currently in the project.
    #[must_use]
    pub fn machine_images(&self) -> Vec<MachineImage> {
        self.state().images.clone()
    }

    /// Calls issued so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ComputeCall> {
        self.state().calls.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ComputeApi for FakeCompute {
    type Error = FakeComputeError;

    fn list_instances<'a>(&'a self, _scope: &'a Scope) -> ApiFuture<'a, Vec<Instance>, Self::Error> {
        let mut state = self.state();
        state.calls.push(ComputeCall::ListInstances);
        let result = state
            .check(&FailPoint::ListInstances)
            .map(|()| state.instances.clone());
        Box::pin(ready(result))
    }

    fn insert_instance<'a>(
        &'a self,
        scope: &'a Scope,
        instance: &'a InstanceInsert,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        let mut state = self.state();
        state.calls.push(ComputeCall::InsertInstance {
            name: instance.name.clone(),
            source_machine_image: instance.source_machine_image.clone(),
        });
        let result = state.check(&FailPoint::InsertInstance).map(|()| {
            state.instances.push(Instance {
                name: instance.name.clone(),
                status: Some(String::from("RUNNING")),
                last_start_timestamp: None,
            });
            state.start_operation(
                OperationScope::Zone,
                "insert",
                &scope.instance_path(&instance.name),
            )
        });
        Box::pin(ready(result))
    }

    fn stop_instance<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        let mut state = self.state();
        state.calls.push(ComputeCall::StopInstance(name.to_owned()));
        let result = state.check(&FailPoint::StopInstance).map(|()| {
            for instance in state.instances.iter_mut().filter(|i| i.name == name) {
                instance.status = Some(String::from("TERMINATED"));
            }
            state.start_operation(OperationScope::Zone, "stop", &scope.instance_path(name))
        });
        Box::pin(ready(result))
    }

    fn delete_instance<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        let mut state = self.state();
        state.calls.push(ComputeCall::DeleteInstance(name.to_owned()));
        let result = state.check(&FailPoint::DeleteInstance).map(|()| {
            state.instances.retain(|instance| instance.name != name);
            state.start_operation(OperationScope::Zone, "delete", &scope.instance_path(name))
        });
        Box::pin(ready(result))
    }

    fn list_machine_images<'a>(
        &'a self,
        _scope: &'a Scope,
    ) -> ApiFuture<'a, Vec<MachineImage>, Self::Error> {
        let mut state = self.state();
        state.calls.push(ComputeCall::ListMachineImages);
        let result = state
            .check(&FailPoint::ListMachineImages)
            .map(|()| state.images.clone());
        Box::pin(ready(result))
    }

    fn insert_machine_image<'a>(
        &'a self,
        _scope: &'a Scope,
        image: &'a MachineImage,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        let mut state = self.state();
        state.calls.push(ComputeCall::InsertMachineImage(image.clone()));
        let result = state.check(&FailPoint::InsertMachineImage).map(|()| {
            state.images.push(image.clone());
            let target = format!("global/machineImages/{}", image.name);
            state.start_operation(OperationScope::Global, "insert", &target)
        });
        Box::pin(ready(result))
    }

    fn delete_machine_image<'a>(
        &'a self,
        _scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        let mut state = self.state();
        state
            .calls
            .push(ComputeCall::DeleteMachineImage(name.to_owned()));
        let result = state
            .check(&FailPoint::DeleteMachineImage(name.to_owned()))
            .map(|()| {
                state.images.retain(|image| image.name != name);
                let target = format!("global/machineImages/{name}");
                state.start_operation(OperationScope::Global, "delete", &target)
            });
        Box::pin(ready(result))
    }

    fn get_zone_operation<'a>(
        &'a self,
        _scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        let mut state = self.state();
        state
            .calls
            .push(ComputeCall::GetZoneOperation(name.to_owned()));
        let result = state.poll(OperationScope::Zone, name);
        Box::pin(ready(result))
    }

    fn get_global_operation<'a>(
        &'a self,
        _scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        let mut state = self.state();
        state
            .calls
            .push(ComputeCall::GetGlobalOperation(name.to_owned()));
        let result = state.poll(OperationScope::Global, name);
        Box::pin(ready(result))
    }
}

/// Scope used throughout the test suites.
#[must_use]
pub fn test_scope() -> Scope {
    Scope {
        project: String::from("gaming-project"),
        region: String::from("asia-northeast1"),
        zone: String::from("asia-northeast1-a"),
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets environment variables while holding a global mutex. Keys listed
    /// in `removed` are cleared for the lifetime of the guard.
    pub async fn set_vars(pairs: &[(&str, &str)], removed: &[&str]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs
                    .iter()
                    .map(|(key, _)| key)
                    .chain(removed)
                    .all(|key| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len() + removed.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
        }
        for key in removed {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in self.previous.iter().rev() {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
