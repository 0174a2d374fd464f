//! Provider abstraction for the Compute Engine calls the workflows issue.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::model::{Instance, InstanceInsert, MachineImage, Operation};

/// Project, region, and zone every workflow is scoped to.
///
/// Built once at startup and passed to each call; nothing mutates it
/// afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Scope {
    /// Project identifier.
    pub project: String,
    /// Region used as the storage location for machine images.
    pub region: String,
    /// Zone hosting the managed instance.
    pub zone: String,
}

impl Scope {
    /// Creates a scope, trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Empty`] when any field is blank.
    pub fn new(
        project: impl Into<String>,
        region: impl Into<String>,
        zone: impl Into<String>,
    ) -> Result<Self, ScopeError> {
        let scope = Self {
            project: project.into().trim().to_owned(),
            region: region.into().trim().to_owned(),
            zone: zone.into().trim().to_owned(),
        };
        if scope.project.is_empty() {
            return Err(ScopeError::Empty("project"));
        }
        if scope.region.is_empty() {
            return Err(ScopeError::Empty("region"));
        }
        if scope.zone.is_empty() {
            return Err(ScopeError::Empty("zone"));
        }
        Ok(scope)
    }

    /// Fully qualified path of an instance in the managed zone.
    #[must_use]
    pub fn instance_path(&self, name: &str) -> String {
        format!(
            "projects/{}/zones/{}/instances/{name}",
            self.project, self.zone
        )
    }
}

/// Errors raised when building a [`Scope`].
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum ScopeError {
    /// Raised when a scope field is empty.
    #[error("missing or empty scope field: {0}")]
    Empty(&'static str),
}

/// Future returned by provider calls.
pub type ApiFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Compute Engine operations used by the lifecycle workflows.
///
/// Mutating calls return the provider's [`Operation`] without waiting for
/// it; callers hand it to the poller.
pub trait ComputeApi {
    /// Provider specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists instances in the scope's zone.
    fn list_instances<'a>(&'a self, scope: &'a Scope) -> ApiFuture<'a, Vec<Instance>, Self::Error>;

    /// Creates an instance in the scope's zone.
    fn insert_instance<'a>(
        &'a self,
        scope: &'a Scope,
        instance: &'a InstanceInsert,
    ) -> ApiFuture<'a, Operation, Self::Error>;

    /// Stops the named instance.
    fn stop_instance<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error>;

    /// Deletes the named instance.
    fn delete_instance<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error>;

    /// Lists machine images in the scope's project.
    fn list_machine_images<'a>(
        &'a self,
        scope: &'a Scope,
    ) -> ApiFuture<'a, Vec<MachineImage>, Self::Error>;

    /// Creates a machine image.
    fn insert_machine_image<'a>(
        &'a self,
        scope: &'a Scope,
        image: &'a MachineImage,
    ) -> ApiFuture<'a, Operation, Self::Error>;

    /// Deletes the named machine image.
    fn delete_machine_image<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error>;

    /// Fetches the current state of a zonal operation.
    fn get_zone_operation<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error>;

    /// Fetches the current state of a global operation.
    fn get_global_operation<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error>;
}
