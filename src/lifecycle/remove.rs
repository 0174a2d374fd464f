//! Snapshot-and-terminate: back the instance up into a fresh machine image,
//! drop every older image, then delete the instance.

use std::io::Write;

use tracing::{info, warn};

use crate::clock::{Clock, description_stamp, resource_stamp};
use crate::compute::ComputeApi;
use crate::model::MachineImage;
use crate::report::write_operation;

use super::{LifecycleController, LifecycleError};

/// What [`LifecycleController::snapshot_and_terminate`] changed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoveSummary {
    /// Instance that was stopped and deleted.
    pub instance: String,
    /// Machine image created from it.
    pub backup_image: String,
    /// Older machine images whose deletion was accepted.
    pub deleted_images: Vec<String>,
}

impl<A, C> LifecycleController<A, C>
where
    A: ComputeApi,
    C: Clock,
{
    /// Stops the single running instance, snapshots it into
    /// `backup-<YYYY-MM-DD-HH-MM-SS>`, deletes every other machine image, and
    /// finally deletes the instance.
    ///
    /// Image deletions are accepted without waiting for them to finish. The
    /// first rejected deletion aborts the cleanup and leaves the instance in
    /// place.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NoInstanceRunning`] or
    /// [`LifecycleError::MultipleInstances`] when the zone does not hold
    /// exactly one instance, and propagates provider and wait failures.
    pub async fn snapshot_and_terminate<W: Write + ?Sized>(
        &self,
        out: &mut W,
    ) -> Result<RemoveSummary, LifecycleError<A::Error>> {
        let mut instances = self.instances().await?;
        let instance = match instances.len() {
            0 => return Err(LifecycleError::NoInstanceRunning),
            1 => instances.remove(0).name,
            count => return Err(LifecycleError::MultipleInstances { count }),
        };

        info!(instance = %instance, "stopping instance");
        let operation = self
            .api
            .stop_instance(&self.scope, &instance)
            .await
            .map_err(LifecycleError::Provider)?;
        self.wait_zonal(operation, out).await?;
        writeln!(out, "Stopped instance {instance}.")?;

        let now = self.clock.now();
        let backup = MachineImage {
            name: format!("backup-{}", resource_stamp(now)),
            description: Some(format!("Machine image created at {}", description_stamp(now))),
            source_instance: Some(self.scope.instance_path(&instance)),
            storage_locations: vec![self.scope.region.clone()],
            creation_timestamp: None,
        };
        info!(image = %backup.name, instance = %instance, "creating machine image");
        let operation = self
            .api
            .insert_machine_image(&self.scope, &backup)
            .await
            .map_err(LifecycleError::Provider)?;
        self.wait_global(operation, out).await?;
        writeln!(out, "Machine image {} created.", backup.name)?;

        let deleted_images = self.delete_other_images(&backup.name, out).await?;
        writeln!(out, "Deleted machine images other than {}.", backup.name)?;

        info!(instance = %instance, "deleting instance");
        let operation = self
            .api
            .delete_instance(&self.scope, &instance)
            .await
            .map_err(LifecycleError::Provider)?;
        self.wait_zonal(operation, out).await?;
        writeln!(out, "Deleted instance {instance}.")?;

        Ok(RemoveSummary {
            instance,
            backup_image: backup.name,
            deleted_images,
        })
    }

    async fn delete_other_images<W: Write + ?Sized>(
        &self,
        keep: &str,
        out: &mut W,
    ) -> Result<Vec<String>, LifecycleError<A::Error>> {
        let images = self
            .api
            .list_machine_images(&self.scope)
            .await
            .map_err(LifecycleError::Provider)?;

        let mut deleted = Vec::new();
        for image in images.into_iter().filter(|image| image.name != keep) {
            let operation = self
                .api
                .delete_machine_image(&self.scope, &image.name)
                .await
                .inspect_err(|err| {
                    warn!(image = %image.name, error = %err, "machine image deletion rejected");
                })
                .map_err(LifecycleError::Provider)?;
            write_operation(out, &operation)?;
            info!(image = %image.name, "machine image deletion accepted");
            deleted.push(image.name);
        }
        Ok(deleted)
    }
}
