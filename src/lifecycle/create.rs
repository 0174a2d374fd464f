//! Ensure-running: restore the instance from the project's machine image.

use std::io::Write;

use tracing::info;

use crate::clock::{Clock, resource_stamp};
use crate::compute::ComputeApi;
use crate::model::InstanceInsert;

use super::list::write_instances;
use super::{LifecycleController, LifecycleError};

/// Result of [`LifecycleController::ensure_running`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CreateOutcome {
    /// An instance already existed; nothing was created.
    AlreadyRunning,
    /// A new instance was created.
    Created {
        /// Name of the new instance.
        instance: String,
        /// Machine image it was restored from.
        image: String,
    },
}

impl<A, C> LifecycleController<A, C>
where
    A: ComputeApi,
    C: Clock,
{
    /// Makes sure an instance is running, creating one from the single
    /// machine image when the zone is empty.
    ///
    /// The new instance is named `instance-<YYYY-MM-DD-HH-MM-SS>` with the
    /// current time in UTC+9.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NoMachineImage`] or
    /// [`LifecycleError::AmbiguousMachineImage`] when the project does not
    /// hold exactly one image, and propagates provider and wait failures.
    pub async fn ensure_running<W: Write + ?Sized>(
        &self,
        out: &mut W,
    ) -> Result<CreateOutcome, LifecycleError<A::Error>> {
        let instances = self.instances().await?;
        if !instances.is_empty() {
            writeln!(out, "Instance is already running.")?;
            write_instances(out, &instances)?;
            return Ok(CreateOutcome::AlreadyRunning);
        }

        let mut images = self
            .api
            .list_machine_images(&self.scope)
            .await
            .map_err(LifecycleError::Provider)?;
        let image = match images.len() {
            0 => return Err(LifecycleError::NoMachineImage),
            1 => images.remove(0),
            count => return Err(LifecycleError::AmbiguousMachineImage { count }),
        };

        let instance = format!("instance-{}", resource_stamp(self.clock.now()));
        let request = InstanceInsert::from_machine_image(instance.as_str(), &image.name);
        info!(instance = %instance, image = %image.name, "creating instance");
        let operation = self
            .api
            .insert_instance(&self.scope, &request)
            .await
            .map_err(LifecycleError::Provider)?;
        self.wait_zonal(operation, out).await?;

        writeln!(
            out,
            "Instance {instance} created from machine image {}.",
            image.name
        )?;
        Ok(CreateOutcome::Created {
            instance,
            image: image.name,
        })
    }
}
