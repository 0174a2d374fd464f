//! Read-only listing of instances in the managed zone.

use std::io::Write;

use crate::clock::{Clock, display_rfc3339};
use crate::compute::ComputeApi;
use crate::model::Instance;

use super::{LifecycleController, LifecycleError};

impl<A, C> LifecycleController<A, C>
where
    A: ComputeApi,
    C: Clock,
{
    /// Prints every instance in the managed zone with its last start time in
    /// UTC+9, or a notice when none is running.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Provider`] when the listing fails and
    /// [`LifecycleError::InvalidTimestamp`] when a start time cannot be
    /// parsed.
    pub async fn list<W: Write + ?Sized>(
        &self,
        out: &mut W,
    ) -> Result<Vec<Instance>, LifecycleError<A::Error>> {
        let instances = self.instances().await?;
        write_instances(out, &instances)?;
        Ok(instances)
    }
}

pub(super) fn write_instances<W, E>(
    out: &mut W,
    instances: &[Instance],
) -> Result<(), LifecycleError<E>>
where
    W: Write + ?Sized,
    E: std::error::Error + 'static,
{
    if instances.is_empty() {
        writeln!(out, "No instances are running.")?;
        return Ok(());
    }

    for instance in instances {
        let last_start = instance.last_start_timestamp.as_deref().map_or_else(
            || Ok(String::from("never started")),
            |raw| {
                display_rfc3339(raw).map_err(|_| LifecycleError::InvalidTimestamp {
                    instance: instance.name.clone(),
                    value: raw.to_owned(),
                })
            },
        )?;
        writeln!(out, "Name: {}, LastStart: {last_start}", instance.name)?;
    }
    Ok(())
}
