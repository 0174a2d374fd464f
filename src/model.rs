//! Compute Engine resources as seen by the lifecycle controller.
//!
//! Only the fields the workflows inspect are typed. Operations keep every
//! other provider field in [`Operation::extra`] so the raw object can be
//! echoed back to the operator unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A virtual machine instance in the managed zone.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Instance name, unique within the zone.
    pub name: String,
    /// Provider lifecycle status (for example `RUNNING` or `TERMINATED`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// RFC 3339 timestamp of the last start, absent for never-started
    /// instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_start_timestamp: Option<String>,
}

/// Request body for creating an instance from a machine image.
#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInsert {
    /// Name of the new instance.
    pub name: String,
    /// Relative path of the machine image (`global/machineImages/<name>`).
    pub source_machine_image: String,
}

impl InstanceInsert {
    /// Builds a request that restores `image_name` into a new instance.
    #[must_use]
    pub fn from_machine_image(name: impl Into<String>, image_name: &str) -> Self {
        Self {
            name: name.into(),
            source_machine_image: format!("global/machineImages/{image_name}"),
        }
    }
}

/// A machine image: an immutable snapshot of an instance's disks.
///
/// The same shape is used both for list results and for the insert request
/// body; optional fields are omitted from the request when unset.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineImage {
    /// Image name, unique within the project.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fully qualified path of the instance the image was taken from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_instance: Option<String>,
    /// Regions holding the image data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage_locations: Vec<String>,
    /// Creation time reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
}

/// Status of an asynchronous provider operation.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Accepted but not started.
    Pending,
    /// In progress.
    Running,
    /// Terminal; the operation will not change further.
    Done,
    /// Any status this crate does not recognise.
    #[default]
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    /// Returns `true` for the terminal status.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }

    /// Wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error payload attached to a finished operation.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct OperationError {
    /// Individual errors reported by the provider.
    #[serde(default)]
    pub errors: Vec<OperationErrorDetail>,
}

impl OperationError {
    /// Joins the individual error messages into one line.
    #[must_use]
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|detail| match (&detail.code, &detail.message) {
                (Some(code), Some(message)) => format!("{code}: {message}"),
                (Some(code), None) => code.clone(),
                (None, Some(message)) => message.clone(),
                (None, None) => String::from("unspecified error"),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// One entry of an [`OperationError`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct OperationErrorDetail {
    /// Provider error code (for example `QUOTA_EXCEEDED`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An in-flight or finished asynchronous mutation.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Opaque handle used to look the operation up again.
    pub name: String,
    /// Current status.
    #[serde(default)]
    pub status: OperationStatus,
    /// Completion estimate between 0 and 100.
    #[serde(default)]
    pub progress: u32,
    /// Error payload, only meaningful once the operation is done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    /// Remaining provider fields, preserved for display.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Operation {
    /// Returns the error payload when the provider reported at least one
    /// error.
    #[must_use]
    pub fn failure(&self) -> Option<&OperationError> {
        self.error
            .as_ref()
            .filter(|payload| !payload.errors.is_empty())
    }
}

/// One page of a provider list response.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub(crate) items: Vec<T>,
    #[serde(default)]
    pub(crate) next_page_token: Option<String>,
}
