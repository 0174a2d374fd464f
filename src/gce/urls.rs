//! Resource URLs for the Compute Engine v1 REST API.

use crate::compute::Scope;

pub(super) fn instances(endpoint: &str, scope: &Scope) -> String {
    format!(
        "{endpoint}/projects/{}/zones/{}/instances",
        scope.project, scope.zone
    )
}

pub(super) fn instance(endpoint: &str, scope: &Scope, name: &str) -> String {
    format!("{}/{name}", instances(endpoint, scope))
}

pub(super) fn instance_action(endpoint: &str, scope: &Scope, name: &str, action: &str) -> String {
    format!("{}/{action}", instance(endpoint, scope, name))
}

pub(super) fn machine_images(endpoint: &str, scope: &Scope) -> String {
    format!("{endpoint}/projects/{}/global/machineImages", scope.project)
}

pub(super) fn machine_image(endpoint: &str, scope: &Scope, name: &str) -> String {
    format!("{}/{name}", machine_images(endpoint, scope))
}

pub(super) fn zone_operation(endpoint: &str, scope: &Scope, name: &str) -> String {
    format!(
        "{endpoint}/projects/{}/zones/{}/operations/{name}",
        scope.project, scope.zone
    )
}

pub(super) fn global_operation(endpoint: &str, scope: &Scope, name: &str) -> String {
    format!(
        "{endpoint}/projects/{}/global/operations/{name}",
        scope.project
    )
}
