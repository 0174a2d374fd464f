//! Compute Engine v1 REST implementation of [`ComputeApi`].

mod error;
mod http;
mod urls;

use std::time::Duration;

use reqwest::Method;

use crate::compute::{ApiFuture, ComputeApi, Scope};
use crate::config::OperatorConfig;
use crate::model::{Instance, InstanceInsert, MachineImage, Operation};

pub use error::ComputeError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Compute Engine REST API.
///
/// Requests are authorised with a bearer token obtained outside this crate
/// (for example `gcloud auth print-access-token`).
#[derive(Clone, Debug)]
pub struct GceClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl GceClient {
    /// Creates a client for `endpoint` (for example
    /// `https://compute.googleapis.com/compute/v1`).
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::Config`] when the endpoint or token is blank and
    /// [`ComputeError::Client`] when the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, ComputeError> {
        let trimmed_endpoint = endpoint.into().trim().trim_end_matches('/').to_owned();
        let trimmed_token = access_token.into().trim().to_owned();
        if trimmed_endpoint.is_empty() {
            return Err(ComputeError::Config(String::from("api_endpoint is empty")));
        }
        if trimmed_token.is_empty() {
            return Err(ComputeError::Config(String::from("access_token is empty")));
        }

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| ComputeError::Client(err.to_string()))?;

        Ok(Self {
            http,
            endpoint: trimmed_endpoint,
            access_token: trimmed_token,
        })
    }

    /// Creates a client from validated operator configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::Config`] when the configuration fails
    /// validation.
    pub fn from_config(config: &OperatorConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Self::new(
            config.api_endpoint.as_str(),
            config.access_token.clone().unwrap_or_default(),
        )
    }

    /// Base URL requests are issued against.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ComputeApi for GceClient {
    type Error = ComputeError;

    fn list_instances<'a>(&'a self, scope: &'a Scope) -> ApiFuture<'a, Vec<Instance>, Self::Error> {
        Box::pin(async move {
            self.list_all::<Instance>(&urls::instances(&self.endpoint, scope))
                .await
        })
    }

    fn insert_instance<'a>(
        &'a self,
        scope: &'a Scope,
        instance: &'a InstanceInsert,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        Box::pin(async move {
            let url = urls::instances(&self.endpoint, scope);
            self.call::<Operation, _>(Method::POST, &url, Some(instance)).await
        })
    }

    fn stop_instance<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        Box::pin(async move {
            let url = urls::instance_action(&self.endpoint, scope, name, "stop");
            self.call::<Operation, ()>(Method::POST, &url, None).await
        })
    }

    fn delete_instance<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        Box::pin(async move {
            let url = urls::instance(&self.endpoint, scope, name);
            self.call::<Operation, ()>(Method::DELETE, &url, None).await
        })
    }

    fn list_machine_images<'a>(
        &'a self,
        scope: &'a Scope,
    ) -> ApiFuture<'a, Vec<MachineImage>, Self::Error> {
        Box::pin(async move {
            self.list_all::<MachineImage>(&urls::machine_images(&self.endpoint, scope))
                .await
        })
    }

    fn insert_machine_image<'a>(
        &'a self,
        scope: &'a Scope,
        image: &'a MachineImage,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        Box::pin(async move {
            let url = urls::machine_images(&self.endpoint, scope);
            self.call::<Operation, _>(Method::POST, &url, Some(image)).await
        })
    }

    fn delete_machine_image<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        Box::pin(async move {
            let url = urls::machine_image(&self.endpoint, scope, name);
            self.call::<Operation, ()>(Method::DELETE, &url, None).await
        })
    }

    fn get_zone_operation<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        Box::pin(async move {
            let url = urls::zone_operation(&self.endpoint, scope, name);
            self.call::<Operation, ()>(Method::GET, &url, None).await
        })
    }

    fn get_global_operation<'a>(
        &'a self,
        scope: &'a Scope,
        name: &'a str,
    ) -> ApiFuture<'a, Operation, Self::Error> {
        Box::pin(async move {
            let url = urls::global_operation(&self.endpoint, scope, name);
            self.call::<Operation, ()>(Method::GET, &url, None).await
        })
    }
}
