//! Configuration loading via `ortho-config`.

use std::time::Duration;

use crate::compute::Scope;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default region used as the machine image storage location.
pub const DEFAULT_REGION: &str = "asia-northeast1";

/// Default zone hosting the gaming instance.
pub const DEFAULT_ZONE: &str = "asia-northeast1-a";

/// Default Compute Engine REST endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Operator configuration derived from environment variables and
/// configuration files. Command-line options are layered on top with
/// [`OperatorConfig::with_overrides`].
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "CLOUD_GAMING_OPERATOR")]
pub struct OperatorConfig {
    /// Google Cloud project identifier. Required, but may be supplied on the
    /// command line instead.
    pub project_id: Option<String>,
    /// Region holding machine image data. Defaults to `asia-northeast1`.
    #[ortho_config(default = "asia-northeast1".to_owned())]
    pub region: String,
    /// Zone hosting the instance. Defaults to `asia-northeast1-a`.
    #[ortho_config(default = "asia-northeast1-a".to_owned())]
    pub zone: String,
    /// OAuth 2.0 access token with the `compute` scope.
    pub access_token: Option<String>,
    /// Compute Engine REST endpoint, overridable for testing.
    #[ortho_config(default = "https://compute.googleapis.com/compute/v1".to_owned())]
    pub api_endpoint: String,
    /// Seconds between operation status queries.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Upper bound on each operation wait, in seconds. Unset waits forever.
    pub operation_timeout_secs: Option<u64>,
}

/// Values supplied on the command line that take precedence over loaded
/// configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigOverrides {
    /// Project identifier override.
    pub project_id: Option<String>,
    /// Region override.
    pub region: Option<String>,
    /// Zone override.
    pub zone: Option<String>,
    /// Operation timeout override, in seconds.
    pub operation_timeout_secs: Option<u64>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    key: &'static str,
    flag: Option<&'static str>,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        key: &'static str,
        flag: Option<&'static str>,
    ) -> Self {
        Self {
            description,
            env_var,
            key,
            flag,
        }
    }

    fn missing(&self) -> ConfigError {
        let flag_hint = self
            .flag
            .map_or_else(String::new, |flag| format!("pass {flag}, "));
        ConfigError::MissingField(format!(
            "missing {}: {flag_hint}set {} or add {} to the configuration file",
            self.description, self.env_var, self.key
        ))
    }
}

const PROJECT_ID: FieldMetadata = FieldMetadata::new(
    "Google Cloud project ID",
    "CLOUD_GAMING_OPERATOR_PROJECT_ID",
    "project_id",
    Some("--project-id"),
);
const ACCESS_TOKEN: FieldMetadata = FieldMetadata::new(
    "Compute Engine access token",
    "CLOUD_GAMING_OPERATOR_ACCESS_TOKEN",
    "access_token",
    None,
);
const REGION: FieldMetadata = FieldMetadata::new(
    "region",
    "CLOUD_GAMING_OPERATOR_REGION",
    "region",
    Some("--region"),
);
const ZONE: FieldMetadata = FieldMetadata::new(
    "zone",
    "CLOUD_GAMING_OPERATOR_ZONE",
    "zone",
    Some("--zone"),
);
const API_ENDPOINT: FieldMetadata = FieldMetadata::new(
    "Compute Engine API endpoint",
    "CLOUD_GAMING_OPERATOR_API_ENDPOINT",
    "api_endpoint",
    None,
);

impl OperatorConfig {
    fn require_field(value: Option<&str>, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        match value {
            Some(text) if !text.trim().is_empty() => Ok(()),
            _ => Err(metadata.missing()),
        }
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("cloud-gaming-operator")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies command-line overrides. Zone and region are independent: a
    /// zone override never touches the region.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(project_id) = &overrides.project_id {
            self.project_id = Some(project_id.clone());
        }
        if let Some(region) = &overrides.region {
            self.region.clone_from(region);
        }
        if let Some(zone) = &overrides.zone {
            self.zone.clone_from(zone);
        }
        if overrides.operation_timeout_secs.is_some() {
            self.operation_timeout_secs = overrides.operation_timeout_secs;
        }
        self
    }

    /// Performs semantic validation on required fields. Error messages name
    /// the flag, environment variable, and configuration key for each one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidValue`] when the poll interval is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(self.project_id.as_deref(), &PROJECT_ID)?;
        Self::require_field(self.access_token.as_deref(), &ACCESS_TOKEN)?;
        Self::require_field(Some(self.region.as_str()), &REGION)?;
        Self::require_field(Some(self.zone.as_str()), &ZONE)?;
        Self::require_field(Some(self.api_endpoint.as_str()), &API_ENDPOINT)?;
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "poll_interval_secs must be at least 1",
            )));
        }
        Ok(())
    }

    /// Builds the immutable [`Scope`] the workflows run against.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn scope(&self) -> Result<Scope, ConfigError> {
        self.validate()?;
        Scope::new(
            self.project_id.clone().unwrap_or_default(),
            self.region.as_str(),
            self.zone.as_str(),
        )
        .map_err(|err| ConfigError::InvalidValue(err.to_string()))
    }

    /// Interval between operation status queries.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Optional bound on each operation wait.
    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
