//! Configuration loading via `ortho-config`.
//!
//! Provider credentials come from the `AWS_*` environment variables. Workflow
//! settings merge defaults, `skiff.toml` and `SKIFF_*` environment variables.

use std::fmt;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::poll::PollConfig;
use crate::provider::RegionTarget;

/// Region used when `AWS_DEFAULT_REGION` is unset.
pub const DEFAULT_REGION: &str = "ap-east-1";

/// Upper bound for the delay between post-launch status checks.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Provider credentials and default region read from the environment.
#[derive(Clone, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "AWS")]
pub struct ProviderConfig {
    /// Access key identifier. Required before any provider call.
    pub access_key_id: Option<String>,
    /// Secret access key. Required before any provider call.
    pub secret_access_key: Option<String>,
    /// Region addressed by `provision` and `sweep`.
    #[ortho_config(default = DEFAULT_REGION.to_owned())]
    pub default_region: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("default_region", &self.default_region)
            .finish()
    }
}

/// Validated access key pair used to sign provider requests.
#[derive(Clone, Eq, PartialEq)]
pub struct ProviderCredentials {
    /// Access key identifier.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: Option<&'static str>,
}

impl FieldMetadata {
    const fn env_only(description: &'static str, env_var: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key: None,
        }
    }

    const fn layered(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key: Some(toml_key),
        }
    }

    fn missing(&self) -> ConfigError {
        let hint = match self.toml_key {
            Some(key) => format!("set {} or add {key} to skiff.toml", self.env_var),
            None => format!("set {} in the environment", self.env_var),
        };
        ConfigError::MissingField(format!("missing {}: {hint}", self.description))
    }
}

fn require_field(value: Option<&str>, metadata: &FieldMetadata) -> Result<String, ConfigError> {
    match value.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Ok(trimmed.to_owned()),
        _ => Err(metadata.missing()),
    }
}

impl ProviderConfig {
    /// Loads credentials and region from defaults and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("skiff")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the validated credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the environment variable
    /// to set when either half of the key pair is absent or blank.
    pub fn credentials(&self) -> Result<ProviderCredentials, ConfigError> {
        let access_key = require_field(
            self.access_key_id.as_deref(),
            &FieldMetadata::env_only("AWS access key ID", "AWS_ACCESS_KEY_ID"),
        )?;
        let secret_key = require_field(
            self.secret_access_key.as_deref(),
            &FieldMetadata::env_only("AWS secret access key", "AWS_SECRET_ACCESS_KEY"),
        )?;
        Ok(ProviderCredentials {
            access_key,
            secret_key,
        })
    }

    /// Returns the configured default region.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the region is blank.
    pub fn region(&self) -> Result<RegionTarget, ConfigError> {
        require_field(
            Some(&self.default_region),
            &FieldMetadata::env_only("AWS region", "AWS_DEFAULT_REGION"),
        )
        .map(RegionTarget::new)
    }
}

/// Workflow settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SKIFF",
    discovery(
        app_name = "skiff",
        env_var = "SKIFF_CONFIG_PATH",
        config_file_name = "skiff.toml",
        dotfile_name = ".skiff.toml",
        project_file_name = "skiff.toml"
    )
)]
pub struct SkiffConfig {
    /// Instance type for every launch and the shape filter of `reset`.
    #[ortho_config(default = "t3.medium".to_owned())]
    pub instance_shape: String,
    /// Key pair ensured by `provision` and `relocate`.
    #[ortho_config(default = "skiff-auto-key".to_owned())]
    pub key_name: String,
    /// Key pair recreated by `reset`.
    #[ortho_config(default = "skiff-reset-key".to_owned())]
    pub reset_key_name: String,
    /// Network access rule set name.
    #[ortho_config(default = "SkiffOpenSG".to_owned())]
    pub rule_set_name: String,
    /// Value of the `Name` tag on launched instances.
    #[ortho_config(default = "skiff-node".to_owned())]
    pub instance_name: String,
    /// Comma-separated regions tried after the default region by `provision`.
    #[ortho_config(default = String::new())]
    pub failover_regions: String,
    /// Region recommended once every candidate region failed.
    #[ortho_config(default = "ap-southeast-1".to_owned())]
    pub suggested_region: String,
    /// Region swept and reprovisioned by `reset`.
    #[ortho_config(default = "ap-northeast-1".to_owned())]
    pub reset_region: String,
    /// Region swept by `relocate`.
    #[ortho_config(default = "us-east-1".to_owned())]
    pub relocate_from: String,
    /// Region provisioned by `relocate`.
    #[ortho_config(default = "ap-northeast-1".to_owned())]
    pub relocate_to: String,
    /// Comma-separated users whose password `reset` also sets.
    #[ortho_config(default = "ubuntu".to_owned())]
    pub extra_login_users: String,
    /// Root login password; a random one is generated per run when unset.
    pub admin_password: Option<String>,
    /// Directory receiving `<key name>.pem` files.
    #[ortho_config(default = ".".to_owned())]
    pub key_dir: String,
    /// Seconds to wait for a launched instance to become reachable.
    #[ortho_config(default = 300)]
    pub launch_timeout_secs: u64,
    /// Initial seconds between instance status checks.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Inline bootstrap script replacing the generated one.
    pub bootstrap_script: Option<String>,
    /// Path to a bootstrap script replacing the generated one.
    pub bootstrap_script_file: Option<String>,
}

impl SkiffConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("skiff")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and TOML key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required field is blank or a duration
    /// is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (
                &self.instance_shape,
                FieldMetadata::layered("instance type", "SKIFF_INSTANCE_SHAPE", "instance_shape"),
            ),
            (
                &self.key_name,
                FieldMetadata::layered("key pair name", "SKIFF_KEY_NAME", "key_name"),
            ),
            (
                &self.reset_key_name,
                FieldMetadata::layered(
                    "reset key pair name",
                    "SKIFF_RESET_KEY_NAME",
                    "reset_key_name",
                ),
            ),
            (
                &self.rule_set_name,
                FieldMetadata::layered("rule set name", "SKIFF_RULE_SET_NAME", "rule_set_name"),
            ),
            (
                &self.instance_name,
                FieldMetadata::layered("instance name", "SKIFF_INSTANCE_NAME", "instance_name"),
            ),
            (
                &self.key_dir,
                FieldMetadata::layered("key directory", "SKIFF_KEY_DIR", "key_dir"),
            ),
        ];
        for (value, metadata) in &required {
            require_field(Some(value.as_str()), metadata)?;
        }
        if self.launch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "launch_timeout_secs must be greater than zero (SKIFF_LAUNCH_TIMEOUT_SECS)",
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "poll_interval_secs must be greater than zero (SKIFF_POLL_INTERVAL_SECS)",
            )));
        }
        Ok(())
    }

    /// Polling schedule for freshly launched instances.
    #[must_use]
    pub const fn poll_config(&self) -> PollConfig {
        PollConfig::exponential(
            Duration::from_secs(self.poll_interval_secs),
            MAX_POLL_INTERVAL,
            Duration::from_secs(self.launch_timeout_secs),
        )
    }

    /// Regions tried after the primary region, in order.
    #[must_use]
    pub fn failover_regions(&self) -> Vec<RegionTarget> {
        split_list(&self.failover_regions)
            .map(RegionTarget::new)
            .collect()
    }

    /// Users whose password is set alongside root's by `reset`.
    #[must_use]
    pub fn extra_login_users(&self) -> Vec<String> {
        split_list(&self.extra_login_users)
            .map(str::to_owned)
            .collect()
    }

    /// Configured root password, or a freshly generated one.
    #[must_use]
    pub fn login_password(&self) -> String {
        self.admin_password
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map_or_else(
                || uuid::Uuid::new_v4().simple().to_string(),
                str::to_owned,
            )
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Errors raised during configuration loading and validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
