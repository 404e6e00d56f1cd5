//! Service Configuration
//!
//! The configuration the StoragePool service is started with, loaded from a
//! YAML file. Field names are camelCase on disk.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Defaults
// =============================================================================

/// Interval between feature gate checks
pub const DEFAULT_FEATURE_CHECK_INTERVAL_SECS: u64 = 60;

/// Interval at which the change listener re-reads the installed session
pub const DEFAULT_LISTENER_INTERVAL_SECS: u64 = 30;

/// Interval at which the installed session is probed for liveness
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 120;

/// Upper bound for every interval and timeout in the configuration
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// CSI provisioner whose storage classes are tracked
pub const DEFAULT_PROVISIONER: &str = "csi.vsphere.vmware.com";

/// Feature flag gating the decommission controller
pub const DISK_DECOMMISSION_FEATURE: &str = "vsan-direct-disk-decommission";

fn default_port() -> u16 {
    443
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_feature_check_interval() -> u64 {
    DEFAULT_FEATURE_CHECK_INTERVAL_SECS
}

fn default_listener_interval() -> u64 {
    DEFAULT_LISTENER_INTERVAL_SECS
}

fn default_keepalive_interval() -> u64 {
    DEFAULT_KEEPALIVE_INTERVAL_SECS
}

fn default_provisioner() -> String {
    DEFAULT_PROVISIONER.to_string()
}

fn default_feature_states_name() -> String {
    "internal-feature-states.csi.vsphere.vmware.com".to_string()
}

fn default_feature_states_namespace() -> String {
    "vmware-system-csi".to_string()
}

// =============================================================================
// Endpoint Configuration
// =============================================================================

/// Connection settings for the remote storage-management endpoint
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Endpoint host name or address
    pub host: String,
    /// HTTPS port
    #[serde(default = "default_port")]
    pub port: u16,
    /// User to authenticate as
    pub username: String,
    /// Password for `username`
    pub password: String,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl EndpointConfig {
    /// Base URL of the endpoint
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("insecure", &self.insecure)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// =============================================================================
// Feature States Configuration
// =============================================================================

/// Location of the ConfigMap holding feature flag states
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureStatesConfig {
    #[serde(default = "default_feature_states_name")]
    pub name: String,
    #[serde(default = "default_feature_states_namespace")]
    pub namespace: String,
}

impl Default for FeatureStatesConfig {
    fn default() -> Self {
        Self {
            name: default_feature_states_name(),
            namespace: default_feature_states_namespace(),
        }
    }
}

// =============================================================================
// Config Info
// =============================================================================

/// Top-level configuration of the StoragePool service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInfo {
    /// Identifier of this cluster on the storage endpoint
    pub cluster_id: String,
    /// Storage-management endpoint
    pub endpoint: EndpointConfig,
    /// Feature flag ConfigMap
    #[serde(default)]
    pub feature_states: FeatureStatesConfig,
    /// Seconds between feature gate checks
    #[serde(default = "default_feature_check_interval")]
    pub feature_check_interval_secs: u64,
    /// Seconds between change listener passes
    #[serde(default = "default_listener_interval")]
    pub listener_interval_secs: u64,
    /// Seconds between session liveness probes
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,
    /// CSI provisioner name
    #[serde(default = "default_provisioner")]
    pub provisioner: String,
}

impl ConfigInfo {
    /// Parse configuration from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: ConfigInfo = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.cluster_id.trim().is_empty() {
            return Err(Error::Configuration("clusterId must not be empty".into()));
        }
        if self.endpoint.host.trim().is_empty() {
            return Err(Error::Configuration("endpoint.host must not be empty".into()));
        }
        if self.provisioner.trim().is_empty() {
            return Err(Error::Configuration("provisioner must not be empty".into()));
        }
        for (name, value) in [
            ("featureCheckIntervalSecs", self.feature_check_interval_secs),
            ("listenerIntervalSecs", self.listener_interval_secs),
            ("keepaliveIntervalSecs", self.keepalive_interval_secs),
            ("endpoint.timeoutSecs", self.endpoint.timeout_secs),
        ] {
            if value == 0 {
                return Err(Error::Configuration(format!("{} must be positive", name)));
            }
            if value > MAX_INTERVAL_SECS {
                return Err(Error::Configuration(format!(
                    "{} must not exceed {} seconds",
                    name, MAX_INTERVAL_SECS
                )));
            }
        }
        Ok(())
    }

    pub fn feature_check_interval(&self) -> Duration {
        Duration::from_secs(self.feature_check_interval_secs)
    }

    pub fn listener_interval(&self) -> Duration {
        Duration::from_secs(self.listener_interval_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}
