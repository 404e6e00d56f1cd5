//! ConfigMap Feature Gate
//!
//! Feature flag states live in a ConfigMap as `<feature>: "true" | "false"`.
//! The map is re-read on every query so flips take effect on the next poll.

use crate::config::FeatureStatesConfig;
use crate::domain::ports::FeatureGate;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::Api;
use kube::Client;
use std::collections::BTreeMap;
use tracing::warn;

/// Feature gate backed by a ConfigMap
pub struct ConfigMapFeatureGate {
    api: Api<ConfigMap>,
    name: String,
}

impl ConfigMapFeatureGate {
    pub fn new(client: Client, config: &FeatureStatesConfig) -> Self {
        Self {
            api: Api::namespaced(client, &config.namespace),
            name: config.name.clone(),
        }
    }
}

/// Whether `feature` is switched on in the ConfigMap data
pub fn feature_enabled(data: Option<&BTreeMap<String, String>>, feature: &str) -> bool {
    data.and_then(|data| data.get(feature))
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[async_trait]
impl FeatureGate for ConfigMapFeatureGate {
    async fn is_enabled(&self, feature: &str) -> bool {
        match self.api.get(&self.name).await {
            Ok(config_map) => feature_enabled(config_map.data.as_ref(), feature),
            Err(e) => {
                warn!("Failed to read feature states from {}: {}", self.name, e);
                false
            }
        }
    }
}
