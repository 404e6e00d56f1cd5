//! StoragePool CRD
//!
//! One cluster-scoped StoragePool per backing datastore, describing which
//! nodes can reach it and how much capacity it offers.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// StoragePool CRD
// =============================================================================

/// StoragePool mirrors a datastore of the storage-management endpoint
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cns.vmware.com",
    version = "v1alpha1",
    kind = "StoragePool",
    plural = "storagepools",
    shortname = "sp",
    status = "StoragePoolStatus",
    printcolumn = r#"{"name": "Driver", "type": "string", "jsonPath": ".spec.driver"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct StoragePoolSpec {
    /// CSI driver serving this pool
    pub driver: String,

    /// Driver-specific parameters (datastore URL, decommission mode, ...)
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

// =============================================================================
// Status
// =============================================================================

/// Observed state of a StoragePool
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoragePoolStatus {
    /// Nodes that can access the datastore
    #[serde(default)]
    pub accessible_nodes: Vec<String>,

    /// Capacity of the datastore
    #[serde(default)]
    pub capacity: Option<PoolCapacity>,

    /// Storage classes whose policy is satisfied by this pool
    #[serde(default)]
    pub compatible_storage_classes: Vec<String>,

    /// Decommission progress keyed by disk
    #[serde(default)]
    pub disk_decomm: BTreeMap<String, String>,

    /// Last error observed while syncing this pool
    #[serde(default)]
    pub error: Option<StoragePoolError>,
}

/// Datastore capacity in bytes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolCapacity {
    pub total: u64,
    pub free_space: u64,
}

/// Error condition reported on a StoragePool
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoragePoolError {
    pub state: String,
    pub message: String,
}

impl StoragePool {
    /// Requested decommission mode, if any
    pub fn decommission_mode(&self) -> Option<&str> {
        self.spec
            .parameters
            .get(crate::controllers::DECOMMISSION_MODE_PARAMETER)
            .map(String::as_str)
    }
}
