//! Kubernetes Controller Factory
//!
//! Builds the sub-controllers and wires the watch streams feeding them:
//! StorageClass events into the resource-class watcher, StoragePool events
//! into the decommission controller. Each watch lists once up front so a
//! broken API connection fails controller start instead of a background task.

use crate::controllers::{
    CapacityController, DecommissionController, DecommissionMode, MigrationController,
    ResourceClassWatcher,
};
use crate::crd::StoragePool;
use crate::domain::ports::{ConnectionHandle, ControllerFactory};
use crate::error::Result;
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{Api, ListParams};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Client, ResourceExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Factory wiring the sub-controllers to the Kubernetes API
pub struct KubeControllerFactory {
    client: Client,
    provisioner: String,
}

impl KubeControllerFactory {
    pub fn new(client: Client, provisioner: impl Into<String>) -> Self {
        Self {
            client,
            provisioner: provisioner.into(),
        }
    }
}

#[async_trait]
impl ControllerFactory for KubeControllerFactory {
    async fn capacity_controller(
        &self,
        connection: ConnectionHandle,
        cluster_id: &str,
    ) -> Result<Arc<CapacityController>> {
        Ok(Arc::new(CapacityController::new(connection, cluster_id)?))
    }

    async fn resource_class_watcher(
        &self,
        capacity: Arc<CapacityController>,
        shutdown: CancellationToken,
    ) -> Result<Arc<ResourceClassWatcher>> {
        let api: Api<StorageClass> = Api::all(self.client.clone());
        let listing = api.list(&ListParams::default()).await?;

        let class_watcher = Arc::new(ResourceClassWatcher::new(capacity, &self.provisioner));
        class_watcher.observe_listing(listing.items.iter().map(class_entry));
        info!(
            "Storage class watch started for provisioner {}",
            class_watcher.provisioner()
        );

        let target = class_watcher.clone();
        tokio::spawn(async move {
            let mut stream = watcher::watcher(api, watcher::Config::default())
                .default_backoff()
                .boxed();
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = stream.next() => match event {
                        Some(Ok(event)) => apply_class_event(&target, &event),
                        Some(Err(e)) => warn!("Storage class watch error: {}", e),
                        None => break,
                    }
                }
            }
            debug!("Storage class watch stopped");
        });

        Ok(class_watcher)
    }

    fn migration_controller(
        &self,
        connection: ConnectionHandle,
        cluster_id: &str,
    ) -> Arc<MigrationController> {
        Arc::new(MigrationController::new(connection, cluster_id))
    }

    async fn decommission_controller(
        &self,
        migration: Arc<MigrationController>,
        shutdown: CancellationToken,
    ) -> Result<Arc<DecommissionController>> {
        let api: Api<StoragePool> = Api::all(self.client.clone());
        let listing = api.list(&ListParams::default()).await?;

        let controller = Arc::new(DecommissionController::new(migration));
        apply_pool_event(&controller, &Event::Restarted(listing.items));

        let target = controller.clone();
        tokio::spawn(async move {
            let mut stream = watcher::watcher(api, watcher::Config::default())
                .default_backoff()
                .boxed();
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = stream.next() => match event {
                        Some(Ok(event)) => apply_pool_event(&target, &event),
                        Some(Err(e)) => warn!("StoragePool watch error: {}", e),
                        None => break,
                    }
                }
            }
            debug!("StoragePool decommission watch stopped");
        });

        Ok(controller)
    }
}

// =============================================================================
// Event Application
// =============================================================================

/// Feed a StorageClass watch event into the resource-class watcher
pub fn apply_class_event(class_watcher: &ResourceClassWatcher, event: &Event<StorageClass>) {
    match event {
        Event::Applied(sc) => {
            class_watcher.observe_applied(&sc.name_any(), &sc.provisioner);
        }
        Event::Deleted(sc) => {
            class_watcher.observe_deleted(&sc.name_any());
        }
        Event::Restarted(classes) => {
            class_watcher.observe_listing(classes.iter().map(class_entry));
        }
    }
}

fn class_entry(sc: &StorageClass) -> (&str, &str) {
    (
        sc.metadata.name.as_deref().unwrap_or_default(),
        sc.provisioner.as_str(),
    )
}

/// Feed a StoragePool watch event into the decommission controller
pub fn apply_pool_event(controller: &DecommissionController, event: &Event<StoragePool>) {
    match event {
        Event::Applied(pool) => apply_pool(controller, pool),
        Event::Deleted(pool) => {
            controller.withdraw(&pool.name_any());
        }
        Event::Restarted(pools) => {
            let present: BTreeSet<String> = pools.iter().map(ResourceExt::name_any).collect();
            for (name, _) in controller.pending() {
                if !present.contains(&name) {
                    controller.withdraw(&name);
                }
            }
            for pool in pools {
                apply_pool(controller, pool);
            }
        }
    }
}

fn apply_pool(controller: &DecommissionController, pool: &StoragePool) {
    let name = pool.name_any();
    match pool.decommission_mode() {
        None => {
            controller.withdraw(&name);
        }
        Some(value) => match DecommissionMode::parse(value) {
            Some(mode) => {
                controller.request(&name, mode);
            }
            None => warn!("StoragePool {} has unknown decommission mode {:?}", name, value),
        },
    }
}
