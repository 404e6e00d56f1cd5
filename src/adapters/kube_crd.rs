//! Kubernetes Resource Definition Registrar
//!
//! Server-side applies the CRD for a kind and waits until the API server
//! reports it as established.

use crate::crd::StoragePool;
use crate::domain::ports::ResourceDefinitionRegistrar;
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt, Resource};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "storagepool-operator";

/// Registers CRDs through the Kubernetes API
pub struct KubeCrdRegistrar {
    client: Client,
    establish_timeout: Duration,
    poll_interval: Duration,
}

impl KubeCrdRegistrar {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            establish_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
        }
    }

    async fn wait_established(&self, api: &Api<CustomResourceDefinition>, kind: &str, name: &str) -> Result<()> {
        let probe = || async move { api.get(name).await.map(|crd| is_established(&crd)) };
        poll_until_established(probe, self.establish_timeout, self.poll_interval)
            .await
            .map_err(|reason| Error::ResourceDefinition {
                kind: kind.to_string(),
                reason,
            })?;
        debug!("CRD {} established", name);
        Ok(())
    }
}

/// Poll `probe` until it reports the definition established or `timeout`
/// passes. Probe errors count as "not yet"; the last one is reported if the
/// deadline is reached.
async fn poll_until_established<F, Fut, E>(
    mut probe: F,
    timeout: Duration,
    interval: Duration,
) -> std::result::Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<bool, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let mut last_error = None;
    loop {
        match probe().await {
            Ok(true) => return Ok(()),
            Ok(false) => last_error = None,
            Err(e) => {
                debug!("CRD status read failed, retrying: {}", e);
                last_error = Some(e.to_string());
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(match last_error {
                Some(e) => format!("not established within {:?}: {}", timeout, e),
                None => format!("not established within {:?}", timeout),
            });
        }
        tokio::time::sleep(interval.min(timeout - elapsed)).await;
    }
}

/// CRD manifest for a kind this service owns
pub fn definition_for(kind: &str) -> Result<CustomResourceDefinition> {
    if kind == StoragePool::kind(&()) {
        Ok(StoragePool::crd())
    } else {
        Err(Error::ResourceDefinition {
            kind: kind.to_string(),
            reason: "unknown kind".into(),
        })
    }
}

/// Whether the CRD carries an `Established=True` condition
pub fn is_established(crd: &CustomResourceDefinition) -> bool {
    crd.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Established" && c.status == "True")
        })
        .unwrap_or(false)
}

#[async_trait]
impl ResourceDefinitionRegistrar for KubeCrdRegistrar {
    async fn register(&self, kind: &str) -> Result<()> {
        let crd = definition_for(kind)?;
        let name = crd.metadata.name.clone().ok_or_else(|| Error::ResourceDefinition {
            kind: kind.to_string(),
            reason: "definition has no name".into(),
        })?;

        info!("Registering CRD {}", name);
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        api.patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&crd))
            .await?;

        self.wait_established(&api, kind, &name).await
    }
}
