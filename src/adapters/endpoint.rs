//! HTTP Endpoint Connector
//!
//! Establishes sessions with the storage-management endpoint's REST API:
//! - `POST /api/session` (basic auth) returns a session token
//! - `GET /api/vcenter/storage/policies` authenticates the policy service
//! - `GET /api/session` tells whether the token is still honoured

use crate::config::EndpointConfig;
use crate::domain::ports::{ConnectionHandle, EndpointConnector, RemoteSession};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Header carrying the session token
pub const SESSION_HEADER: &str = "vmware-api-session-id";

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// HTTP Session
// =============================================================================

/// A token-authenticated REST session
pub struct HttpSession {
    client: reqwest::Client,
    base_url: String,
    token: String,
    session_id: String,
}

impl HttpSession {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
            session_id: format!("session-{}", NEXT_SESSION.fetch_add(1, Ordering::Relaxed)),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl std::fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSession")
            .field("base_url", &self.base_url)
            .field("session_id", &self.session_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl RemoteSession for HttpSession {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn connect_policy_service(&self) -> Result<()> {
        let policy_error = |reason: String| Error::PolicyService {
            endpoint: self.base_url.clone(),
            reason,
        };

        let response = self
            .client
            .get(self.url("/api/vcenter/storage/policies"))
            .header(SESSION_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| policy_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(policy_error(response.status().to_string()));
        }

        debug!("Policy service connected on {} ({})", self.base_url, self.session_id);
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        match self
            .client
            .get(self.url("/api/session"))
            .header(SESSION_HEADER, &self.token)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Session probe on {} failed: {}", self.base_url, e);
                false
            }
        }
    }
}

// =============================================================================
// HTTP Endpoint Connector
// =============================================================================

/// Connector creating [`HttpSession`]s
#[derive(Debug, Default)]
pub struct HttpEndpointConnector;

impl HttpEndpointConnector {
    pub fn new() -> Self {
        Self
    }

    fn client(endpoint: &EndpointConfig) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(endpoint.insecure)
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()?;
        Ok(client)
    }
}

#[async_trait]
impl EndpointConnector for HttpEndpointConnector {
    async fn connect(&self, endpoint: &EndpointConfig) -> Result<ConnectionHandle> {
        let client = Self::client(endpoint)?;
        let base_url = endpoint.base_url();

        let response = client
            .post(format!("{}/api/session", base_url))
            .basic_auth(&endpoint.username, Some(&endpoint.password))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::SessionRejected {
                endpoint: base_url,
                reason: response.status().to_string(),
            });
        }

        let token: String = response.json().await?;
        let session = HttpSession::new(client, base_url, token);
        info!("Connected to {} ({})", session.base_url, session.session_id);
        Ok(Arc::new(session))
    }
}
