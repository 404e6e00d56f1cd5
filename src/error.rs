//! Error types for the StoragePool service
//!
//! Startup failures (resource definition registration, endpoint session,
//! controller construction) are returned to the caller unchanged. Background
//! failures are only ever logged.

use thiserror::Error;

/// Unified error type for the StoragePool service
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("StoragePool service is already initialized")]
    AlreadyInitialized,

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource definition {kind} not registered: {reason}")]
    ResourceDefinition { kind: String, reason: String },

    // =========================================================================
    // Storage Endpoint Errors
    // =========================================================================
    #[error("Endpoint connection error: {0}")]
    EndpointConnection(#[from] reqwest::Error),

    #[error("Endpoint {endpoint} rejected session: {reason}")]
    SessionRejected { endpoint: String, reason: String },

    #[error("Policy service unavailable on {endpoint}: {reason}")]
    PolicyService { endpoint: String, reason: String },

    // =========================================================================
    // Controller Errors
    // =========================================================================
    #[error("Failed to start {controller} controller: {reason}")]
    ControllerStart { controller: String, reason: String },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a controller start failure
    pub fn controller_start(controller: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ControllerStart {
            controller: controller.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is transient, i.e. restarting startup may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Kube(_)
                | Error::EndpointConnection(_)
                | Error::PolicyService { .. }
                | Error::ResourceDefinition { .. }
        )
    }
}

/// Result type alias for the StoragePool service
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_transient() {
        let err = Error::PolicyService {
            endpoint: "vc.local".into(),
            reason: "503".into(),
        };
        assert!(err.is_transient());

        let err = Error::Configuration("empty cluster id".into());
        assert!(!err.is_transient());

        assert!(!Error::AlreadyInitialized.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = Error::controller_start("capacity", "no cluster id");
        assert_eq!(
            err.to_string(),
            "Failed to start capacity controller: no cluster id"
        );
    }
}
