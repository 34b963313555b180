//! Custom error types for pdbr.

use thiserror::Error;

/// Errors that abort a scan.
#[derive(Error, Debug)]
pub enum PdbrError {
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(String),

    #[error("Failed to list {kind} {}: {message}", scope(.namespace))]
    ListFailed {
        kind: &'static str,
        namespace: Option<String>,
        message: String,
    },

    #[error("No namespaces found in cluster")]
    NoNamespacesFound,
}

fn scope(namespace: &Option<String>) -> String {
    match namespace {
        Some(ns) => format!("in namespace '{}'", ns),
        None => "cluster-wide".to_string(),
    }
}

impl PdbrError {
    /// Build a list failure. Cluster-scoped calls pass `None` as namespace.
    pub fn list(kind: &'static str, namespace: Option<&str>, err: impl std::fmt::Display) -> Self {
        PdbrError::ListFailed {
            kind,
            namespace: namespace.map(str::to_string),
            message: err.to_string(),
        }
    }

    /// Returns true if a Kubernetes API error is worth retrying.
    ///
    /// Throttling, server-side failures and transport errors are transient;
    /// everything else (auth, not found, bad request) is not.
    pub fn is_transient(err: &kube::Error) -> bool {
        match err {
            kube::Error::Api(resp) => resp.code == 429 || resp.code >= 500,
            kube::Error::HyperError(_) | kube::Error::Service(_) => true,
            _ => false,
        }
    }
}
