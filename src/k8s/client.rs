//! Kubernetes client builder with kubeconfig path and context support.

use std::path::Path;

use anyhow::Result;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::debug;

use crate::error::PdbrError;

/// Build a Kubernetes client.
///
/// Without a context or kubeconfig path this falls back to kube's default
/// inference (KUBECONFIG, ~/.kube/config, in-cluster).
pub async fn build_client(context: Option<&str>, kubeconfig: Option<&Path>) -> Result<kube::Client> {
    if context.is_none() && kubeconfig.is_none() {
        debug!("Using default kubeconfig context");
        let client = kube::Client::try_default()
            .await
            .map_err(|e| PdbrError::Kubeconfig(e.to_string()))?;
        return Ok(client);
    }

    let raw = read_kubeconfig(kubeconfig)?;
    if let Some(ctx) = context {
        debug!("Using kubeconfig context: {}", ctx);
    }

    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };
    let config = kube::Config::from_custom_kubeconfig(raw, &options)
        .await
        .map_err(|e| PdbrError::Kubeconfig(describe(context, e)))?;

    let client =
        kube::Client::try_from(config).map_err(|e| PdbrError::Kubeconfig(describe(context, e)))?;

    Ok(client)
}

/// Get the context name in use, for display.
pub fn current_context(context: Option<&str>, kubeconfig: Option<&Path>) -> String {
    if let Some(ctx) = context {
        return ctx.to_string();
    }

    read_kubeconfig(kubeconfig)
        .ok()
        .and_then(|kc| kc.current_context)
        .unwrap_or_else(|| "unknown".to_string())
}

fn read_kubeconfig(path: Option<&Path>) -> Result<Kubeconfig, PdbrError> {
    let result = match path {
        Some(path) => {
            debug!("Reading kubeconfig from {}", path.display());
            Kubeconfig::read_from(path)
        }
        None => Kubeconfig::read(),
    };
    result.map_err(|e| PdbrError::Kubeconfig(e.to_string()))
}

fn describe(context: Option<&str>, err: impl std::fmt::Display) -> String {
    match context {
        Some(ctx) => format!("context '{}': {}", ctx, err),
        None => err.to_string(),
    }
}
