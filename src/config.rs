//! CLI configuration and argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::k8s::source::RetryPolicy;
use crate::scan::ScanOptions;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Find workloads blocked from voluntary disruption by active PodDisruptionBudgets.
///
/// A PDB is active when it expects at least one pod and allows zero
/// disruptions. Matching pods are traced to their top-level controller
/// (Deployment via ReplicaSet, StatefulSet, DaemonSet, Job, ...).
#[derive(Parser, Debug, Clone)]
#[command(name = "pdbr")]
#[command(about = "Find workloads blocked by active PodDisruptionBudgets")]
#[command(version = const_format::formatcp!(
    "{} (commit: {}, build date: {})",
    VERSION, COMMIT, BUILD_DATE
))]
pub struct Args {
    /// Kubernetes context to use
    #[arg(long, env = "KUBECONFIG_CONTEXT")]
    pub context: Option<String>,

    /// Path to the kubeconfig file [default: kube default lookup]
    #[arg(long, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace to scan, repeatable [default: all namespaces]
    #[arg(short, long = "namespace", value_name = "NAMESPACE")]
    pub namespaces: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Namespaces whose pods and ReplicaSets are listed in parallel
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,

    /// Page size for list calls
    #[arg(long, default_value = "500", value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: u32,

    /// Retries for transient API errors (throttling, 5xx, transport)
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Initial retry delay in milliseconds, doubled on each retry
    #[arg(long, default_value = "500", value_name = "MS")]
    pub retry_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "PDBR_LOG_LEVEL")]
    pub log_level: String,
}

/// Result presentation format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// kubectl-style table
    Table,
    /// JSON array
    Json,
}

/// Application configuration derived from CLI args.
#[derive(Debug, Clone)]
pub struct Config {
    pub context: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub namespaces: Vec<String>,
    pub output: OutputFormat,
    pub concurrency: usize,
    pub page_size: u32,
    pub retry: RetryPolicy,
    pub log_level: String,
}

impl Config {
    /// Create config from CLI arguments.
    pub fn from_args(args: Args) -> Self {
        let mut namespaces: Vec<String> = args
            .namespaces
            .into_iter()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .collect();
        namespaces.sort();
        namespaces.dedup();

        Self {
            context: args.context,
            kubeconfig: args.kubeconfig,
            namespaces,
            output: args.output,
            concurrency: usize::from(args.concurrency),
            page_size: args.page_size,
            retry: RetryPolicy {
                retries: args.retries,
                delay: Duration::from_millis(args.retry_delay_ms),
            },
            log_level: args.log_level,
        }
    }

    /// Options for the scan pipeline.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            namespaces: self.namespaces.clone(),
            concurrency: self.concurrency,
        }
    }
}
