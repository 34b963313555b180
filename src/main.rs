//! pdbr - find workloads blocked by active PodDisruptionBudgets.
//!
//! Takes a point-in-time snapshot of the cluster and reports:
//! - PDBs that expect pods but allow zero disruptions
//! - Pods covered by those PDBs
//! - The top-level controllers (Deployments, StatefulSets, Jobs, ...)
//!   that a node drain would get stuck on

mod config;
mod error;
mod k8s;
mod model;
mod output;
mod resolve;
mod scan;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use config::{Args, Config};
use k8s::source::KubeSource;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = Config::from_args(args);

    if let Err(e) = init_tracing(&config.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    debug!("Starting pdbr - PodDisruptionBudget impact report");

    if let Err(e) = run(&config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(config: &Config) -> Result<()> {
    let kubeconfig = config.kubeconfig.as_deref();
    let client = k8s::client::build_client(config.context.as_deref(), kubeconfig).await?;
    let context_name = k8s::client::current_context(config.context.as_deref(), kubeconfig);

    let source = KubeSource::new(client, config.page_size, config.retry.clone());
    let report = scan::scan(&source, &config.scan_options()).await?;

    output::print_report(&report, &context_name, config.output)
}

/// Initialize tracing subscriber.
fn init_tracing(log_level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to initialize log filter: {}", e))?;

    // Logs go to stderr so JSON output stays parseable.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
