//! Scan pipeline: active PDBs -> matching pods -> owning controllers.
//!
//! PDBs are listed namespace by namespace before anything else. Pods and
//! ReplicaSets are then listed concurrently, one worker per namespace that
//! holds an active PDB. Results merge into a shared `ImpactSet`. The first
//! failed list call aborts the scan.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use futures::stream::{self, TryStreamExt};
use tracing::{debug, info};

use crate::error::PdbrError;
use crate::k8s::source::ClusterSource;
use crate::model::{ParentResource, PdbSnapshot};
use crate::resolve::{
    ImpactSet, ReplicaSetIndex, index_replica_sets, is_active, matches, needs_replica_sets,
    resolve_parents,
};

/// Scan knobs.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Namespaces to scan. Empty means all namespaces.
    pub namespaces: Vec<String>,
    /// Maximum namespaces processed in parallel.
    pub concurrency: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            concurrency: 4,
        }
    }
}

/// Outcome of a scan.
#[derive(Debug)]
pub struct ScanReport {
    /// When the snapshot was started.
    pub taken_at: DateTime<Utc>,
    pub namespaces_scanned: usize,
    pub total_pdbs: usize,
    pub active_pdbs: usize,
    pub matched_pods: usize,
    /// Deduplicated, sorted by PDB name.
    pub impacted: Vec<ParentResource>,
}

#[derive(Default)]
struct Collected {
    impacts: ImpactSet,
    matched_pods: usize,
}

/// Run the full scan against `source`.
pub async fn scan(source: &dyn ClusterSource, options: &ScanOptions) -> Result<ScanReport> {
    let taken_at = Utc::now();
    let namespaces = if options.namespaces.is_empty() {
        let all = source.list_namespaces().await?;
        if all.is_empty() {
            return Err(PdbrError::NoNamespacesFound.into());
        }
        all
    } else {
        options.namespaces.clone()
    };
    debug!("Scanning {} namespace(s)", namespaces.len());

    let mut total_pdbs = 0;
    let mut active: BTreeMap<String, Vec<PdbSnapshot>> = BTreeMap::new();
    for namespace in &namespaces {
        let pdbs = source.list_pod_disruption_budgets(namespace).await?;
        total_pdbs += pdbs.len();
        for pdb in pdbs.into_iter().filter(is_active) {
            debug!(
                "Active PDB {}/{} (expected_pods={}, disruptions_allowed=0)",
                pdb.namespace, pdb.name, pdb.expected_pods
            );
            active.entry(pdb.namespace.clone()).or_default().push(pdb);
        }
    }

    let active_pdbs: usize = active.values().map(Vec::len).sum();
    info!(
        "{}/{} PodDisruptionBudgets are active across {} namespace(s)",
        active_pdbs,
        total_pdbs,
        active.len()
    );

    let collected = Arc::new(Mutex::new(Collected::default()));
    let concurrency = options.concurrency.max(1);

    stream::iter(active.iter().map(Ok::<_, anyhow::Error>))
        .try_for_each_concurrent(concurrency, |(namespace, pdbs)| {
            let collected = Arc::clone(&collected);
            async move {
                let (parents, matched) = scan_namespace(source, namespace, pdbs).await?;
                let mut guard = collected
                    .lock()
                    .map_err(|_| anyhow!("impact set lock poisoned"))?;
                guard.matched_pods += matched;
                guard.impacts.extend(parents);
                Ok::<(), anyhow::Error>(())
            }
        })
        .await?;

    let collected = Arc::into_inner(collected)
        .ok_or_else(|| anyhow!("impact set still shared after scan"))?
        .into_inner()
        .map_err(|_| anyhow!("impact set lock poisoned"))?;

    if collected.impacts.is_empty() {
        info!("No resources are blocked by active PodDisruptionBudgets");
    } else {
        debug!("{} unique impacted resource(s)", collected.impacts.len());
    }

    Ok(ScanReport {
        taken_at,
        namespaces_scanned: namespaces.len(),
        total_pdbs,
        active_pdbs,
        matched_pods: collected.matched_pods,
        impacted: collected.impacts.into_sorted(),
    })
}

/// Resolve every active PDB in one namespace.
///
/// Returns the undeduplicated parent candidates and the number of
/// (PDB, pod) matches.
async fn scan_namespace(
    source: &dyn ClusterSource,
    namespace: &str,
    pdbs: &[PdbSnapshot],
) -> Result<(Vec<ParentResource>, usize)> {
    let pods = source.list_pods(namespace).await?;

    let matched: Vec<_> = pdbs
        .iter()
        .flat_map(|pdb| {
            pods.iter()
                .filter(move |pod| {
                    pdb.selector
                        .as_ref()
                        .is_some_and(|selector| matches(selector, &pod.labels))
                })
                .map(move |pod| (pdb, pod))
        })
        .collect();

    debug!(
        "Namespace {}: {} pod(s), {} match(es) against {} active PDB(s)",
        namespace,
        pods.len(),
        matched.len(),
        pdbs.len()
    );

    let replica_sets = if matched.iter().any(|(_, pod)| needs_replica_sets(pod)) {
        index_replica_sets(source.list_replica_sets(namespace).await?)
    } else {
        ReplicaSetIndex::new()
    };

    let parents = matched
        .iter()
        .flat_map(|(pdb, pod)| resolve_parents(pod, pdb, &replica_sets))
        .collect();

    Ok((parents, matched.len()))
}
