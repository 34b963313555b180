//! Ownership resolution from a matched pod up to its top-level controller.
//!
//! Pods created by a Deployment are owned by an intermediate ReplicaSet,
//! so that hop is followed once. Every other owner kind is reported as is.
//! Chains are never followed deeper than pod -> intermediate -> controller.

use std::collections::HashMap;

use tracing::debug;

use crate::model::{OwnerRef, ParentResource, PdbSnapshot, PodSnapshot, ReplicaSetSnapshot};

/// ReplicaSets of one namespace, keyed by name.
pub type ReplicaSetIndex = HashMap<String, ReplicaSetSnapshot>;

/// How an owner reference is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    /// Intermediate controller; its own owners are the top-level resources.
    ReplicaSet,
    /// Owns pods directly (StatefulSet, DaemonSet, Job, custom controllers).
    Direct,
}

impl ControllerKind {
    pub fn of(owner: &OwnerRef) -> Self {
        match owner.kind.as_str() {
            "ReplicaSet" => Self::ReplicaSet,
            _ => Self::Direct,
        }
    }
}

/// Returns true if resolving `pod` requires a ReplicaSet lookup.
pub fn needs_replica_sets(pod: &PodSnapshot) -> bool {
    pod.owners
        .iter()
        .any(|o| ControllerKind::of(o) == ControllerKind::ReplicaSet)
}

/// Expand a pod's owner references into impacted parent resources.
///
/// A ReplicaSet missing from `replica_sets` is skipped; the cluster may have
/// changed between list calls.
pub fn resolve_parents(
    pod: &PodSnapshot,
    pdb: &PdbSnapshot,
    replica_sets: &ReplicaSetIndex,
) -> Vec<ParentResource> {
    let mut parents = Vec::new();

    for owner in &pod.owners {
        match ControllerKind::of(owner) {
            ControllerKind::ReplicaSet => match replica_sets.get(&owner.name) {
                Some(rs) => {
                    debug!(
                        "Pod {}/{} -> ReplicaSet {}/{} ({} owner(s))",
                        pod.namespace,
                        pod.name,
                        rs.namespace,
                        rs.name,
                        rs.owners.len()
                    );
                    parents.extend(
                        rs.owners
                            .iter()
                            .map(|rs_owner| ParentResource::from_owner(rs_owner, pdb)),
                    );
                }
                None => debug!(
                    "ReplicaSet {}/{} owning pod {} not found, skipping",
                    pod.namespace, owner.name, pod.name
                ),
            },
            ControllerKind::Direct => parents.push(ParentResource::from_owner(owner, pdb)),
        }
    }

    parents
}

/// Index a namespace's ReplicaSets by name.
pub fn index_replica_sets(replica_sets: Vec<ReplicaSetSnapshot>) -> ReplicaSetIndex {
    replica_sets
        .into_iter()
        .map(|rs| (rs.name.clone(), rs))
        .collect()
}
