//! Point-in-time snapshots of the cluster objects the scan works on.
//!
//! Everything here is built once from list calls and never mutated
//! afterwards.

use std::collections::BTreeMap;

use serde::Serialize;

/// Set-based selector operator (`matchExpressions[].operator`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
    Unknown(String),
}

impl SelectorOperator {
    pub fn parse(op: &str) -> Self {
        match op {
            "In" => Self::In,
            "NotIn" => Self::NotIn,
            "Exists" => Self::Exists,
            "DoesNotExist" => Self::DoesNotExist,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// One `matchExpressions` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    pub values: Vec<String>,
}

/// Label selector of a PodDisruptionBudget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
    pub match_expressions: Vec<SelectorRequirement>,
}

impl LabelSelector {
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PdbSnapshot {
    pub namespace: String,
    pub name: String,
    /// `None` when the PDB has no selector; it then covers no pods.
    pub selector: Option<LabelSelector>,
    pub expected_pods: i32,
    pub disruptions_allowed: i32,
}

/// Owner reference recorded on a pod or replica set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    pub kind: String,
    pub api_version: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct PodSnapshot {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub owners: Vec<OwnerRef>,
}

#[derive(Debug, Clone)]
pub struct ReplicaSetSnapshot {
    pub namespace: String,
    pub name: String,
    pub owners: Vec<OwnerRef>,
}

/// Identity used to deduplicate impacted resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

/// Top-level resource whose pods are protected by an active PDB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentResource {
    pub namespace: String,
    pub name: String,
    pub kind: String,
    pub api_version: String,
    pub pdb: String,
}

impl ParentResource {
    /// Build a record for `owner`, attributed to the given PDB.
    pub fn from_owner(owner: &OwnerRef, pdb: &PdbSnapshot) -> Self {
        Self {
            namespace: pdb.namespace.clone(),
            name: owner.name.clone(),
            kind: owner.kind.clone(),
            api_version: owner.api_version.clone(),
            pdb: pdb.name.clone(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            namespace: self.namespace.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
        }
    }

    /// `apiVersion/Kind`, e.g. `apps/v1/Deployment`.
    pub fn group_version_kind(&self) -> String {
        format!("{}/{}", self.api_version, self.kind)
    }
}
