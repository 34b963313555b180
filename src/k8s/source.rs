//! Read-only cluster queries used by the scan.
//!
//! `ClusterSource` is the boundary between the resolution pipeline and the
//! Kubernetes API. `KubeSource` implements it with paginated, retried list
//! calls and converts API objects into snapshots.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{self as meta, ObjectMeta};
use kube::Api;
use kube::api::ListParams;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::PdbrError;
use crate::model::{
    LabelSelector, OwnerRef, PdbSnapshot, PodSnapshot, ReplicaSetSnapshot, SelectorOperator,
    SelectorRequirement,
};

/// The four list queries the scan depends on.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<String>>;
    async fn list_pod_disruption_budgets(&self, namespace: &str) -> Result<Vec<PdbSnapshot>>;
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodSnapshot>>;
    async fn list_replica_sets(&self, namespace: &str) -> Result<Vec<ReplicaSetSnapshot>>;
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Delay before the first retry; doubled after each one.
    pub delay: Duration,
}

/// Run `op`, retrying transient Kubernetes API errors per `policy`.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    kind: &str,
    namespace: Option<&str>,
    mut op: F,
) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    let max_attempts = policy.retries.saturating_add(1);
    let mut delay = policy.delay;
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        attempt = attempt,
                        resource = kind,
                        namespace = namespace.unwrap_or("*"),
                        "List call succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts && PdbrError::is_transient(&e) => {
                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    resource = kind,
                    namespace = namespace.unwrap_or("*"),
                    error = %e,
                    "Transient API error, retrying..."
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// `ClusterSource` backed by a live cluster.
pub struct KubeSource {
    client: kube::Client,
    page_size: u32,
    retry: RetryPolicy,
}

impl KubeSource {
    pub fn new(client: kube::Client, page_size: u32, retry: RetryPolicy) -> Self {
        Self {
            client,
            page_size,
            retry,
        }
    }

    /// List every object through all pages of a `continue` chain.
    async fn list_all<K>(
        &self,
        api: &Api<K>,
        kind: &'static str,
        namespace: Option<&str>,
    ) -> Result<Vec<K>>
    where
        K: Clone + DeserializeOwned + Debug,
    {
        let mut items = Vec::new();
        let mut continue_token: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut params = ListParams::default().limit(self.page_size);
            if let Some(token) = &continue_token {
                params = params.continue_token(token);
            }

            let page = with_retry(&self.retry, kind, namespace, || api.list(&params))
                .await
                .map_err(|e| PdbrError::list(kind, namespace, e))?;

            pages += 1;
            items.extend(page.items);

            match next_continue_token(page.metadata) {
                Some(token) => continue_token = Some(token),
                None => break,
            }
        }

        debug!(
            "Listed {} {} in {} page(s) (namespace: {})",
            items.len(),
            kind,
            pages,
            namespace.unwrap_or("*")
        );

        Ok(items)
    }
}

/// Token for the next page, if the server returned a non-empty one.
fn next_continue_token(metadata: meta::ListMeta) -> Option<String> {
    metadata.continue_.filter(|token| !token.is_empty())
}

#[async_trait]
impl ClusterSource for KubeSource {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let items = self.list_all(&api, "namespaces", None).await?;
        Ok(items.into_iter().filter_map(|ns| ns.metadata.name).collect())
    }

    async fn list_pod_disruption_budgets(&self, namespace: &str) -> Result<Vec<PdbSnapshot>> {
        let api: Api<PodDisruptionBudget> = Api::namespaced(self.client.clone(), namespace);
        let items = self
            .list_all(&api, "poddisruptionbudgets", Some(namespace))
            .await?;
        Ok(items
            .into_iter()
            .map(|pdb| pdb_snapshot(pdb, namespace))
            .collect())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodSnapshot>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let items = self.list_all(&api, "pods", Some(namespace)).await?;
        Ok(items
            .into_iter()
            .map(|pod| pod_snapshot(pod, namespace))
            .collect())
    }

    async fn list_replica_sets(&self, namespace: &str) -> Result<Vec<ReplicaSetSnapshot>> {
        let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        let items = self.list_all(&api, "replicasets", Some(namespace)).await?;
        Ok(items
            .into_iter()
            .map(|rs| replica_set_snapshot(rs, namespace))
            .collect())
    }
}

fn pdb_snapshot(pdb: PodDisruptionBudget, namespace: &str) -> PdbSnapshot {
    // policy/v1: a missing selector selects no pods, an empty one selects all.
    let selector = pdb.spec.and_then(|spec| spec.selector).map(label_selector);

    // A PDB the controller has not reconciled yet has no status.
    let (expected_pods, disruptions_allowed) = pdb
        .status
        .map(|s| (s.expected_pods, s.disruptions_allowed))
        .unwrap_or((0, 0));

    PdbSnapshot {
        namespace: pdb.metadata.namespace.unwrap_or_else(|| namespace.to_string()),
        name: pdb.metadata.name.unwrap_or_default(),
        selector,
        expected_pods,
        disruptions_allowed,
    }
}

fn label_selector(selector: meta::LabelSelector) -> LabelSelector {
    LabelSelector {
        match_labels: selector.match_labels.unwrap_or_default(),
        match_expressions: selector
            .match_expressions
            .unwrap_or_default()
            .into_iter()
            .map(|req| SelectorRequirement {
                operator: SelectorOperator::parse(&req.operator),
                key: req.key,
                values: req.values.unwrap_or_default(),
            })
            .collect(),
    }
}

fn pod_snapshot(pod: Pod, namespace: &str) -> PodSnapshot {
    let owners = owner_refs(&pod.metadata);
    let ObjectMeta {
        name,
        namespace: pod_namespace,
        labels,
        ..
    } = pod.metadata;

    PodSnapshot {
        namespace: pod_namespace.unwrap_or_else(|| namespace.to_string()),
        name: name.unwrap_or_default(),
        labels: labels.unwrap_or_default(),
        owners,
    }
}

fn replica_set_snapshot(rs: ReplicaSet, namespace: &str) -> ReplicaSetSnapshot {
    ReplicaSetSnapshot {
        owners: owner_refs(&rs.metadata),
        namespace: rs.metadata.namespace.unwrap_or_else(|| namespace.to_string()),
        name: rs.metadata.name.unwrap_or_default(),
    }
}

fn owner_refs(metadata: &ObjectMeta) -> Vec<OwnerRef> {
    metadata
        .owner_references
        .iter()
        .flatten()
        .map(|or| OwnerRef {
            kind: or.kind.clone(),
            api_version: or.api_version.clone(),
            name: or.name.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use k8s_openapi::api::policy::v1::{PodDisruptionBudgetSpec, PodDisruptionBudgetStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
        LabelSelectorRequirement, OwnerReference,
    };
    use kube::core::ErrorResponse;

    use super::*;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: "Test".to_string(),
            code,
        })
    }

    fn no_delay(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            delay: Duration::ZERO,
        }
    }

    fn owner_reference(kind: &str, name: &str) -> OwnerReference {
        OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid: "uid".to_string(),
            controller: Some(true),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_transient_error() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&no_delay(3), "pods", Some("ns1"), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(api_error(503)) } else { Ok(n) } }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), kube::Error> = with_retry(&no_delay(2), "pods", None, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(api_error(500)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), kube::Error> = with_retry(&no_delay(3), "pods", None, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(api_error(403)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pdb_snapshot_conversion() {
        let pdb = PodDisruptionBudget {
            metadata: ObjectMeta {
                name: Some("pdb-a".to_string()),
                namespace: Some("ns1".to_string()),
                ..Default::default()
            },
            spec: Some(PodDisruptionBudgetSpec {
                selector: Some(meta::LabelSelector {
                    match_labels: Some(BTreeMap::from([("app".to_string(), "foo".to_string())])),
                    match_expressions: Some(vec![LabelSelectorRequirement {
                        key: "tier".to_string(),
                        operator: "In".to_string(),
                        values: Some(vec!["web".to_string()]),
                    }]),
                }),
                ..Default::default()
            }),
            status: Some(PodDisruptionBudgetStatus {
                expected_pods: 2,
                disruptions_allowed: 0,
                current_healthy: 2,
                desired_healthy: 2,
                ..Default::default()
            }),
        };

        let snapshot = pdb_snapshot(pdb, "ns1");

        assert_eq!(snapshot.name, "pdb-a");
        assert_eq!(snapshot.expected_pods, 2);
        assert_eq!(snapshot.disruptions_allowed, 0);
        let selector = snapshot.selector.unwrap();
        assert_eq!(selector.match_labels.get("app").unwrap(), "foo");
        assert_eq!(selector.match_expressions.len(), 1);
        assert_eq!(selector.match_expressions[0].operator, SelectorOperator::In);
    }

    #[test]
    fn test_pdb_without_status_is_zeroed() {
        let pdb = PodDisruptionBudget {
            metadata: ObjectMeta {
                name: Some("fresh".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let snapshot = pdb_snapshot(pdb, "ns2");

        assert_eq!(snapshot.namespace, "ns2");
        assert_eq!(snapshot.expected_pods, 0);
        assert!(snapshot.selector.is_none());
    }

    #[test]
    fn test_pdb_selector_absent_vs_empty() {
        let without = PodDisruptionBudget {
            spec: Some(PodDisruptionBudgetSpec::default()),
            ..Default::default()
        };
        let empty = PodDisruptionBudget {
            spec: Some(PodDisruptionBudgetSpec {
                selector: Some(meta::LabelSelector::default()),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(pdb_snapshot(without, "ns1").selector.is_none());
        assert!(pdb_snapshot(empty, "ns1").selector.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_with_retry_max_budget_does_not_overflow() {
        let result = with_retry(&no_delay(u32::MAX), "pods", None, || async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }

    #[test]
    fn test_next_continue_token() {
        let page = |token: Option<&str>| meta::ListMeta {
            continue_: token.map(str::to_string),
            ..Default::default()
        };

        assert_eq!(next_continue_token(page(Some("abc"))).as_deref(), Some("abc"));
        assert_eq!(next_continue_token(page(Some(""))), None);
        assert_eq!(next_continue_token(page(None)), None);
    }

    #[test]
    fn test_pod_snapshot_keeps_owner_order() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("web-abc".to_string()),
                namespace: Some("ns1".to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), "web".to_string())])),
                owner_references: Some(vec![
                    owner_reference("ReplicaSet", "web-7d9f"),
                    owner_reference("CustomThing", "other"),
                ]),
                ..Default::default()
            },
            ..Default::default()
        };

        let snapshot = pod_snapshot(pod, "ns1");

        assert_eq!(snapshot.name, "web-abc");
        assert_eq!(snapshot.labels.get("app").unwrap(), "web");
        let kinds: Vec<&str> = snapshot.owners.iter().map(|o| o.kind.as_str()).collect();
        assert_eq!(kinds, vec!["ReplicaSet", "CustomThing"]);
    }

    #[test]
    fn test_replica_set_snapshot_without_owners() {
        let rs = ReplicaSet {
            metadata: ObjectMeta {
                name: Some("bare-rs".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let snapshot = replica_set_snapshot(rs, "ns1");

        assert_eq!(snapshot.namespace, "ns1");
        assert!(snapshot.owners.is_empty());
    }
}
