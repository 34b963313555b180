//! Deduplication of impacted resources.

use std::collections::HashMap;

use crate::model::{ParentResource, ResourceKey};

/// Impacted resources keyed by (namespace, kind, name).
///
/// Inserting a resource that is already present replaces it, so only the
/// last PDB attribution survives.
#[derive(Debug, Default)]
pub struct ImpactSet {
    resources: HashMap<ResourceKey, ParentResource>,
}

impl ImpactSet {
    pub fn insert(&mut self, parent: ParentResource) {
        self.resources.insert(parent.key(), parent);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Consume the set, returning resources sorted by PDB name.
    ///
    /// Ties are broken by namespace, kind and name for stable output.
    pub fn into_sorted(self) -> Vec<ParentResource> {
        let mut resources: Vec<ParentResource> = self.resources.into_values().collect();
        resources.sort_by(|a, b| {
            a.pdb
                .cmp(&b.pdb)
                .then_with(|| a.namespace.cmp(&b.namespace))
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| a.name.cmp(&b.name))
        });
        resources
    }
}

impl Extend<ParentResource> for ImpactSet {
    fn extend<I: IntoIterator<Item = ParentResource>>(&mut self, iter: I) {
        for parent in iter {
            self.insert(parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(namespace: &str, kind: &str, name: &str, pdb: &str) -> ParentResource {
        ParentResource {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
            api_version: "apps/v1".to_string(),
            pdb: pdb.to_string(),
        }
    }

    #[test]
    fn test_same_identity_different_pdb_is_deduplicated() {
        let mut set = ImpactSet::default();
        set.insert(parent("ns1", "Deployment", "web", "pdb-a"));
        set.insert(parent("ns1", "Deployment", "web", "pdb-b"));

        let resources = set.into_sorted();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].pdb, "pdb-b");
    }

    #[test]
    fn test_identity_includes_namespace_and_kind() {
        let mut set = ImpactSet::default();
        set.extend([
            parent("ns1", "Deployment", "web", "pdb-a"),
            parent("ns2", "Deployment", "web", "pdb-a"),
            parent("ns1", "StatefulSet", "web", "pdb-a"),
        ]);

        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_into_sorted_orders_by_pdb() {
        let mut set = ImpactSet::default();
        set.extend([
            parent("ns1", "Deployment", "zeta", "pdb-c"),
            parent("ns1", "Deployment", "alpha", "pdb-a"),
            parent("ns2", "Deployment", "beta", "pdb-b"),
        ]);

        let pdbs: Vec<String> = set.into_sorted().into_iter().map(|p| p.pdb).collect();
        assert_eq!(pdbs, vec!["pdb-a", "pdb-b", "pdb-c"]);
    }

    #[test]
    fn test_empty_set() {
        let set = ImpactSet::default();
        assert!(set.is_empty());
        assert!(set.into_sorted().is_empty());
    }
}
