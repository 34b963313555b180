//! PDB activity filter.

use crate::model::PdbSnapshot;

/// A PDB blocks disruption when it protects at least one expected pod
/// and allows zero further disruptions.
pub fn is_active(pdb: &PdbSnapshot) -> bool {
    pdb.expected_pods > 0 && pdb.disruptions_allowed == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LabelSelector;

    fn pdb(expected_pods: i32, disruptions_allowed: i32) -> PdbSnapshot {
        PdbSnapshot {
            namespace: "default".to_string(),
            name: "test-pdb".to_string(),
            selector: Some(LabelSelector::default()),
            expected_pods,
            disruptions_allowed,
        }
    }

    #[test]
    fn test_active_when_expected_and_no_disruptions() {
        assert!(is_active(&pdb(2, 0)));
        assert!(is_active(&pdb(1, 0)));
    }

    #[test]
    fn test_inactive_without_expected_pods() {
        assert!(!is_active(&pdb(0, 0)));
        assert!(!is_active(&pdb(0, 3)));
    }

    #[test]
    fn test_inactive_with_disruptions_allowed() {
        assert!(!is_active(&pdb(3, 1)));
        assert!(!is_active(&pdb(1, 5)));
    }
}
