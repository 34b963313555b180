//! Label selector matching.
//!
//! `matchLabels` pairs must all be present in the pod's labels (the pod
//! may carry extra labels). Every `matchExpressions` entry must also hold.
//! An empty selector matches every pod.

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::{LabelSelector, SelectorOperator, SelectorRequirement};

/// Returns true if `labels` satisfy `selector`.
pub fn matches(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    if selector.is_empty() {
        return true;
    }

    let matched = selector
        .match_labels
        .iter()
        .filter(|(key, value)| labels.get(*key) == Some(*value))
        .count();

    if matched != selector.match_labels.len() {
        return false;
    }

    selector
        .match_expressions
        .iter()
        .all(|req| requirement_holds(req, labels))
}

fn requirement_holds(req: &SelectorRequirement, labels: &BTreeMap<String, String>) -> bool {
    let value = labels.get(&req.key);
    match &req.operator {
        SelectorOperator::In => value.is_some_and(|v| req.values.contains(v)),
        SelectorOperator::NotIn => value.is_none_or(|v| !req.values.contains(v)),
        SelectorOperator::Exists => value.is_some(),
        SelectorOperator::DoesNotExist => value.is_none(),
        SelectorOperator::Unknown(op) => {
            debug!("Unsupported selector operator '{}', treating as no match", op);
            false
        }
    }
}
