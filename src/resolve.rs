//! Impact resolution: which PDBs block, which pods they cover, and which
//! top-level controllers own those pods.

pub mod activity;
pub mod aggregate;
pub mod owner;
pub mod selector;

pub use activity::is_active;
pub use aggregate::ImpactSet;
pub use owner::{
    ReplicaSetIndex, index_replica_sets, needs_replica_sets, resolve_parents,
};
pub use selector::matches;
