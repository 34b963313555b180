//! Kubernetes access: client construction and list queries.

pub mod client;
pub mod source;
