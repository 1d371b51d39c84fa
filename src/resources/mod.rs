pub mod apply;
pub mod backup;
pub mod common;
pub mod config;
pub mod secret;
pub mod service;
pub mod statefulset;
pub mod syncer;

pub use common::{API_VERSION, FIELD_MANAGER, KIND, owner_reference, standard_labels};
pub use syncer::KubeResourceSyncer;
