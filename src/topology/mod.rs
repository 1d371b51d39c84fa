//! Topology authority client and resolver

pub mod client;
pub mod orchestrator;
pub mod resolver;

pub use client::{Instance, TopologyClient, TopologyConnector, TopologyError};
pub use orchestrator::{OrchestratorClient, OrchestratorConnector};
pub use resolver::{HEALTHY_LAG_THRESHOLD_SECS, TopologyResolver};
