// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    dead_code
)]

//! Common test utilities and fixtures shared across all test targets
//!
//! This module provides reusable builders for MysqlCluster resources and
//! in-memory fakes for the syncer, event sink and orchestrator seams.
//!
//! # Usage
//!
//! Include this module in your test file:
//! ```rust,ignore
//! #[path = "../common/mod.rs"]
//! mod common;
//! use common::*;
//! ```

mod fixtures;

pub use fakes::*;
pub use fixtures::*;
