//! Integration test suite for envplane.
//!
//! These tests drive the orchestrator end to end through a recording
//! in-memory gateway, so no Argo installation is needed.
//!
//! # Test Categories
//!
//! - `create_flow`: create submissions, labels, parameters, TTL handling
//! - `destroy_flow`: destroy submissions and caller-contract checks
//! - `status_reads`: status reads, not-found vs transport, cancellation
//! - `store_flow`: orchestrator results kept and reloaded through the store

mod fixtures;

mod status_reads;
mod store_flow;
