//! # Edge RM
//!
//! A lightweight two-tier cluster resource manager for constrained edge
//! networks, in the spirit of an Apache Mesos-style master/agent split.
//!
//! ## Architecture
//!
//! - **Master**: aggregates agent state via a heartbeat protocol, hands
//!   resource offers to frameworks, and routes submitted tasks back to the
//!   agent that should run them on its next heartbeat.
//! - **Agent**: advertises host resources, drives a local container runtime,
//!   and reports task state upward.
//!
//! The wire framing, the container executor, and host-resource sampling are
//! all external collaborators behind capability traits ([`transport`],
//! [`runtime`], [`agent::probe`]) — this crate owns the control-plane logic,
//! not the plumbing around it.

/// The agent-side control loop: host sampling, heartbeats, task dispatch.
pub mod agent;
/// CLI argument surfaces for the `master` and `agent` binaries.
pub mod config;
/// Error types shared across the crate.
pub mod error;
/// The master-side control plane and read-only HTTP API.
pub mod master;
/// The wire schema shared by master and agent.
pub mod messages;
/// The agent-side container lifecycle adapter.
pub mod runtime;
/// The master's in-memory agent/task/framework registry.
pub mod store;
/// Abstract request/response transport.
pub mod transport;

pub use error::{Error, Result};
