//! Core data model, component logic, and port traits for the RevOps AI
//! gateway: signature verification, ingress routing, agent invocation,
//! response classification, delivery, and conversation recording.
//!
//! This crate holds everything that can be exercised without a live chat
//! platform, agent runtime, queue, or object store — those are modeled as
//! port traits (see [`queue`], [`object_store`], [`agent::runtime`]) and
//! wired to real implementations by the `revops-gateway` binary crate.

pub mod classifier;
pub mod clock;
pub mod delivery;
pub mod error;
pub mod ingress;
pub mod model;
pub mod object_store;
pub mod queue;
pub mod recorder;
pub mod verifier;

pub mod agent;

pub use error::{GatewayError, Result};
