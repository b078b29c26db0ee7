//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! This module follows the hexagonal architecture pattern: adapters are thin
//! translators between domain types and infrastructure-specific
//! representations, and contain no business logic.
//!
//! - **memory**: process-local sharded stores, retry queue, dead-letter sinks
//! - **cache**: Redis and in-memory timeline caches
//!
//! Networked store backends (Cassandra-style wide rows, sharded relational
//! tables) plug in by implementing the same ports; the fan-out engines are
//! written once against the traits.

pub mod cache;
pub mod memory;
