//! In-memory adapters for Vibely.
//!
//! - [`MemoryBroker`] / [`MemoryTransport`]: topic based push broker and the
//!   transport connecting to it
//! - [`MemoryBackend`]: feed and profile store implementing the pull
//!   adapters, publishing push events through the broker
//!
//! Used by the demo client and the integration tests.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod broker;
pub mod store;

pub use broker::{BrokerConfig, BrokerStats, DeliveryResult, LinkEvent, MemoryBroker, MemoryLink, MemoryTransport};
pub use store::{MemoryBackend, Op};

// vim: ts=4
