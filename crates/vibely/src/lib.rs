//! Vibely is the real-time client layer of a social feed.
//!
//! # Features
//!
//! - One push channel per session, bound to the authenticated identity
//! - Deduplicated notification stream
//! - Independent, scoped feed views kept consistent with
//!     - pull snapshots
//!     - pushed create / update / delete events
//!     - authoritative results of local actions
//! - Pluggable transport and backend adapters

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

// Re-export shared types and adapter traits from vibely-types
pub use vibely_types::api_adapter;
pub use vibely_types::error;
pub use vibely_types::event;
pub use vibely_types::model;
pub use vibely_types::topic;
pub use vibely_types::transport_adapter;
pub use vibely_types::types;
pub use vibely_types::utils;

// Core re-exports
pub use vibely_core::channel;
pub use vibely_core::config;
pub use vibely_core::feed;
pub use vibely_core::notification;
pub use vibely_core::session;

// Local modules
pub mod client;
pub mod prelude;

pub use crate::client::{Client, ClientBuilder};
pub use vibely_core::{
	ChannelHandle, ChannelState, ClientConfig, NotificationAggregator, ProfileController, ViewController,
	ViewScope, ViewState,
};

// vim: ts=4
