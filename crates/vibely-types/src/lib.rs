//! Shared types, collaborator traits, and core utilities for the Vibely client.
//!
//! This crate contains the data model (posts, notifications, profiles), the
//! closed set of push events, and the traits implemented by the external
//! collaborators (push transport and pull API). Adapter crates depend on this
//! crate only, so they compile independently of the synchronization core.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod api_adapter;
pub mod error;
pub mod event;
pub mod model;
pub mod prelude;
pub mod topic;
pub mod transport_adapter;
pub mod types;
pub mod utils;

// vim: ts=4
