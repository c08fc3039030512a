//! Real-time synchronization core of the Vibely client.
//!
//! The core keeps a locally consistent view of the social feed and the
//! notification stream while a push channel delivers events concurrently
//! with on-demand pull requests:
//!
//! - [`channel::ChannelHandle`] wraps one logical push connection
//! - [`session::SessionBinding`] connects, subscribes and tears down the
//!   channel as the authenticated identity changes
//! - [`notification::NotificationAggregator`] deduplicates pushed notifications
//! - [`feed::FeedReconciler`] fans feed events out to every open view
//! - [`feed::ViewController`] and [`feed::ProfileController`] own the
//!   snapshot-loaded collections and apply confirmed action results

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod feed;
pub mod notification;
pub mod prelude;
pub mod session;

pub use channel::{ChannelHandle, ChannelState, ChannelStatus, Subscription};
pub use config::ClientConfig;
pub use feed::{FeedReconciler, ProfileController, ViewController, ViewScope, ViewState};
pub use notification::NotificationAggregator;
pub use session::SessionBinding;

// vim: ts=4
