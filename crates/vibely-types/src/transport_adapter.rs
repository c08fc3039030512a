//! Adapter for the push transport.
//!
//! The transport is an externally supplied, reliable, at-least-once
//! publish/subscribe primitive. Topic membership is per connection: a new
//! link starts with no subscriptions, and subscriptions made on a closed link
//! are lost.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::event::ChannelMessage;
use crate::prelude::*;

/// A freshly opened link and its inbound frame queue
///
/// The transport closes the `inbound` queue (drops its sender) when the
/// connection goes away.
pub struct OpenLink {
	pub link: Box<dyn TransportLink>,
	pub inbound: flume::Receiver<ChannelMessage>,
}

impl Debug for OpenLink {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OpenLink").field("conn_id", &self.link.conn_id()).finish()
	}
}

#[async_trait]
pub trait Transport: Debug + Send + Sync {
	/// Establish a new connection
	///
	/// Fails with [`Error::TransportUnavailable`] if the endpoint can not be
	/// reached.
	async fn open(&self) -> ClResult<OpenLink>;
}

#[async_trait]
pub trait TransportLink: Debug + Send + Sync {
	/// Unique id of this connection
	fn conn_id(&self) -> &str;

	/// Join a topic on this connection
	async fn subscribe(&self, topic: &str) -> ClResult<()>;

	/// Close the connection. Must be idempotent.
	async fn close(&self);
}

// vim: ts=4
