//! Session Binding
//!
//! Ties the push channel to the authenticated identity:
//!
//! - none → X: connect, join `room:X` and the global feed topic
//! - X → none: disconnect, clear notifications, forget X
//! - X → Y: X → none, then none → Y
//!
//! There is no automatic retry. A failed connect leaves the channel
//! Disconnected until the next identity transition or [`SessionBinding::reconnect`].

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::channel::{ChannelHandle, ChannelState, Subscription};
use crate::notification::NotificationAggregator;
use crate::prelude::*;
use vibely_types::topic;

#[derive(Debug, Default)]
struct BindingState {
	identity: Option<SubjectId>,
	/// Identity and channel epoch of the last successful subscription
	subscribed: Option<(SubjectId, u64)>,
}

#[derive(Debug)]
pub struct SessionBinding {
	channel: Arc<ChannelHandle>,
	notifications: Arc<NotificationAggregator>,
	global_topic: Box<str>,
	/// Serializes transitions
	state: Mutex<BindingState>,
	_notification_sub: Subscription,
}

impl SessionBinding {
	pub fn new(
		channel: Arc<ChannelHandle>,
		notifications: Arc<NotificationAggregator>,
		global_topic: impl Into<Box<str>>,
	) -> Self {
		let notification_sub = notifications.attach(&channel);
		Self {
			channel,
			notifications,
			global_topic: global_topic.into(),
			state: Mutex::new(BindingState::default()),
			_notification_sub: notification_sub,
		}
	}

	/// Apply an identity transition, returns the resulting channel state
	pub async fn set_identity(&self, identity: Option<SubjectId>) -> ChannelState {
		let mut state = self.state.lock().await;

		match identity {
			None => {
				self.teardown(&mut state).await;
			}
			Some(id) => {
				if state.identity.as_ref().is_some_and(|current| current != &id) {
					self.teardown(&mut state).await;
				}
				state.identity = Some(id.clone());
				if self.is_alive(&state, &id) {
					debug!(subject = %id, "Session already bound");
				} else {
					self.establish(&mut state, id).await;
				}
			}
		}

		self.channel.state()
	}

	/// Connect and re-subscribe for the current identity if the channel is down
	///
	/// No-op while logged out or while the current subscription is alive.
	pub async fn reconnect(&self) -> ChannelState {
		let mut state = self.state.lock().await;
		match state.identity.clone() {
			Some(id) if !self.is_alive(&state, &id) => {
				info!(subject = %id, "Reconnecting push channel");
				self.establish(&mut state, id).await;
			}
			Some(_) => {}
			None => debug!("Reconnect ignored, no identity"),
		}
		self.channel.state()
	}

	pub async fn identity(&self) -> Option<SubjectId> {
		self.state.lock().await.identity.clone()
	}

	/// Whether the current identity's topics are joined on the live connection
	pub async fn is_bound(&self) -> bool {
		let state = self.state.lock().await;
		state.identity.as_ref().is_some_and(|id| self.is_alive(&state, id))
	}

	pub fn channel(&self) -> &Arc<ChannelHandle> {
		&self.channel
	}

	pub fn notifications(&self) -> &Arc<NotificationAggregator> {
		&self.notifications
	}

	pub fn global_topic(&self) -> &str {
		&self.global_topic
	}

	fn is_alive(&self, state: &BindingState, id: &SubjectId) -> bool {
		match &state.subscribed {
			Some((subscribed, epoch)) => {
				subscribed == id && self.channel.is_connected() && *epoch == self.channel.epoch()
			}
			None => false,
		}
	}

	async fn establish(&self, state: &mut BindingState, id: SubjectId) {
		state.subscribed = None;

		if self.channel.connect().await != ChannelState::Connected {
			warn!(subject = %id, "Push channel unavailable, session stays disconnected");
			return;
		}
		let epoch = self.channel.epoch();

		let room = topic::room(&id);
		let room_joined = self.channel.subscribe(&room).await;
		let feed_joined = self.channel.subscribe(&self.global_topic).await;
		if room_joined && feed_joined {
			info!(subject = %id, epoch, room = %room, feed = %self.global_topic, "Session bound");
			state.subscribed = Some((id, epoch));
		} else {
			warn!(subject = %id, epoch, room_joined, feed_joined, "Session topics not joined");
		}
	}

	async fn teardown(&self, state: &mut BindingState) {
		self.channel.disconnect().await;
		self.notifications.clear();
		if let Some(id) = state.identity.take() {
			info!(subject = %id, "Session unbound");
		}
		state.subscribed = None;
	}
}

// vim: ts=4
