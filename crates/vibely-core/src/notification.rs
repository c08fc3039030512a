//! Notification Aggregator
//!
//! Ordered, deduplicated collection of notifications pushed to the subject's
//! private room. Every present entry counts as unread; only [`clear`] lowers
//! the count.
//!
//! [`clear`]: NotificationAggregator::clear

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;

use crate::channel::{ChannelHandle, Subscription};
use crate::prelude::*;
use vibely_types::event::{EventKind, PushEvent};
use vibely_types::model::Notification;

/// Deduplication key of an entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationKey {
	/// Id supplied by the server
	Id(Box<str>),
	/// Fallback for notifications without an id, from the arrival sequence
	Arrival(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEntry {
	pub key: NotificationKey,
	/// Arrival sequence number
	pub seq: u64,
	pub notification: Notification,
}

#[derive(Debug, Default)]
struct Inner {
	/// Newest first
	entries: VecDeque<NotificationEntry>,
	ids: HashSet<Box<str>>,
	next_seq: u64,
}

#[derive(Debug)]
pub struct NotificationAggregator {
	inner: Mutex<Inner>,
	revision: watch::Sender<u64>,
}

impl Default for NotificationAggregator {
	fn default() -> Self {
		Self::new()
	}
}

impl NotificationAggregator {
	pub fn new() -> Self {
		let (revision, _) = watch::channel(0);
		Self { inner: Mutex::new(Inner::default()), revision }
	}

	/// Prepend a notification unless one with the same id is present
	///
	/// Returns whether the collection changed.
	pub fn ingest(&self, notification: Notification) -> bool {
		{
			let mut inner = self.inner.lock();
			let seq = inner.next_seq;
			inner.next_seq += 1;

			let key = match notification.id.as_deref() {
				Some(id) if !id.is_empty() => {
					if !inner.ids.insert(id.into()) {
						debug!(id, "Duplicate notification ignored");
						return false;
					}
					NotificationKey::Id(id.into())
				}
				_ => NotificationKey::Arrival(seq),
			};
			debug!(?key, "Notification received");
			inner.entries.push_front(NotificationEntry { key, seq, notification });
		}
		self.bump();
		true
	}

	/// Drop every entry
	pub fn clear(&self) {
		let cleared = {
			let mut inner = self.inner.lock();
			let cleared = !inner.entries.is_empty();
			inner.entries.clear();
			inner.ids.clear();
			cleared
		};
		if cleared {
			self.bump();
		}
	}

	/// Number of unread (present) notifications
	pub fn count(&self) -> usize {
		self.inner.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.count() == 0
	}

	/// Entries, newest first
	pub fn list(&self) -> Vec<NotificationEntry> {
		self.inner.lock().entries.iter().cloned().collect()
	}

	/// Observe changes; the value is a revision counter
	pub fn watch(&self) -> watch::Receiver<u64> {
		self.revision.subscribe()
	}

	/// Feed `notification` events of a channel into this aggregator
	pub fn attach(self: &Arc<Self>, channel: &ChannelHandle) -> Subscription {
		let aggregator = Arc::downgrade(self);
		channel.on(EventKind::Notification, move |event| {
			if let (Some(aggregator), PushEvent::Notification(n)) = (aggregator.upgrade(), event) {
				aggregator.ingest(n.clone());
			}
		})
	}

	fn bump(&self) {
		self.revision.send_modify(|rev| *rev += 1);
	}
}


// vim: ts=4
