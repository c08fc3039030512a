//! Push Channel Handle
//!
//! One logical push connection. The handle owns no business logic: it
//! connects and disconnects when told to, joins topics, decodes inbound
//! frames and hands the decoded events to registered handlers.
//!
//! Inbound frames are pumped by a single task per connection, so handlers
//! for one channel never run concurrently with each other and see events in
//! arrival order.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_CONNECT_TIMEOUT;
use crate::prelude::*;
use vibely_types::event::{ChannelMessage, EventKind, PushEvent};
use vibely_types::transport_adapter::{Transport, TransportLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
	Disconnected,
	Connected,
}

/// Observable state of the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
	pub state: ChannelState,
	/// Number of successful connects so far, identifies the current connection
	pub epoch: u64,
	/// Topics joined on the current connection
	pub topics: BTreeSet<Box<str>>,
}

impl Default for ChannelStatus {
	fn default() -> Self {
		Self { state: ChannelState::Disconnected, epoch: 0, topics: BTreeSet::new() }
	}
}

pub type EventHandler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

// Handlers //
//**********//

#[derive(Default)]
struct HandlerRegistry {
	next_id: AtomicU64,
	handlers: RwLock<HashMap<EventKind, Vec<(u64, EventHandler)>>>,
}

impl HandlerRegistry {
	fn add(&self, kind: EventKind, handler: EventHandler) -> u64 {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.handlers.write().entry(kind).or_default().push((id, handler));
		id
	}

	fn remove(&self, kind: EventKind, id: u64) {
		let mut handlers = self.handlers.write();
		if let Some(list) = handlers.get_mut(&kind) {
			list.retain(|(handler_id, _)| *handler_id != id);
			if list.is_empty() {
				handlers.remove(&kind);
			}
		}
	}

	fn count(&self, kind: EventKind) -> usize {
		self.handlers.read().get(&kind).map_or(0, Vec::len)
	}

	fn dispatch(&self, event: &PushEvent) -> usize {
		// Handlers run without the lock held, they may register or cancel others
		let handlers: Vec<EventHandler> = self
			.handlers
			.read()
			.get(&event.kind())
			.map(|list| list.iter().map(|(_, h)| h.clone()).collect())
			.unwrap_or_default();

		for handler in &handlers {
			handler(event);
		}
		handlers.len()
	}

	fn dispatch_message(&self, msg: &ChannelMessage) {
		match PushEvent::from_message(msg) {
			Ok(Some(event)) => {
				let delivered = self.dispatch(&event);
				debug!(topic = %msg.topic, event = %msg.event, delivered, "Push event dispatched");
			}
			Ok(None) => {
				debug!(topic = %msg.topic, event = %msg.event, "Ignoring unknown push event");
			}
			Err(e) => {
				warn!(topic = %msg.topic, event = %msg.event, error = %e, "Dropping malformed push event");
			}
		}
	}
}

/// Cancellation handle of a registered event handler
///
/// The handler stays registered while this value lives. Dropping it, or
/// calling [`Subscription::cancel`], deregisters the handler.
#[must_use = "dropping a Subscription deregisters its handler"]
pub struct Subscription {
	registry: Weak<HandlerRegistry>,
	kind: EventKind,
	id: u64,
}

impl Subscription {
	pub fn kind(&self) -> EventKind {
		self.kind
	}

	pub fn cancel(self) {}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(registry) = self.registry.upgrade() {
			registry.remove(self.kind, self.id);
		}
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription").field("kind", &self.kind).field("id", &self.id).finish()
	}
}

// Channel //
//*********//

struct ActiveLink {
	link: Box<dyn TransportLink>,
	pump: JoinHandle<()>,
	cancel: CancellationToken,
	epoch: u64,
}

impl ActiveLink {
	/// Stop the pump and wait until its last dispatch returned, then close the link
	async fn shutdown(self) {
		self.cancel.cancel();
		if let Err(e) = self.pump.await
			&& e.is_panic()
		{
			error!(epoch = self.epoch, "Push channel pump panicked");
		}
		self.link.close().await;
	}
}

pub struct ChannelHandle {
	transport: Arc<dyn Transport>,
	handlers: Arc<HandlerRegistry>,
	/// Serializes connect / disconnect / subscribe
	link: Mutex<Option<ActiveLink>>,
	status: Arc<watch::Sender<ChannelStatus>>,
	connect_timeout: Duration,
}

impl ChannelHandle {
	pub fn new(transport: Arc<dyn Transport>) -> Self {
		let (status, _) = watch::channel(ChannelStatus::default());
		Self {
			transport,
			handlers: Arc::new(HandlerRegistry::default()),
			link: Mutex::new(None),
			status: Arc::new(status),
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
		}
	}

	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = timeout;
		self
	}

	/// Connect the channel
	///
	/// Never fails: if the transport can not be reached the channel stays
	/// Disconnected and the returned state says so.
	pub async fn connect(&self) -> ChannelState {
		let mut link = self.link.lock().await;
		if self.is_connected() {
			return ChannelState::Connected;
		}

		// The transport ended this link on its own, release it before reconnecting
		if let Some(stale) = link.take() {
			stale.shutdown().await;
		}

		let opened = match tokio::time::timeout(self.connect_timeout, self.transport.open()).await
		{
			Ok(Ok(opened)) => opened,
			Ok(Err(e)) => {
				warn!(error = %e, "Push channel connect failed");
				return ChannelState::Disconnected;
			}
			Err(_) => {
				let e = Error::TransportUnavailable(format!(
					"connect timed out after {}ms",
					self.connect_timeout.as_millis()
				));
				warn!(error = %e, "Push channel connect failed");
				return ChannelState::Disconnected;
			}
		};

		let epoch = self.status.borrow().epoch + 1;
		self.status.send_modify(|status| {
			status.state = ChannelState::Connected;
			status.epoch = epoch;
			status.topics.clear();
		});

		let cancel = CancellationToken::new();
		let pump = tokio::spawn(pump(
			opened.inbound,
			self.handlers.clone(),
			Arc::downgrade(&self.status),
			epoch,
			cancel.clone(),
		));

		info!(conn_id = %opened.link.conn_id(), epoch, "Push channel connected");
		*link = Some(ActiveLink { link: opened.link, pump, cancel, epoch });
		ChannelState::Connected
	}

	/// Disconnect the channel. Idempotent, always succeeds.
	///
	/// When this returns no handler of the old connection runs anymore, and
	/// frames still buffered for it are discarded.
	pub async fn disconnect(&self) {
		let mut link = self.link.lock().await;
		if let Some(active) = link.take() {
			let conn_id = active.link.conn_id().to_string();
			let epoch = active.epoch;
			active.shutdown().await;
			info!(conn_id = %conn_id, epoch, "Push channel disconnected");
		}

		self.status.send_if_modified(|status| {
			let changed = status.state != ChannelState::Disconnected || !status.topics.is_empty();
			status.state = ChannelState::Disconnected;
			status.topics.clear();
			changed
		});
	}

	/// Join a topic on the current connection
	///
	/// Ignored while Disconnected: the transport does not queue
	/// subscriptions, so callers subscribe again after every connect.
	/// Returns whether the topic is joined on the current connection.
	pub async fn subscribe(&self, topic: &str) -> bool {
		let link = self.link.lock().await;
		let Some(active) = link.as_ref() else {
			debug!(topic, "Ignoring subscribe while disconnected");
			return false;
		};
		if !self.is_connected() {
			debug!(topic, "Ignoring subscribe on a closed link");
			return false;
		}
		if self.status.borrow().topics.contains(topic) {
			return true;
		}

		match active.link.subscribe(topic).await {
			Ok(()) => {
				let epoch = active.epoch;
				let mut joined = false;
				self.status.send_if_modified(|status| {
					if status.epoch != epoch || status.state != ChannelState::Connected {
						return false;
					}
					joined = true;
					status.topics.insert(topic.into())
				});
				if joined {
					debug!(topic, epoch, "Joined topic");
				} else {
					debug!(topic, epoch, "Link closed while joining topic");
				}
				joined
			}
			Err(e) => {
				warn!(topic, error = %e, "Failed to join topic");
				false
			}
		}
	}

	/// Register a handler for an event kind
	pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
	where
		F: Fn(&PushEvent) + Send + Sync + 'static,
	{
		let id = self.handlers.add(kind, Arc::new(handler));
		Subscription { registry: Arc::downgrade(&self.handlers), kind, id }
	}

	/// Remove a handler registered with [`ChannelHandle::on`]
	pub fn off(&self, subscription: Subscription) {
		subscription.cancel();
	}

	pub fn handler_count(&self, kind: EventKind) -> usize {
		self.handlers.count(kind)
	}

	pub fn state(&self) -> ChannelState {
		self.status.borrow().state
	}

	pub fn is_connected(&self) -> bool {
		self.state() == ChannelState::Connected
	}

	pub fn epoch(&self) -> u64 {
		self.status.borrow().epoch
	}

	pub fn topics(&self) -> Vec<Box<str>> {
		self.status.borrow().topics.iter().cloned().collect()
	}

	pub fn status(&self) -> ChannelStatus {
		self.status.borrow().clone()
	}

	/// Observe state changes
	pub fn watch(&self) -> watch::Receiver<ChannelStatus> {
		self.status.subscribe()
	}
}

impl Drop for ChannelHandle {
	fn drop(&mut self) {
		if let Some(active) = self.link.get_mut().take() {
			active.cancel.cancel();
			active.pump.abort();
		}
	}
}

impl std::fmt::Debug for ChannelHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChannelHandle")
			.field("transport", &self.transport)
			.field("status", &*self.status.borrow())
			.finish_non_exhaustive()
	}
}

fn is_current(status: &Weak<watch::Sender<ChannelStatus>>, epoch: u64) -> bool {
	status.upgrade().is_some_and(|status| {
		let status = status.borrow();
		status.epoch == epoch && status.state == ChannelState::Connected
	})
}

/// Forward inbound frames of one connection to the handlers, one at a time
///
/// Stops as soon as `cancel` fires, even with frames still buffered.
async fn pump(
	inbound: flume::Receiver<ChannelMessage>,
	handlers: Arc<HandlerRegistry>,
	status: Weak<watch::Sender<ChannelStatus>>,
	epoch: u64,
	cancel: CancellationToken,
) {
	loop {
		let msg = tokio::select! {
			biased;
			() = cancel.cancelled() => return,
			msg = inbound.recv_async() => msg,
		};
		let Ok(msg) = msg else { break };
		if cancel.is_cancelled() || !is_current(&status, epoch) {
			debug!(epoch, "Discarding frame of a stale connection");
			return;
		}
		handlers.dispatch_message(&msg);
	}

	// The transport closed the link
	if let Some(status) = status.upgrade() {
		let closed = status.send_if_modified(|status| {
			if status.epoch == epoch && status.state == ChannelState::Connected {
				status.state = ChannelState::Disconnected;
				status.topics.clear();
				true
			} else {
				false
			}
		});
		if closed {
			warn!(epoch, "Push channel link closed by transport");
		}
	}
}


// vim: ts=4
