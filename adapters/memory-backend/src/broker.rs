//! In-memory push broker
//!
//! Topic based fan-out to any number of connections. Topic membership is per
//! connection and is lost with it, like on a real socket server.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use vibely_types::event::{ChannelMessage, PushEvent};
use vibely_types::prelude::*;
use vibely_types::transport_adapter::{OpenLink, Transport, TransportLink};
use vibely_types::types::now;

/// Connection lifecycle events, in the order the broker saw them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
	Connected { conn_id: Box<str> },
	Subscribed { conn_id: Box<str>, topic: Box<str> },
	Disconnected { conn_id: Box<str> },
}

/// Result of publishing a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
	/// Message delivered to N connections
	Delivered(usize),
	/// No connection joined the topic
	NoSubscribers,
}

/// Broker statistics
#[derive(Debug, Clone)]
pub struct BrokerStats {
	pub connections: usize,
	/// Total number of (connection, topic) pairs
	pub subscriptions: usize,
	/// Connections per topic
	pub topics: HashMap<Box<str>, usize>,
}

/// Configuration
#[derive(Clone, Debug)]
pub struct BrokerConfig {
	/// Maximum number of messages to buffer per connection
	pub buffer_size: usize,
}

impl Default for BrokerConfig {
	fn default() -> Self {
		Self { buffer_size: 128 }
	}
}

#[derive(Debug)]
struct Connection {
	topics: BTreeSet<Box<str>>,
	connected_at: Timestamp,
	sender: flume::Sender<ChannelMessage>,
}

#[derive(Debug)]
pub struct MemoryBroker {
	connections: RwLock<HashMap<Box<str>, Connection>>,
	history: Mutex<Vec<LinkEvent>>,
	available: AtomicBool,
	config: BrokerConfig,
}

impl MemoryBroker {
	/// Create a new broker with default config
	pub fn new() -> Self {
		Self::with_config(BrokerConfig::default())
	}

	/// Create with custom config
	pub fn with_config(config: BrokerConfig) -> Self {
		Self {
			connections: RwLock::new(HashMap::new()),
			history: Mutex::new(Vec::new()),
			available: AtomicBool::new(true),
			config,
		}
	}

	/// Make new connections fail (or succeed again)
	pub fn set_available(&self, available: bool) {
		self.available.store(available, Ordering::SeqCst);
	}

	pub fn is_available(&self) -> bool {
		self.available.load(Ordering::SeqCst)
	}

	/// Register a new connection
	fn connect(&self) -> ClResult<(Box<str>, flume::Receiver<ChannelMessage>)> {
		if !self.is_available() {
			return Err(Error::TransportUnavailable("broker is not accepting connections".into()));
		}

		let conn_id: Box<str> = uuid::Uuid::new_v4().to_string().into();
		let (sender, receiver) = flume::bounded(self.config.buffer_size);
		self.connections
			.write()
			.insert(conn_id.clone(), Connection { topics: BTreeSet::new(), connected_at: now(), sender });
		self.history.lock().push(LinkEvent::Connected { conn_id: conn_id.clone() });

		debug!(conn_id = %conn_id, "Connection registered");
		Ok((conn_id, receiver))
	}

	fn subscribe(&self, conn_id: &str, topic: &str) -> ClResult<()> {
		let mut connections = self.connections.write();
		let Some(conn) = connections.get_mut(conn_id) else {
			return Err(Error::TransportUnavailable(format!("connection {} is closed", conn_id)));
		};
		if conn.topics.insert(topic.into()) {
			self.history
				.lock()
				.push(LinkEvent::Subscribed { conn_id: conn_id.into(), topic: topic.into() });
			debug!(conn_id = %conn_id, topic = %topic, "Topic joined");
		}
		Ok(())
	}

	/// Remove a connection, closing its inbound queue
	fn disconnect(&self, conn_id: &str) -> bool {
		let removed = self.connections.write().remove(conn_id);
		if let Some(conn) = removed {
			self.history.lock().push(LinkEvent::Disconnected { conn_id: conn_id.into() });
			debug!(conn_id = %conn_id, since = conn.connected_at.0, "Connection unregistered");
			true
		} else {
			false
		}
	}

	/// Deliver a message to every connection that joined its topic
	pub fn publish(&self, msg: ChannelMessage) -> DeliveryResult {
		let connections = self.connections.read();

		let mut delivered = 0;
		for (conn_id, conn) in connections.iter() {
			if !conn.topics.contains(msg.topic.as_str()) {
				continue;
			}
			match conn.sender.try_send(msg.clone()) {
				Ok(()) => delivered += 1,
				Err(e) => warn!(conn_id = %conn_id, topic = %msg.topic, error = %e, "Message not delivered"),
			}
		}

		if delivered > 0 { DeliveryResult::Delivered(delivered) } else { DeliveryResult::NoSubscribers }
	}

	/// Encode and publish an event on `topic`
	pub fn publish_event(&self, topic: &str, event: &PushEvent) -> ClResult<DeliveryResult> {
		let res = self.publish(event.to_message(topic)?);
		debug!(topic = %topic, event = %event.kind(), result = ?res, "Event published");
		Ok(res)
	}

	/// Drop every connection from the server side
	///
	/// Clients see their inbound stream end.
	pub fn drop_connections(&self) -> usize {
		let conn_ids: Vec<Box<str>> = self.connections.read().keys().cloned().collect();
		let dropped = conn_ids.iter().filter(|conn_id| self.disconnect(conn_id)).count();
		info!(dropped, "Connections dropped");
		dropped
	}

	pub fn connection_count(&self) -> usize {
		self.connections.read().len()
	}

	/// Topics joined by a connection, None if it is not connected
	pub fn connection_topics(&self, conn_id: &str) -> Option<Vec<Box<str>>> {
		self.connections.read().get(conn_id).map(|conn| conn.topics.iter().cloned().collect())
	}

	/// Number of connections that joined `topic`
	pub fn subscriber_count(&self, topic: &str) -> usize {
		self.connections.read().values().filter(|conn| conn.topics.contains(topic)).count()
	}

	/// Connection lifecycle events so far
	pub fn history(&self) -> Vec<LinkEvent> {
		self.history.lock().clone()
	}

	/// Get broker statistics
	pub fn stats(&self) -> BrokerStats {
		let connections = self.connections.read();

		let mut subscriptions = 0;
		let mut topics: HashMap<Box<str>, usize> = HashMap::new();
		for conn in connections.values() {
			subscriptions += conn.topics.len();
			for topic in &conn.topics {
				*topics.entry(topic.clone()).or_default() += 1;
			}
		}

		BrokerStats { connections: connections.len(), subscriptions, topics }
	}
}

impl Default for MemoryBroker {
	fn default() -> Self {
		Self::new()
	}
}

// Transport //
//***********//

/// [`Transport`] connecting to a [`MemoryBroker`]
#[derive(Debug, Clone)]
pub struct MemoryTransport {
	broker: Arc<MemoryBroker>,
}

impl MemoryTransport {
	pub fn new(broker: Arc<MemoryBroker>) -> Self {
		Self { broker }
	}
}

#[async_trait]
impl Transport for MemoryTransport {
	async fn open(&self) -> ClResult<OpenLink> {
		let (conn_id, inbound) = self.broker.connect()?;
		let link = MemoryLink { conn_id, broker: Arc::downgrade(&self.broker) };
		Ok(OpenLink { link: Box::new(link), inbound })
	}
}

#[derive(Debug)]
pub struct MemoryLink {
	conn_id: Box<str>,
	broker: Weak<MemoryBroker>,
}

#[async_trait]
impl TransportLink for MemoryLink {
	fn conn_id(&self) -> &str {
		&self.conn_id
	}

	async fn subscribe(&self, topic: &str) -> ClResult<()> {
		match self.broker.upgrade() {
			Some(broker) => broker.subscribe(&self.conn_id, topic),
			None => Err(Error::TransportUnavailable("broker is gone".into())),
		}
	}

	async fn close(&self) {
		if let Some(broker) = self.broker.upgrade() {
			broker.disconnect(&self.conn_id);
		}
	}
}

impl Drop for MemoryLink {
	fn drop(&mut self) {
		if let Some(broker) = self.broker.upgrade() {
			broker.disconnect(&self.conn_id);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn msg(topic: &str) -> ChannelMessage {
		ChannelMessage::new(topic, "notification", json!({ "id": "n1", "message": "hi" }))
	}

	#[tokio::test]
	async fn test_publish_reaches_topic_members_only() {
		let broker = Arc::new(MemoryBroker::new());
		let transport = MemoryTransport::new(broker.clone());

		let alice = transport.open().await.unwrap();
		let bob = transport.open().await.unwrap();
		alice.link.subscribe("room:alice").await.unwrap();
		bob.link.subscribe("room:bob").await.unwrap();

		assert_eq!(broker.publish(msg("room:alice")), DeliveryResult::Delivered(1));
		assert_eq!(alice.inbound.recv_async().await.unwrap().topic, "room:alice");
		assert!(bob.inbound.is_empty());

		assert_eq!(broker.publish(msg("room:carol")), DeliveryResult::NoSubscribers);
	}

	#[tokio::test]
	async fn test_unavailable_broker_refuses_connections() {
		let broker = Arc::new(MemoryBroker::new());
		broker.set_available(false);
		let transport = MemoryTransport::new(broker.clone());

		assert!(matches!(transport.open().await, Err(Error::TransportUnavailable(_))));
		assert_eq!(broker.connection_count(), 0);
	}

	#[tokio::test]
	async fn test_close_ends_inbound_and_forgets_topics() {
		let broker = Arc::new(MemoryBroker::new());
		let transport = MemoryTransport::new(broker.clone());

		let opened = transport.open().await.unwrap();
		let conn_id: Box<str> = opened.link.conn_id().into();
		opened.link.subscribe("feed").await.unwrap();
		opened.link.close().await;
		opened.link.close().await;

		assert!(opened.inbound.recv_async().await.is_err());
		assert!(broker.connection_topics(&conn_id).is_none());
		assert!(matches!(opened.link.subscribe("feed").await, Err(Error::TransportUnavailable(_))));
		assert_eq!(
			broker.history(),
			vec![
				LinkEvent::Connected { conn_id: conn_id.clone() },
				LinkEvent::Subscribed { conn_id: conn_id.clone(), topic: "feed".into() },
				LinkEvent::Disconnected { conn_id },
			]
		);
	}

	#[tokio::test]
	async fn test_drop_connections_and_stats() {
		let broker = Arc::new(MemoryBroker::new());
		let transport = MemoryTransport::new(broker.clone());

		let first = transport.open().await.unwrap();
		let second = transport.open().await.unwrap();
		first.link.subscribe("feed").await.unwrap();
		second.link.subscribe("feed").await.unwrap();
		second.link.subscribe("room:bob").await.unwrap();

		let stats = broker.stats();
		assert_eq!(stats.connections, 2);
		assert_eq!(stats.subscriptions, 3);
		assert_eq!(stats.topics.get("feed"), Some(&2));

		assert_eq!(broker.drop_connections(), 2);
		assert_eq!(broker.subscriber_count("feed"), 0);
		assert!(first.inbound.recv_async().await.is_err());
	}
}

// vim: ts=4
