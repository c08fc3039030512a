//! Push events
//!
//! The channel carries JSON frames:
//! ```json
//! {
//!   "id": "msg-123",
//!   "topic": "room:u1",
//!   "event": "notification|item-created|item-updated|item-deleted",
//!   "data": { ... }
//! }
//! ```
//!
//! Frames are decoded into the closed [`PushEvent`] enumeration. Each kind
//! has a fixed required-field schema; a payload violating it is reported as
//! [`Error::MalformedEvent`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Notification, Post};
use crate::prelude::*;
use crate::utils::random_id;

/// A frame on the push channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
	/// Unique message ID
	pub id: String,

	/// Topic the message was published on
	pub topic: String,

	/// Event kind
	pub event: String,

	/// Event payload
	#[serde(default)]
	pub data: Value,
}

impl ChannelMessage {
	pub fn new(topic: impl Into<String>, event: impl Into<String>, data: Value) -> Self {
		Self {
			id: random_id().unwrap_or_default(),
			topic: topic.into(),
			event: event.into(),
			data,
		}
	}

	pub fn to_json(&self) -> ClResult<String> {
		Ok(serde_json::to_string(self)?)
	}

	pub fn from_json(text: &str) -> ClResult<Self> {
		serde_json::from_str(text).map_err(|e| Error::MalformedEvent(e.to_string()))
	}
}

/// Event kinds consumed by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
	Notification,
	ItemCreated,
	ItemUpdated,
	ItemDeleted,
}

impl EventKind {
	pub const ALL: [EventKind; 4] =
		[EventKind::Notification, EventKind::ItemCreated, EventKind::ItemUpdated, EventKind::ItemDeleted];

	pub fn as_str(self) -> &'static str {
		match self {
			EventKind::Notification => "notification",
			EventKind::ItemCreated => "item-created",
			EventKind::ItemUpdated => "item-updated",
			EventKind::ItemDeleted => "item-deleted",
		}
	}

	/// Parse a wire event name, accepting the legacy post event names
	pub fn parse(name: &str) -> Option<Self> {
		match name {
			"notification" => Some(EventKind::Notification),
			"item-created" | "new_post" => Some(EventKind::ItemCreated),
			"item-updated" | "post_updated" => Some(EventKind::ItemUpdated),
			"item-deleted" | "post_deleted" => Some(EventKind::ItemDeleted),
			_ => None,
		}
	}
}

impl std::fmt::Display for EventKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct DeletedPayload {
	#[serde(alias = "postId", alias = "_id")]
	id: PostId,
}

/// A decoded push event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
	Notification(Notification),
	ItemCreated(Post),
	ItemUpdated(Post),
	ItemDeleted { id: PostId },
}

impl PushEvent {
	pub fn kind(&self) -> EventKind {
		match self {
			PushEvent::Notification(_) => EventKind::Notification,
			PushEvent::ItemCreated(_) => EventKind::ItemCreated,
			PushEvent::ItemUpdated(_) => EventKind::ItemUpdated,
			PushEvent::ItemDeleted { .. } => EventKind::ItemDeleted,
		}
	}

	/// Decode and validate the payload of a known event kind
	pub fn decode(kind: EventKind, data: Value) -> ClResult<Self> {
		let malformed = |e: serde_json::Error| Error::MalformedEvent(format!("{}: {}", kind, e));

		match kind {
			EventKind::Notification => {
				if !data.is_object() {
					return Err(Error::MalformedEvent(format!("{}: payload is not an object", kind)));
				}
				Ok(PushEvent::Notification(serde_json::from_value(data).map_err(malformed)?))
			}
			EventKind::ItemCreated | EventKind::ItemUpdated => {
				let post: Post = serde_json::from_value(data).map_err(malformed)?;
				post.validate()?;
				Ok(if kind == EventKind::ItemCreated {
					PushEvent::ItemCreated(post)
				} else {
					PushEvent::ItemUpdated(post)
				})
			}
			EventKind::ItemDeleted => {
				let payload: DeletedPayload = serde_json::from_value(data).map_err(malformed)?;
				if payload.id.as_str().is_empty() {
					return Err(Error::MalformedEvent(format!("{}: empty id", kind)));
				}
				Ok(PushEvent::ItemDeleted { id: payload.id })
			}
		}
	}

	/// Decode a channel frame
	///
	/// Returns `Ok(None)` for event kinds this client does not consume.
	pub fn from_message(msg: &ChannelMessage) -> ClResult<Option<Self>> {
		match EventKind::parse(&msg.event) {
			Some(kind) => Self::decode(kind, msg.data.clone()).map(Some),
			None => Ok(None),
		}
	}

	/// Encode as a channel frame on `topic`
	pub fn to_message(&self, topic: impl Into<String>) -> ClResult<ChannelMessage> {
		let data = match self {
			PushEvent::Notification(n) => serde_json::to_value(n)?,
			PushEvent::ItemCreated(post) | PushEvent::ItemUpdated(post) => {
				serde_json::to_value(post)?
			}
			PushEvent::ItemDeleted { id } => serde_json::to_value(DeletedPayload { id: id.clone() })?,
		};
		Ok(ChannelMessage::new(topic, self.kind().as_str(), data))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_decode_item_created() {
		let msg = ChannelMessage::new(
			"feed",
			"item-created",
			json!({ "id": "p1", "author": { "id": "u1" }, "content": "hi" }),
		);
		let event = PushEvent::from_message(&msg).unwrap().unwrap();
		assert_eq!(event.kind(), EventKind::ItemCreated);
		assert!(matches!(event, PushEvent::ItemCreated(ref p) if p.id.as_str() == "p1"));
	}

	#[test]
	fn test_decode_legacy_names() {
		let msg = ChannelMessage::new("feed", "post_deleted", json!({ "postId": "p7" }));
		let event = PushEvent::from_message(&msg).unwrap().unwrap();
		assert_eq!(event, PushEvent::ItemDeleted { id: PostId::from("p7") });

		let msg = ChannelMessage::new("feed", "new_post", json!({ "_id": "p8", "user": "u1" }));
		let event = PushEvent::from_message(&msg).unwrap().unwrap();
		assert_eq!(event.kind(), EventKind::ItemCreated);
	}

	#[test]
	fn test_decode_unknown_kind_is_ignored() {
		let msg = ChannelMessage::new("feed", "typing", json!({}));
		assert!(PushEvent::from_message(&msg).unwrap().is_none());
	}

	#[test]
	fn test_decode_malformed() {
		// missing id
		let res = PushEvent::decode(EventKind::ItemUpdated, json!({ "author": "u1" }));
		assert!(matches!(res, Err(Error::MalformedEvent(_))));

		// missing author
		let res = PushEvent::decode(EventKind::ItemCreated, json!({ "id": "p1" }));
		assert!(matches!(res, Err(Error::MalformedEvent(_))));

		let res = PushEvent::decode(EventKind::ItemDeleted, json!({}));
		assert!(matches!(res, Err(Error::MalformedEvent(_))));

		let res = PushEvent::decode(EventKind::Notification, json!("hello"));
		assert!(matches!(res, Err(Error::MalformedEvent(_))));
	}

	#[test]
	fn test_notification_without_id_decodes() {
		let event = PushEvent::decode(EventKind::Notification, json!({ "message": "hi" })).unwrap();
		assert!(matches!(event, PushEvent::Notification(ref n) if n.id.is_none()));
	}

	#[test]
	fn test_message_json_roundtrip_keeps_event() {
		let event = PushEvent::ItemDeleted { id: PostId::from("p1") };
		let msg = event.to_message("feed").unwrap();
		let parsed = ChannelMessage::from_json(&msg.to_json().unwrap()).unwrap();
		assert_eq!(parsed.event, "item-deleted");
		assert_eq!(PushEvent::from_message(&parsed).unwrap(), Some(event));
	}
}

// vim: ts=4
