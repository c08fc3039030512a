//! Topic naming for the push channel

use crate::types::SubjectId;

/// Default topic carrying feed-wide events (post created/updated/deleted)
pub const GLOBAL_FEED: &str = "feed";

/// Prefix of a subject's private room
pub const ROOM_PREFIX: &str = "room:";

/// Private room of a subject, carries its notifications
pub fn room(subject: &SubjectId) -> String {
	format!("{}{}", ROOM_PREFIX, subject)
}


// vim: ts=4
