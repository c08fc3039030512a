//! Feed items, notifications and profiles
//!
//! Field names follow the backend's JSON. Aliases accept the legacy names
//! (`_id`, `user`, `image`, `profilePic`, `username`) so payloads from older
//! server versions decode into the same structures.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeSet;

use crate::prelude::*;

// AuthorSummary //
//***************//

/// Compact identity of a post author, comment author or notification sender
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "AuthorRepr")]
pub struct AuthorSummary {
	pub id: SubjectId,
	pub display_name: Option<Box<str>>,
	pub avatar: Option<Box<str>>,
}

impl AuthorSummary {
	pub fn new(id: impl Into<SubjectId>) -> Self {
		Self { id: id.into(), display_name: None, avatar: None }
	}

	pub fn with_name(id: impl Into<SubjectId>, display_name: impl Into<Box<str>>) -> Self {
		Self { id: id.into(), display_name: Some(display_name.into()), avatar: None }
	}
}

/// Authors arrive either populated (an object) or as a bare id reference
#[derive(Deserialize)]
#[serde(untagged)]
enum AuthorRepr {
	Id(SubjectId),
	Full {
		#[serde(alias = "_id")]
		id: SubjectId,
		#[serde(default, rename = "displayName", alias = "username")]
		display_name: Option<Box<str>>,
		#[serde(default, alias = "profilePic")]
		avatar: Option<Box<str>>,
	},
}

impl From<AuthorRepr> for AuthorSummary {
	fn from(repr: AuthorRepr) -> Self {
		match repr {
			AuthorRepr::Id(id) => AuthorSummary { id, display_name: None, avatar: None },
			AuthorRepr::Full { id, display_name, avatar } => {
				AuthorSummary { id, display_name, avatar }
			}
		}
	}
}

// Post //
//******//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
	#[serde(alias = "_id")]
	pub id: Box<str>,
	#[serde(alias = "user")]
	pub author: AuthorSummary,
	#[serde(default)]
	pub text: Box<str>,
}

/// A feed item
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
	#[serde(alias = "_id")]
	pub id: PostId,
	#[serde(alias = "user")]
	pub author: AuthorSummary,
	pub content: Option<Box<str>>,
	#[serde(alias = "image")]
	pub media: Option<Box<str>>,
	pub created_at: Option<Timestamp>,
	/// Subjects who liked this post
	#[serde(default)]
	pub likes: BTreeSet<SubjectId>,
	#[serde(default)]
	pub comments: Vec<Comment>,
}

impl Post {
	pub fn new(id: impl Into<PostId>, author: AuthorSummary) -> Self {
		Self {
			id: id.into(),
			author,
			content: None,
			media: None,
			created_at: None,
			likes: BTreeSet::new(),
			comments: Vec::new(),
		}
	}

	pub fn with_content(mut self, content: impl Into<Box<str>>) -> Self {
		self.content = Some(content.into());
		self
	}

	pub fn author_id(&self) -> &SubjectId {
		&self.author.id
	}

	pub fn is_liked_by(&self, subject: &SubjectId) -> bool {
		self.likes.contains(subject)
	}

	pub fn like_count(&self) -> usize {
		self.likes.len()
	}

	/// Check the fields a pushed item must carry to be reconciled
	pub fn validate(&self) -> ClResult<()> {
		if self.id.as_str().is_empty() {
			return Err(Error::MalformedEvent("post without id".into()));
		}
		if self.author.id.as_str().is_empty() {
			return Err(Error::MalformedEvent(format!("post {} without author", self.id)));
		}
		Ok(())
	}
}

/// Content of a post to be created
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
	pub content: Option<Box<str>>,
	#[serde(alias = "image")]
	pub media: Option<Box<str>>,
}

/// Edit of an existing post
///
/// `media: Patch::Null` removes the attached media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPatch {
	#[serde(default, skip_serializing_if = "Patch::is_undefined")]
	pub content: Patch<Box<str>>,
	#[serde(default, skip_serializing_if = "Patch::is_undefined")]
	pub media: Patch<Box<str>>,
}

impl PostPatch {
	pub fn apply(self, post: &mut Post) {
		self.content.apply_to(&mut post.content);
		self.media.apply_to(&mut post.media);
	}
}

// Notification //
//**************//

/// A notification pushed to the subject's private room
///
/// The id is optional on the wire; the aggregator assigns a fallback key to
/// notifications that lack one.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
	#[serde(default, alias = "_id")]
	pub id: Option<Box<str>>,
	pub sender: Option<AuthorSummary>,
	#[serde(default)]
	pub message: Box<str>,
	pub created_at: Option<Timestamp>,
}

impl Notification {
	pub fn new(id: impl Into<Box<str>>, message: impl Into<Box<str>>) -> Self {
		Self { id: Some(id.into()), sender: None, message: message.into(), created_at: None }
	}

	/// Display name of the sender, "Someone" when unknown
	pub fn sender_name(&self) -> &str {
		self.sender.as_ref().and_then(|s| s.display_name.as_deref()).unwrap_or("Someone")
	}
}

// Profile //
//*********//

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
	#[serde(alias = "_id")]
	pub id: SubjectId,
	pub username: Box<str>,
	pub bio: Option<Box<str>>,
	#[serde(alias = "profilePic")]
	pub avatar: Option<Box<str>>,
	#[serde(default)]
	pub followers: Vec<AuthorSummary>,
	#[serde(default)]
	pub following: Vec<AuthorSummary>,
}

impl Profile {
	pub fn new(id: impl Into<SubjectId>, username: impl Into<Box<str>>) -> Self {
		Self {
			id: id.into(),
			username: username.into(),
			bio: None,
			avatar: None,
			followers: Vec::new(),
			following: Vec::new(),
		}
	}

	pub fn has_follower(&self, subject: &SubjectId) -> bool {
		self.followers.iter().any(|f| &f.id == subject)
	}

	/// Add or remove `subject` from the follower list, returns true if now following
	pub fn toggle_follower(&mut self, subject: &SubjectId) -> bool {
		if self.has_follower(subject) {
			self.followers.retain(|f| &f.id != subject);
			false
		} else {
			self.followers.push(AuthorSummary::new(subject.clone()));
			true
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
	#[serde(default, skip_serializing_if = "Patch::is_undefined")]
	pub username: Patch<Box<str>>,
	#[serde(default, skip_serializing_if = "Patch::is_undefined")]
	pub bio: Patch<Box<str>>,
	#[serde(default, skip_serializing_if = "Patch::is_undefined")]
	pub avatar: Patch<Box<str>>,
}

impl ProfilePatch {
	/// Apply to a profile. The username can be changed but never cleared.
	pub fn apply(self, profile: &mut Profile) {
		if let Patch::Value(username) = self.username {
			profile.username = username;
		}
		self.bio.apply_to(&mut profile.bio);
		self.avatar.apply_to(&mut profile.avatar);
	}
}


// vim: ts=4
