//! In-memory feed backend
//!
//! Implements the pull adapters against an in-process store and publishes
//! the resulting push events through a [`MemoryBroker`], the way the real
//! server does after every mutation:
//!
//! - item events go to the global feed topic
//! - likes, comments and follows notify the affected user's room

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::broker::MemoryBroker;
use vibely_types::api_adapter::{FeedApi, ProfileApi};
use vibely_types::event::PushEvent;
use vibely_types::model::{
	AuthorSummary, Comment, Notification, Post, PostDraft, PostPatch, Profile, ProfilePatch,
};
use vibely_types::prelude::*;
use vibely_types::topic;
use vibely_types::types::now;
use vibely_types::utils::random_id;

/// Backend operations, used for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
	FetchFeed,
	FetchAuthor,
	CreatePost,
	Like,
	AddComment,
	DeleteComment,
	DeletePost,
	EditPost,
	FetchProfile,
	UpdateProfile,
	Follow,
}

#[derive(Debug, Default)]
struct Store {
	acting: Option<SubjectId>,
	users: BTreeMap<SubjectId, Profile>,
	/// Newest first
	posts: Vec<Post>,
	failures: HashSet<Op>,
	latency: Option<Duration>,
}

impl Store {
	fn actor(&self) -> ClResult<SubjectId> {
		self.acting.clone().ok_or(Error::PermissionDenied)
	}

	fn author_summary(&self, id: &SubjectId) -> AuthorSummary {
		match self.users.get(id) {
			Some(profile) => AuthorSummary {
				id: id.clone(),
				display_name: Some(profile.username.clone()),
				avatar: profile.avatar.clone(),
			},
			None => AuthorSummary::new(id.clone()),
		}
	}

	fn post_mut(&mut self, id: &PostId) -> ClResult<&mut Post> {
		self.posts.iter_mut().find(|p| &p.id == id).ok_or(Error::NotFound)
	}
}

/// A notification to publish once the store lock is released
struct Notify {
	recipient: SubjectId,
	notification: Notification,
}

#[derive(Debug)]
pub struct MemoryBackend {
	broker: Arc<MemoryBroker>,
	global_topic: Box<str>,
	store: Mutex<Store>,
}

impl MemoryBackend {
	pub fn new(broker: Arc<MemoryBroker>) -> Self {
		Self::with_global_topic(broker, topic::GLOBAL_FEED)
	}

	pub fn with_global_topic(broker: Arc<MemoryBroker>, global_topic: impl Into<Box<str>>) -> Self {
		Self { broker, global_topic: global_topic.into(), store: Mutex::new(Store::default()) }
	}

	pub fn broker(&self) -> &Arc<MemoryBroker> {
		&self.broker
	}

	/// Create a user account
	pub fn register_user(&self, id: impl Into<SubjectId>, username: impl Into<Box<str>>) -> Profile {
		let profile = Profile::new(id, username);
		self.store.lock().users.insert(profile.id.clone(), profile.clone());
		profile
	}

	/// Make `subject` the user issuing the adapter calls
	pub fn login(&self, subject: impl Into<SubjectId>) {
		self.store.lock().acting = Some(subject.into());
	}

	pub fn logout(&self) {
		self.store.lock().acting = None;
	}

	pub fn acting(&self) -> Option<SubjectId> {
		self.store.lock().acting.clone()
	}

	/// Store a post without publishing it
	pub fn seed_post(&self, author: impl Into<SubjectId>, content: impl Into<Box<str>>) -> Post {
		let mut store = self.store.lock();
		let author = author.into();
		let post = Post {
			created_at: Some(now()),
			..Post::new(random_id().unwrap_or_default(), store.author_summary(&author)).with_content(content)
		};
		store.posts.insert(0, post.clone());
		post
	}

	/// Store a prepared post as the newest one, without publishing it
	pub fn insert_post(&self, post: Post) {
		self.store.lock().posts.insert(0, post);
	}

	/// Make the next call of `op` fail
	pub fn fail_next(&self, op: Op) {
		self.store.lock().failures.insert(op);
	}

	/// Delay every call by `latency`
	pub fn set_latency(&self, latency: Option<Duration>) {
		self.store.lock().latency = latency;
	}

	/// Current posts, newest first
	pub fn posts(&self) -> Vec<Post> {
		self.store.lock().posts.clone()
	}

	pub fn post(&self, id: &PostId) -> Option<Post> {
		self.store.lock().posts.iter().find(|p| &p.id == id).cloned()
	}

	// Operations on behalf of an explicit user, for simulating other clients

	pub fn create_post_as(&self, actor: &SubjectId, draft: PostDraft) -> ClResult<Post> {
		let post = {
			let mut store = self.store.lock();
			if draft.content.as_deref().is_none_or(|c| c.trim().is_empty()) && draft.media.is_none() {
				return Err(Error::ValidationError("post has neither content nor media".into()));
			}
			let post = Post {
				id: random_id()?.into(),
				author: store.author_summary(actor),
				content: draft.content,
				media: draft.media,
				created_at: Some(now()),
				likes: Default::default(),
				comments: Vec::new(),
			};
			store.posts.insert(0, post.clone());
			post
		};

		info!(post = %post.id, author = %actor, "Post created");
		self.publish_item(&PushEvent::ItemCreated(post.clone()));
		Ok(post)
	}

	pub fn like_as(&self, actor: &SubjectId, id: &PostId) -> ClResult<Post> {
		let (post, notify) = {
			let mut store = self.store.lock();
			let sender = store.author_summary(actor);
			let post = store.post_mut(id)?;
			let liked = if post.likes.remove(actor) {
				false
			} else {
				post.likes.insert(actor.clone());
				true
			};
			let notify = (liked && post.author_id() != actor).then(|| Notify {
				recipient: post.author_id().clone(),
				notification: notification(sender, "liked your post"),
			});
			(post.clone(), notify)
		};

		self.publish_item(&PushEvent::ItemUpdated(post.clone()));
		self.notify(notify);
		Ok(post)
	}

	pub fn comment_as(&self, actor: &SubjectId, id: &PostId, text: &str) -> ClResult<Post> {
		let text = text.trim();
		if text.is_empty() {
			return Err(Error::ValidationError("comment text is empty".into()));
		}

		let (post, notify) = {
			let mut store = self.store.lock();
			let author = store.author_summary(actor);
			let post = store.post_mut(id)?;
			post.comments.push(Comment {
				id: random_id()?.into(),
				author: author.clone(),
				text: text.into(),
			});
			let notify = (post.author_id() != actor).then(|| Notify {
				recipient: post.author_id().clone(),
				notification: notification(author, "commented on your post"),
			});
			(post.clone(), notify)
		};

		self.publish_item(&PushEvent::ItemUpdated(post.clone()));
		self.notify(notify);
		Ok(post)
	}

	pub fn follow_as(&self, actor: &SubjectId, id: &SubjectId) -> ClResult<bool> {
		if actor == id {
			return Err(Error::ValidationError("can not follow yourself".into()));
		}

		let (following, notify) = {
			let mut store = self.store.lock();
			let sender = store.author_summary(actor);
			let target_summary = store.author_summary(id);
			let target = store.users.get_mut(id).ok_or(Error::NotFound)?;
			let following = target.toggle_follower(actor);
			if let Some(profile) = target.followers.iter_mut().find(|f| &f.id == actor) {
				*profile = sender.clone();
			}

			if let Some(me) = store.users.get_mut(actor) {
				if following {
					me.following.push(target_summary);
				} else {
					me.following.retain(|f| &f.id != id);
				}
			}

			let notify = following.then(|| Notify {
				recipient: id.clone(),
				notification: notification(sender, "started following you"),
			});
			(following, notify)
		};

		info!(actor = %actor, target = %id, following, "Follow toggled");
		self.notify(notify);
		Ok(following)
	}

	async fn gate(&self, op: Op) -> ClResult<()> {
		let latency = {
			let mut store = self.store.lock();
			if store.failures.remove(&op) {
				warn!(op = ?op, "Injected failure");
				return Err(Error::Internal(format!("injected failure: {:?}", op)));
			}
			store.latency
		};
		if let Some(latency) = latency {
			tokio::time::sleep(latency).await;
		}
		Ok(())
	}

	fn publish_item(&self, event: &PushEvent) {
		if let Err(e) = self.broker.publish_event(&self.global_topic, event) {
			warn!(error = %e, "Failed to publish feed event");
		}
	}

	fn notify(&self, notify: Option<Notify>) {
		let Some(Notify { recipient, notification }) = notify else {
			return;
		};
		let room = topic::room(&recipient);
		if let Err(e) = self.broker.publish_event(&room, &PushEvent::Notification(notification)) {
			warn!(room = %room, error = %e, "Failed to publish notification");
		}
	}
}

fn notification(sender: AuthorSummary, action: &str) -> Notification {
	let name = sender.display_name.as_deref().unwrap_or("Someone");
	Notification {
		id: random_id().ok().map(Into::into),
		message: format!("{} {}", name, action).into(),
		sender: Some(sender),
		created_at: Some(now()),
	}
}

#[async_trait]
impl FeedApi for MemoryBackend {
	async fn fetch_feed_snapshot(&self) -> ClResult<Vec<Post>> {
		self.gate(Op::FetchFeed).await?;
		Ok(self.posts())
	}

	async fn fetch_author_snapshot(&self, author: &SubjectId) -> ClResult<Vec<Post>> {
		self.gate(Op::FetchAuthor).await?;
		let store = self.store.lock();
		if !store.users.contains_key(author) {
			return Err(Error::NotFound);
		}
		Ok(store.posts.iter().filter(|p| p.author_id() == author).cloned().collect())
	}

	async fn create_post(&self, draft: PostDraft) -> ClResult<Post> {
		self.gate(Op::CreatePost).await?;
		let actor = self.store.lock().actor()?;
		self.create_post_as(&actor, draft)
	}

	async fn like_item(&self, id: &PostId) -> ClResult<Post> {
		self.gate(Op::Like).await?;
		let actor = self.store.lock().actor()?;
		self.like_as(&actor, id)
	}

	async fn add_comment(&self, id: &PostId, text: &str) -> ClResult<Post> {
		self.gate(Op::AddComment).await?;
		let actor = self.store.lock().actor()?;
		self.comment_as(&actor, id, text)
	}

	async fn delete_comment(&self, id: &PostId, comment_id: &str) -> ClResult<Post> {
		self.gate(Op::DeleteComment).await?;
		let post = {
			let mut store = self.store.lock();
			let actor = store.actor()?;
			let post = store.post_mut(id)?;
			let pos = post.comments.iter().position(|c| &*c.id == comment_id).ok_or(Error::NotFound)?;
			if post.comments[pos].author.id != actor && post.author_id() != &actor {
				return Err(Error::PermissionDenied);
			}
			post.comments.remove(pos);
			post.clone()
		};

		self.publish_item(&PushEvent::ItemUpdated(post.clone()));
		Ok(post)
	}

	async fn delete_post(&self, id: &PostId) -> ClResult<()> {
		self.gate(Op::DeletePost).await?;
		{
			let mut store = self.store.lock();
			let actor = store.actor()?;
			let pos = store.posts.iter().position(|p| &p.id == id).ok_or(Error::NotFound)?;
			if store.posts[pos].author_id() != &actor {
				return Err(Error::PermissionDenied);
			}
			store.posts.remove(pos);
		}

		info!(post = %id, "Post deleted");
		self.publish_item(&PushEvent::ItemDeleted { id: id.clone() });
		Ok(())
	}

	async fn edit_post(&self, id: &PostId, patch: PostPatch) -> ClResult<Post> {
		self.gate(Op::EditPost).await?;
		let post = {
			let mut store = self.store.lock();
			let actor = store.actor()?;
			let post = store.post_mut(id)?;
			if post.author_id() != &actor {
				return Err(Error::PermissionDenied);
			}
			patch.apply(post);
			post.clone()
		};

		self.publish_item(&PushEvent::ItemUpdated(post.clone()));
		Ok(post)
	}
}

#[async_trait]
impl ProfileApi for MemoryBackend {
	async fn fetch_profile(&self, id: &SubjectId) -> ClResult<Profile> {
		self.gate(Op::FetchProfile).await?;
		self.store.lock().users.get(id).cloned().ok_or(Error::NotFound)
	}

	async fn update_profile(&self, patch: ProfilePatch) -> ClResult<Profile> {
		self.gate(Op::UpdateProfile).await?;
		let mut store = self.store.lock();
		let actor = store.actor()?;
		let profile = store.users.get_mut(&actor).ok_or(Error::NotFound)?;
		patch.apply(profile);
		let profile = profile.clone();

		// Keep the embedded author summaries in step
		let summary = store.author_summary(&actor);
		for post in store.posts.iter_mut().filter(|p| p.author_id() == &actor) {
			post.author = summary.clone();
		}
		Ok(profile)
	}

	async fn follow_user(&self, id: &SubjectId) -> ClResult<()> {
		self.gate(Op::Follow).await?;
		let actor = self.store.lock().actor()?;
		self.follow_as(&actor, id).map(|_| ())
	}
}


// vim: ts=4
