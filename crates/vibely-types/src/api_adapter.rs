//! Adapters for the pull (request/response) backend.
//!
//! Every call is a round trip against the authoritative server. Mutating
//! calls return the complete, server-side state of the affected item, which
//! the views use verbatim.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::model::{Post, PostDraft, PostPatch, Profile, ProfilePatch};
use crate::prelude::*;

#[async_trait]
pub trait FeedApi: Debug + Send + Sync {
	/// Global feed, newest first
	async fn fetch_feed_snapshot(&self) -> ClResult<Vec<Post>>;

	/// Posts of one author, newest first
	async fn fetch_author_snapshot(&self, author: &SubjectId) -> ClResult<Vec<Post>>;

	async fn create_post(&self, draft: PostDraft) -> ClResult<Post>;

	/// Toggle the current subject's like on a post
	async fn like_item(&self, id: &PostId) -> ClResult<Post>;

	async fn add_comment(&self, id: &PostId, text: &str) -> ClResult<Post>;

	async fn delete_comment(&self, id: &PostId, comment_id: &str) -> ClResult<Post>;

	async fn delete_post(&self, id: &PostId) -> ClResult<()>;

	async fn edit_post(&self, id: &PostId, patch: PostPatch) -> ClResult<Post>;
}

#[async_trait]
pub trait ProfileApi: Debug + Send + Sync {
	async fn fetch_profile(&self, id: &SubjectId) -> ClResult<Profile>;

	/// Update the current subject's own profile
	async fn update_profile(&self, patch: ProfilePatch) -> ClResult<Profile>;

	/// Toggle following `id`
	async fn follow_user(&self, id: &SubjectId) -> ClResult<()>;
}

// vim: ts=4
