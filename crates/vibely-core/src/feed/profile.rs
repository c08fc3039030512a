//! Profile Controller
//!
//! An author-scoped view plus the author's profile record. Both are loaded
//! together; the view is Ready only if both arrived.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

use super::controller::ViewController;
use super::reconciler::FeedReconciler;
use super::view::{ViewScope, ViewState};
use crate::prelude::*;
use vibely_types::api_adapter::{FeedApi, ProfileApi};
use vibely_types::model::{Post, Profile, ProfilePatch};

#[derive(Debug)]
pub struct ProfileController {
	author: SubjectId,
	posts: ViewController,
	profiles: Arc<dyn ProfileApi>,
	profile: Mutex<Option<Profile>>,
}

impl ProfileController {
	pub fn new(
		author: SubjectId,
		feed: Arc<dyn FeedApi>,
		profiles: Arc<dyn ProfileApi>,
		reconciler: &FeedReconciler,
	) -> Self {
		let posts = ViewController::new(ViewScope::Author(author.clone()), feed, reconciler);
		Self { author, posts, profiles, profile: Mutex::new(None) }
	}

	/// Load the profile record and the author's posts concurrently
	pub async fn load(&self) -> ClResult<()> {
		let fetch = self.profiles.fetch_profile(&self.author);
		self.posts.load_with(fetch, |profile| *self.profile.lock() = Some(profile)).await?;
		Ok(())
	}

	/// Toggle following this author as `viewer`
	///
	/// Returns whether `viewer` follows the author afterwards. The follower
	/// list is updated locally once the server confirmed, no event echoes it.
	pub async fn follow(&self, viewer: &SubjectId) -> ClResult<bool> {
		self.ensure_loaded()?;
		if self.is_own_profile(viewer) {
			return Err(Error::ValidationError("can not follow yourself".into()));
		}

		self.posts.remote("follow", self.profiles.follow_user(&self.author)).await?;

		let following = self.posts.commit(|_| {
			let mut profile = self.profile.lock();
			profile.as_mut().map(|profile| profile.toggle_follower(viewer)).ok_or(Error::NotReady)
		})??;
		info!(author = %self.author, viewer = %viewer, following, "Follow toggled");
		Ok(following)
	}

	/// Update the viewer's own profile, returns the stored record
	pub async fn update_profile(&self, viewer: &SubjectId, patch: ProfilePatch) -> ClResult<Profile> {
		self.ensure_loaded()?;
		if !self.is_own_profile(viewer) {
			return Err(Error::PermissionDenied);
		}
		if let Patch::Value(username) = &patch.username {
			if username.trim().is_empty() {
				return Err(Error::ValidationError("username is empty".into()));
			}
		}

		let updated = self.posts.remote("update_profile", self.profiles.update_profile(patch)).await?;
		self.posts.commit(|_| *self.profile.lock() = Some(updated.clone()))?;
		Ok(updated)
	}

	pub fn author(&self) -> &SubjectId {
		&self.author
	}

	pub fn profile(&self) -> Option<Profile> {
		self.profile.lock().clone()
	}

	pub fn is_own_profile(&self, viewer: &SubjectId) -> bool {
		&self.author == viewer
	}

	pub fn is_following(&self, viewer: &SubjectId) -> bool {
		self.profile.lock().as_ref().is_some_and(|p| p.has_follower(viewer))
	}

	pub fn follower_count(&self) -> usize {
		self.profile.lock().as_ref().map_or(0, |p| p.followers.len())
	}

	pub fn post_count(&self) -> usize {
		self.posts.len()
	}

	/// The author-scoped view of posts
	pub fn posts(&self) -> &ViewController {
		&self.posts
	}

	pub fn items(&self) -> Vec<Post> {
		self.posts.items()
	}

	pub fn state(&self) -> ViewState {
		self.posts.state()
	}

	pub fn watch(&self) -> watch::Receiver<u64> {
		self.posts.watch()
	}

	pub fn close(&self) {
		self.posts.close();
	}

	fn ensure_loaded(&self) -> ClResult<()> {
		self.posts.ensure_ready()?;
		if self.profile.lock().is_none() {
			return Err(Error::NotReady);
		}
		Ok(())
	}
}


// vim: ts=4
