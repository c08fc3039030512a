//! View Controller
//!
//! Owns one scoped view: loads its snapshot, runs user actions against the
//! pull backend and applies their authoritative results. Nothing is applied
//! speculatively; a failed action leaves the view as it was.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::reconciler::{FeedReconciler, SharedView, ViewRegistration};
use super::view::{Applied, FeedView, ViewScope, ViewState};
use crate::prelude::*;
use vibely_types::api_adapter::FeedApi;
use vibely_types::model::{Post, PostDraft, PostPatch};

#[derive(Debug)]
pub struct ViewController {
	scope: ViewScope,
	view: Arc<SharedView>,
	api: Arc<dyn FeedApi>,
	registration: Mutex<Option<ViewRegistration>>,
	cancel: CancellationToken,
}

impl ViewController {
	/// Open a view and register it with the reconciler
	///
	/// The view starts in Loading; call [`ViewController::load`] to fetch its
	/// snapshot.
	pub fn new(scope: ViewScope, api: Arc<dyn FeedApi>, reconciler: &FeedReconciler) -> Self {
		let view = SharedView::new(scope.clone());
		let registration = reconciler.register(view.clone());
		debug!(scope = %scope, "View opened");
		Self {
			scope,
			view,
			api,
			registration: Mutex::new(Some(registration)),
			cancel: CancellationToken::new(),
		}
	}

	/// Fetch the snapshot and become Ready
	///
	/// Events pushed while loading are dropped, the snapshot is the
	/// baseline. If another load was started meanwhile, this one completes
	/// without touching the view.
	pub async fn load(&self) -> ClResult<()> {
		self.load_with(async { Ok(()) }, |()| ()).await.map(|_| ())
	}

	/// Load the snapshot together with `side`, failing the view if either fails
	///
	/// `install` receives the result of `side` under the view lock, only if
	/// this load completed the view. Returns whether it did.
	pub(super) async fn load_with<T, F>(&self, side: F, install: impl FnOnce(T)) -> ClResult<bool>
	where
		F: Future<Output = ClResult<T>>,
	{
		if self.is_closed() {
			return Err(Error::Cancelled);
		}
		let seq = self.view.update(FeedView::begin_load);
		debug!(scope = %self.scope, seq, "Loading view");

		let snapshot = match &self.scope {
			ViewScope::Global => self.api.fetch_feed_snapshot(),
			ViewScope::Author(author) => self.api.fetch_author_snapshot(author),
		};

		match self.guarded(futures::future::try_join(snapshot, side)).await {
			Ok((items, extra)) => {
				let count = items.len();
				let completed = self.commit(|view| {
					let completed = view.complete_load(seq, items);
					if completed {
						install(extra);
					}
					completed
				})?;
				if completed {
					info!(scope = %self.scope, seq, count, "View loaded");
				} else {
					debug!(scope = %self.scope, seq, "Discarding superseded snapshot");
				}
				Ok(completed)
			}
			Err(Error::Cancelled) => Err(Error::Cancelled),
			Err(err) => {
				let err = err.into_snapshot_failed();
				let reason = match &err {
					Error::SnapshotLoadFailed(msg) => msg.clone(),
					other => other.to_string(),
				};
				if self.commit(|view| view.fail_load(seq, reason))? {
					warn!(scope = %self.scope, seq, error = %err, "View load failed");
					Err(err)
				} else {
					debug!(scope = %self.scope, seq, error = %err, "Discarding superseded load failure");
					Ok(false)
				}
			}
		}
	}

	/// Toggle the current subject's like
	pub async fn like(&self, id: &PostId) -> ClResult<Post> {
		self.ensure_ready()?;
		let post = self.remote("like", self.api.like_item(id)).await?;
		self.apply_result("like", |view| view.apply_updated(post.clone()))?;
		Ok(post)
	}

	pub async fn add_comment(&self, id: &PostId, text: &str) -> ClResult<Post> {
		self.ensure_ready()?;
		let text = text.trim();
		if text.is_empty() {
			return Err(Error::ValidationError("comment text is empty".into()));
		}
		let post = self.remote("add_comment", self.api.add_comment(id, text)).await?;
		self.apply_result("add_comment", |view| view.apply_updated(post.clone()))?;
		Ok(post)
	}

	pub async fn delete_comment(&self, id: &PostId, comment_id: &str) -> ClResult<Post> {
		self.ensure_ready()?;
		let post = self.remote("delete_comment", self.api.delete_comment(id, comment_id)).await?;
		self.apply_result("delete_comment", |view| view.apply_updated(post.clone()))?;
		Ok(post)
	}

	pub async fn edit_post(&self, id: &PostId, patch: PostPatch) -> ClResult<Post> {
		self.ensure_ready()?;
		let post = self.remote("edit_post", self.api.edit_post(id, patch)).await?;
		self.apply_result("edit_post", |view| view.apply_updated(post.clone()))?;
		Ok(post)
	}

	pub async fn delete_post(&self, id: &PostId) -> ClResult<()> {
		self.ensure_ready()?;
		self.remote("delete_post", self.api.delete_post(id)).await?;
		self.apply_result("delete_post", |view| view.apply_deleted(id))?;
		Ok(())
	}

	/// Create a post; the later push echo of it is a no-op
	pub async fn create_post(&self, draft: PostDraft) -> ClResult<Post> {
		self.ensure_ready()?;
		if draft.content.as_deref().is_none_or(|c| c.trim().is_empty()) && draft.media.is_none() {
			return Err(Error::ValidationError("post has neither content nor media".into()));
		}
		let post = self.remote("create_post", self.api.create_post(draft)).await?;
		self.apply_result("create_post", |view| view.apply_created(post.clone()))?;
		Ok(post)
	}

	/// Close the view
	///
	/// Deregisters it from the reconciler and cancels requests in flight.
	/// Responses arriving later never touch the collection.
	pub fn close(&self) {
		// Under the view lock, so neither a commit nor a pushed event lands after
		self.view.close_with(|| self.cancel.cancel());
		if self.registration.lock().take().is_some() {
			debug!(scope = %self.scope, "View closed");
		}
	}

	pub fn is_closed(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub fn scope(&self) -> &ViewScope {
		&self.scope
	}

	pub fn state(&self) -> ViewState {
		self.view.with(|view| view.state().clone())
	}

	pub fn is_ready(&self) -> bool {
		self.view.with(FeedView::is_ready)
	}

	pub fn items(&self) -> Vec<Post> {
		self.view.with(|view| view.items().to_vec())
	}

	pub fn get(&self, id: &PostId) -> Option<Post> {
		self.view.with(|view| view.get(id).cloned())
	}

	pub fn len(&self) -> usize {
		self.view.with(FeedView::len)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Observe changes; the value is the view revision
	pub fn watch(&self) -> watch::Receiver<u64> {
		self.view.watch()
	}

	pub(super) fn ensure_ready(&self) -> ClResult<()> {
		if self.is_closed() {
			return Err(Error::Cancelled);
		}
		if !self.is_ready() {
			return Err(Error::NotReady);
		}
		Ok(())
	}

	/// Run `fut` unless the view gets closed first
	pub(super) async fn guarded<T>(&self, fut: impl Future<Output = ClResult<T>>) -> ClResult<T> {
		tokio::select! {
			biased;
			() = self.cancel.cancelled() => Err(Error::Cancelled),
			res = fut => res,
		}
	}

	pub(super) async fn remote<T>(
		&self,
		action: &str,
		fut: impl Future<Output = ClResult<T>>,
	) -> ClResult<T> {
		self.guarded(fut).await.map_err(|err| {
			let err = err.into_action_failed();
			warn!(scope = %self.scope, action, error = %err, "Action failed");
			err
		})
	}

	/// Mutate the view unless it was closed
	pub(super) fn commit<R>(&self, f: impl FnOnce(&mut FeedView) -> R) -> ClResult<R> {
		self.view.update(|view| {
			if self.cancel.is_cancelled() {
				return Err(Error::Cancelled);
			}
			Ok(f(view))
		})
	}

	fn apply_result(&self, action: &str, f: impl FnOnce(&mut FeedView) -> Applied) -> ClResult<()> {
		let applied = self.commit(f)?;
		if applied == Applied::NotReady {
			debug!(scope = %self.scope, action, "View reloading, action result left to the snapshot");
		}
		Ok(())
	}
}

impl Drop for ViewController {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}


// vim: ts=4
