//! Feed Reconciler
//!
//! Fans `item-*` events of the channel out to every open view. Each view
//! applies each event independently; views share no mutable state.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

use super::view::{Applied, FeedView, ViewScope};
use crate::channel::{ChannelHandle, Subscription};
use crate::prelude::*;
use vibely_types::event::{EventKind, PushEvent};

/// A view shared between its controller and the reconciler
#[derive(Debug)]
pub struct SharedView {
	view: Mutex<FeedView>,
	changes: watch::Sender<u64>,
	/// Set under the view lock, pushed events are ignored afterwards
	closed: AtomicBool,
}

impl SharedView {
	pub fn new(scope: ViewScope) -> Arc<Self> {
		let (changes, _) = watch::channel(0);
		Arc::new(Self {
			view: Mutex::new(FeedView::new(scope)),
			changes,
			closed: AtomicBool::new(false),
		})
	}

	/// Read the view
	pub fn with<R>(&self, f: impl FnOnce(&FeedView) -> R) -> R {
		f(&*self.view.lock())
	}

	/// Mutate the view, notifying watchers if it changed
	pub fn update<R>(&self, f: impl FnOnce(&mut FeedView) -> R) -> R {
		let (res, revision, changed) = {
			let mut view = self.view.lock();
			let before = view.revision();
			let res = f(&mut *view);
			(res, view.revision(), view.revision() != before)
		};
		if changed {
			self.changes.send_replace(revision);
		}
		res
	}

	pub fn apply(&self, event: &PushEvent) -> Applied {
		self.update(|view| if self.is_closed() { Applied::Ignored } else { view.apply(event) })
	}

	/// Stop accepting pushed events, running `on_close` under the view lock
	pub fn close_with(&self, on_close: impl FnOnce()) {
		let _view = self.view.lock();
		self.closed.store(true, Ordering::Release);
		on_close();
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Observe changes; the value is the view revision
	pub fn watch(&self) -> watch::Receiver<u64> {
		self.changes.subscribe()
	}
}

#[derive(Debug, Default)]
struct ViewRegistry {
	next_id: AtomicU64,
	views: RwLock<HashMap<u64, Arc<SharedView>>>,
}

impl ViewRegistry {
	fn apply(&self, event: &PushEvent) -> usize {
		let views: Vec<Arc<SharedView>> = self.views.read().values().cloned().collect();
		let mut changed = 0;
		for view in views {
			match view.apply(event) {
				Applied::NotReady => {
					debug!(kind = %event.kind(), scope = %view.with(|v| v.scope().clone()), "Event dropped, view not ready");
				}
				applied if applied.changed() => changed += 1,
				_ => {}
			}
		}
		changed
	}
}

/// Keeps a view registered while alive
#[must_use = "dropping a ViewRegistration deregisters the view"]
#[derive(Debug)]
pub struct ViewRegistration {
	registry: Weak<ViewRegistry>,
	id: u64,
}

impl Drop for ViewRegistration {
	fn drop(&mut self) {
		if let Some(registry) = self.registry.upgrade() {
			registry.views.write().remove(&self.id);
		}
	}
}

#[derive(Debug, Default)]
pub struct FeedReconciler {
	views: Arc<ViewRegistry>,
	subscriptions: Mutex<Vec<Subscription>>,
}

impl FeedReconciler {
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a reconciler listening to the feed events of `channel`
	pub fn attached(channel: &ChannelHandle) -> Self {
		let reconciler = Self::new();
		reconciler.attach(channel);
		reconciler
	}

	/// Listen to the feed events of a channel
	pub fn attach(&self, channel: &ChannelHandle) {
		let mut subscriptions = self.subscriptions.lock();
		for kind in [EventKind::ItemCreated, EventKind::ItemUpdated, EventKind::ItemDeleted] {
			let views = Arc::downgrade(&self.views);
			subscriptions.push(channel.on(kind, move |event| {
				if let Some(views) = views.upgrade() {
					views.apply(event);
				}
			}));
		}
	}

	/// Stop listening to every attached channel
	pub fn detach(&self) {
		self.subscriptions.lock().clear();
	}

	pub fn register(&self, view: Arc<SharedView>) -> ViewRegistration {
		let id = self.views.next_id.fetch_add(1, Ordering::Relaxed);
		self.views.views.write().insert(id, view);
		ViewRegistration { registry: Arc::downgrade(&self.views), id }
	}

	/// Apply an event to every registered view, returns the number of views changed
	pub fn apply(&self, event: &PushEvent) -> usize {
		self.views.apply(event)
	}

	pub fn view_count(&self) -> usize {
		self.views.views.read().len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use vibely_types::model::{AuthorSummary, Post};

	fn post(id: &str, author: &str) -> Post {
		Post::new(id, AuthorSummary::new(author))
	}

	fn ready_view(scope: ViewScope, items: Vec<Post>) -> Arc<SharedView> {
		let view = SharedView::new(scope);
		view.update(|v| {
			let seq = v.begin_load();
			v.complete_load(seq, items)
		});
		view
	}

	fn ids(view: &SharedView) -> Vec<String> {
		view.with(|v| v.items().iter().map(|p| p.id.to_string()).collect())
	}

	#[test]
	fn test_views_apply_independently() {
		let reconciler = FeedReconciler::new();
		let global = ready_view(ViewScope::Global, vec![post("p1", "u1")]);
		let author = ready_view(ViewScope::Author("u2".into()), vec![]);
		let _g = reconciler.register(global.clone());
		let _a = reconciler.register(author.clone());

		assert_eq!(reconciler.apply(&PushEvent::ItemCreated(post("p2", "u1"))), 1);
		assert_eq!(reconciler.apply(&PushEvent::ItemCreated(post("p3", "u2"))), 2);

		assert_eq!(ids(&global), vec!["p3", "p2", "p1"]);
		assert_eq!(ids(&author), vec!["p3"]);
	}

	#[test]
	fn test_dropping_registration_deregisters() {
		let reconciler = FeedReconciler::new();
		let view = ready_view(ViewScope::Global, vec![]);
		let registration = reconciler.register(view.clone());
		assert_eq!(reconciler.view_count(), 1);

		drop(registration);
		assert_eq!(reconciler.view_count(), 0);
		assert_eq!(reconciler.apply(&PushEvent::ItemCreated(post("p1", "u1"))), 0);
		assert!(ids(&view).is_empty());
	}

	#[test]
	fn test_closed_view_ignores_events_while_still_registered() {
		let reconciler = FeedReconciler::new();
		let view = ready_view(ViewScope::Global, vec![post("p1", "u1")]);
		let _registration = reconciler.register(view.clone());

		view.close_with(|| ());
		assert!(view.is_closed());
		assert_eq!(reconciler.view_count(), 1);

		assert_eq!(reconciler.apply(&PushEvent::ItemCreated(post("p2", "u1"))), 0);
		assert_eq!(reconciler.apply(&PushEvent::ItemDeleted { id: "p1".into() }), 0);
		assert_eq!(ids(&view), vec!["p1"]);
	}

	#[test]
	fn test_watch_sees_changes_only() {
		let view = ready_view(ViewScope::Global, vec![post("p1", "u1")]);
		let rx = view.watch();
		let before = *rx.borrow();

		view.apply(&PushEvent::ItemDeleted { id: "p9".into() });
		assert_eq!(*rx.borrow(), before);

		view.apply(&PushEvent::ItemDeleted { id: "p1".into() });
		assert!(*rx.borrow() > before);
	}
}

// vim: ts=4
