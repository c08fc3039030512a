//! Scoped view state and the reconciliation rules
//!
//! A [`FeedView`] is plain data: it knows nothing about channels or remote
//! calls. The same rules apply to pushed events and to the authoritative
//! results of local actions.

use std::collections::HashSet;

use crate::prelude::*;
use vibely_types::event::PushEvent;
use vibely_types::model::Post;

/// Which items a view shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewScope {
	/// The global feed
	Global,
	/// Posts of one author
	Author(SubjectId),
}

impl ViewScope {
	pub fn accepts(&self, post: &Post) -> bool {
		match self {
			ViewScope::Global => true,
			ViewScope::Author(author) => post.author_id() == author,
		}
	}
}

impl std::fmt::Display for ViewScope {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ViewScope::Global => f.write_str("global"),
			ViewScope::Author(author) => write!(f, "author:{}", author),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
	Loading,
	Ready,
	Failed(String),
}

/// Outcome of applying an event to a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
	Inserted,
	Replaced,
	Removed,
	/// The rule says nothing changes
	Ignored,
	/// The view is not Ready, the event was dropped
	NotReady,
}

impl Applied {
	pub fn changed(self) -> bool {
		matches!(self, Applied::Inserted | Applied::Replaced | Applied::Removed)
	}
}

#[derive(Debug, Clone)]
pub struct FeedView {
	scope: ViewScope,
	state: ViewState,
	items: Vec<Post>,
	load_seq: u64,
	revision: u64,
}

impl FeedView {
	pub fn new(scope: ViewScope) -> Self {
		Self { scope, state: ViewState::Loading, items: Vec::new(), load_seq: 0, revision: 0 }
	}

	pub fn scope(&self) -> &ViewScope {
		&self.scope
	}

	pub fn state(&self) -> &ViewState {
		&self.state
	}

	pub fn is_ready(&self) -> bool {
		self.state == ViewState::Ready
	}

	pub fn items(&self) -> &[Post] {
		&self.items
	}

	pub fn get(&self, id: &PostId) -> Option<&Post> {
		self.items.iter().find(|p| &p.id == id)
	}

	pub fn contains(&self, id: &PostId) -> bool {
		self.position(id).is_some()
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Incremented on every change of state or items
	pub fn revision(&self) -> u64 {
		self.revision
	}

	/// Enter Loading and return the sequence number of the new load
	pub fn begin_load(&mut self) -> u64 {
		self.load_seq += 1;
		self.state = ViewState::Loading;
		self.touch();
		self.load_seq
	}

	pub fn is_current_load(&self, seq: u64) -> bool {
		seq == self.load_seq
	}

	/// Replace the items with a snapshot and become Ready
	///
	/// Returns false, changing nothing, if a newer load was started since.
	pub fn complete_load(&mut self, seq: u64, snapshot: Vec<Post>) -> bool {
		if !self.is_current_load(seq) {
			return false;
		}

		let mut seen = HashSet::new();
		let total = snapshot.len();
		self.items = snapshot
			.into_iter()
			.filter(|post| self.scope.accepts(post))
			.filter(|post| seen.insert(post.id.clone()))
			.collect();
		if self.items.len() != total {
			debug!(scope = %self.scope, dropped = total - self.items.len(), "Snapshot items filtered");
		}

		self.state = ViewState::Ready;
		self.touch();
		true
	}

	/// Enter Failed, keeping whatever items were shown before
	pub fn fail_load(&mut self, seq: u64, reason: impl Into<String>) -> bool {
		if !self.is_current_load(seq) {
			return false;
		}
		self.state = ViewState::Failed(reason.into());
		self.touch();
		true
	}

	pub fn apply(&mut self, event: &PushEvent) -> Applied {
		match event {
			PushEvent::ItemCreated(post) => self.apply_created(post.clone()),
			PushEvent::ItemUpdated(post) => self.apply_updated(post.clone()),
			PushEvent::ItemDeleted { id } => self.apply_deleted(id),
			PushEvent::Notification(_) => Applied::Ignored,
		}
	}

	/// Prepend if in scope and not present
	pub fn apply_created(&mut self, post: Post) -> Applied {
		if !self.is_ready() {
			return Applied::NotReady;
		}
		if !self.scope.accepts(&post) || self.contains(&post.id) {
			return Applied::Ignored;
		}
		self.items.insert(0, post);
		self.touch();
		Applied::Inserted
	}

	/// Replace in place if present, never inserts
	pub fn apply_updated(&mut self, post: Post) -> Applied {
		if !self.is_ready() {
			return Applied::NotReady;
		}
		match self.position(&post.id) {
			Some(pos) => {
				self.items[pos] = post;
				self.touch();
				Applied::Replaced
			}
			None => Applied::Ignored,
		}
	}

	/// Remove if present
	pub fn apply_deleted(&mut self, id: &PostId) -> Applied {
		if !self.is_ready() {
			return Applied::NotReady;
		}
		match self.position(id) {
			Some(pos) => {
				self.items.remove(pos);
				self.touch();
				Applied::Removed
			}
			None => Applied::Ignored,
		}
	}

	fn position(&self, id: &PostId) -> Option<usize> {
		self.items.iter().position(|p| &p.id == id)
	}

	fn touch(&mut self) {
		self.revision += 1;
	}
}


// vim: ts=4
