//! Feed reconciliation
//!
//! Views are independent, scoped copies of the feed. Each starts Loading,
//! becomes Ready with its snapshot and from then on applies pushed events
//! and confirmed action results under the same rules:
//!
//! - created: prepend if in scope and not present
//! - updated: replace in place if present, never insert
//! - deleted: remove if present

pub mod controller;
pub mod profile;
pub mod reconciler;
pub mod view;

pub use controller::ViewController;
pub use profile::ProfileController;
pub use reconciler::{FeedReconciler, SharedView, ViewRegistration};
pub use view::{Applied, FeedView, ViewScope, ViewState};

// vim: ts=4
