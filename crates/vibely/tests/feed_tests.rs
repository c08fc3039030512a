//! Feed view reconciliation tests against the in-memory broker and backend

mod common;

use serde_json::json;
use std::time::Duration;

use common::{ids, post, setup, wait_until};
use vibely::error::Error;
use vibely::event::{ChannelMessage, PushEvent};
use vibely::model::{PostDraft, PostPatch};
use vibely::types::{Patch, PostId};
use vibely::ViewState;
use vibely_memory_backend::Op;

fn publish(env: &common::TestEnv, event: PushEvent) {
	env.broker.publish_event("feed", &event).expect("publish event");
}

/// Publish a marker item and wait for `view` to show it, so that every
/// earlier event has been delivered
async fn sync_view(env: &common::TestEnv, view: &vibely::ViewController, marker: &str) {
	publish(env, PushEvent::ItemCreated(post(marker, "u3")));
	let id = PostId::from(marker);
	wait_until(marker, || view.get(&id).is_some()).await;
}

#[tokio::test]
async fn test_reconciliation_scenario() {
	let env = setup();
	env.backend.insert_post(post("2", "u2"));
	env.backend.insert_post(post("1", "u2"));
	env.client.login("u1").await;

	let view = env.client.open_feed();
	view.load().await.expect("load");
	assert_eq!(ids(&view.items()), vec!["1", "2"]);

	publish(&env, PushEvent::ItemCreated(post("3", "u2")));
	wait_until("created", || view.len() == 3).await;
	assert_eq!(ids(&view.items()), vec!["3", "1", "2"]);

	publish(&env, PushEvent::ItemUpdated(post("1", "u2").with_content("x")));
	wait_until("updated", || view.get(&"1".into()).and_then(|p| p.content).as_deref() == Some("x")).await;
	assert_eq!(ids(&view.items()), vec!["3", "1", "2"]);

	publish(&env, PushEvent::ItemDeleted { id: "2".into() });
	wait_until("deleted", || view.len() == 2).await;
	assert_eq!(ids(&view.items()), vec!["3", "1"]);
	assert_eq!(view.items()[1].content.as_deref(), Some("x"));
}

#[tokio::test]
async fn test_idempotent_create_update_without_create_delete_absent() {
	let env = setup();
	env.client.login("u1").await;
	let view = env.client.open_feed();
	view.load().await.expect("load");
	assert!(view.is_empty());

	publish(&env, PushEvent::ItemCreated(post("p1", "u2")));
	publish(&env, PushEvent::ItemCreated(post("p1", "u2")));
	publish(&env, PushEvent::ItemUpdated(post("p9", "u2")));
	publish(&env, PushEvent::ItemDeleted { id: "p8".into() });
	sync_view(&env, &view, "marker").await;

	assert_eq!(ids(&view.items()), vec!["marker", "p1"]);
}

#[tokio::test]
async fn test_scope_filtering() {
	let env = setup();
	env.client.login("u1").await;
	let feed = env.client.open_feed();
	let author = env.client.open_author("u2");
	feed.load().await.expect("load feed");
	author.load().await.expect("load author");

	publish(&env, PushEvent::ItemCreated(post("by-u3", "u3")));
	publish(&env, PushEvent::ItemCreated(post("by-u2", "u2")));
	wait_until("feed has both", || feed.len() == 2).await;
	wait_until("author view has own", || author.len() == 1).await;

	assert_eq!(ids(&author.items()), vec!["by-u2"]);
	assert_eq!(ids(&feed.items()), vec!["by-u2", "by-u3"]);
}

#[tokio::test]
async fn test_events_dropped_while_loading() {
	let env = setup();
	env.backend.insert_post(post("p1", "u2"));
	env.backend.set_latency(Some(Duration::from_millis(100)));
	env.client.login("u1").await;
	let view = env.client.open_feed();

	let (res, ()) = tokio::join!(view.load(), async {
		tokio::time::sleep(Duration::from_millis(20)).await;
		publish(&env, PushEvent::ItemCreated(post("during-load", "u2")));
		publish(&env, PushEvent::ItemDeleted { id: "p1".into() });
	});
	res.expect("load");

	env.backend.set_latency(None);
	sync_view(&env, &view, "marker").await;
	assert_eq!(ids(&view.items()), vec!["marker", "p1"]);
}

#[tokio::test]
async fn test_malformed_event_does_not_affect_views() {
	let env = setup();
	env.client.login("u1").await;
	let view = env.client.open_feed();
	view.load().await.expect("load");

	env.broker.publish(ChannelMessage::new("feed", "item-created", json!({ "content": "no id" })));
	env.broker.publish(ChannelMessage::new("feed", "item-deleted", json!({ "id": "" })));
	env.broker.publish(ChannelMessage::new("feed", "typing", json!({})));
	sync_view(&env, &view, "marker").await;

	assert_eq!(ids(&view.items()), vec!["marker"]);
	assert!(env.client.channel().is_connected());
}

#[tokio::test]
async fn test_legacy_event_names() {
	let env = setup();
	env.client.login("u1").await;
	let view = env.client.open_feed();
	view.load().await.expect("load");

	env.broker.publish(ChannelMessage::new("feed", "new_post", json!({ "_id": "p1", "user": "u2" })));
	wait_until("legacy create", || view.len() == 1).await;

	env.broker.publish(ChannelMessage::new("feed", "post_deleted", json!({ "postId": "p1" })));
	wait_until("legacy delete", || view.is_empty()).await;
}

#[tokio::test]
async fn test_like_applies_result_and_echo() {
	let env = setup();
	env.client.login("u1").await;
	env.backend.login("u1");
	let seeded = env.backend.seed_post("u2", "hello");
	let view = env.client.open_feed();
	view.load().await.expect("load");

	let liked = view.like(&seeded.id).await.expect("like");
	assert!(liked.is_liked_by(&"u1".into()));
	assert_eq!(view.get(&seeded.id), Some(liked.clone()));

	// The push echo replaces with the same state
	sync_view(&env, &view, "marker").await;
	assert_eq!(view.get(&seeded.id), Some(liked));
	assert_eq!(view.len(), 2);
}

#[tokio::test]
async fn test_create_post_once_despite_echo() {
	let env = setup();
	env.client.login("u1").await;
	env.backend.login("u1");
	let view = env.client.open_feed();
	view.load().await.expect("load");

	let draft = PostDraft { content: Some("mine".into()), media: None };
	let created = view.create_post(draft).await.expect("create");
	assert_eq!(view.items()[0].id, created.id);

	sync_view(&env, &view, "marker").await;
	let count = view.items().iter().filter(|p| p.id == created.id).count();
	assert_eq!(count, 1);
}

#[tokio::test]
async fn test_comment_edit_and_delete_actions() {
	let env = setup();
	env.client.login("u1").await;
	env.backend.login("u1");
	let own = env.backend.seed_post("u1", "draft");
	let view = env.client.open_feed();
	view.load().await.expect("load");

	let commented = view.add_comment(&own.id, "first!").await.expect("comment");
	assert_eq!(view.get(&own.id).map(|p| p.comments.len()), Some(1));

	let comment_id = commented.comments[0].id.clone();
	view.delete_comment(&own.id, &comment_id).await.expect("delete comment");
	assert_eq!(view.get(&own.id).map(|p| p.comments.len()), Some(0));

	let patch = PostPatch { content: Patch::Value("final".into()), ..Default::default() };
	view.edit_post(&own.id, patch).await.expect("edit");
	assert_eq!(view.get(&own.id).and_then(|p| p.content).as_deref(), Some("final"));

	view.delete_post(&own.id).await.expect("delete");
	assert!(view.get(&own.id).is_none());
}

#[tokio::test]
async fn test_failed_action_leaves_view_unchanged() {
	let env = setup();
	env.client.login("u1").await;
	env.backend.login("u1");
	let seeded = env.backend.seed_post("u2", "hello");
	let view = env.client.open_feed();
	view.load().await.expect("load");
	let before = view.items();

	env.backend.fail_next(Op::Like);
	assert!(matches!(view.like(&seeded.id).await, Err(Error::ActionFailed(_))));
	assert_eq!(view.items(), before);

	// Not the author
	assert!(matches!(view.delete_post(&seeded.id).await, Err(Error::ActionFailed(_))));
	assert_eq!(view.items(), before);
}

#[tokio::test]
async fn test_failed_load_and_retry() {
	let env = setup();
	env.backend.insert_post(post("p1", "u2"));
	let view = env.client.open_feed();

	env.backend.fail_next(Op::FetchFeed);
	assert!(matches!(view.load().await, Err(Error::SnapshotLoadFailed(_))));
	assert!(matches!(view.state(), ViewState::Failed(_)));
	assert!(matches!(view.like(&"p1".into()).await, Err(Error::NotReady)));

	view.load().await.expect("retry");
	assert_eq!(view.state(), ViewState::Ready);
	assert_eq!(ids(&view.items()), vec!["p1"]);
}

#[tokio::test]
async fn test_closed_view_is_deregistered() {
	let env = setup();
	env.client.login("u1").await;
	let closed = env.client.open_feed();
	let open = env.client.open_feed();
	closed.load().await.expect("load");
	open.load().await.expect("load");
	assert_eq!(env.client.open_view_count(), 2);

	closed.close();
	assert_eq!(env.client.open_view_count(), 1);

	sync_view(&env, &open, "marker").await;
	assert!(closed.is_empty());
	assert!(matches!(closed.like(&"marker".into()).await, Err(Error::Cancelled)));

	drop(open);
	assert_eq!(env.client.open_view_count(), 0);
}

#[tokio::test]
async fn test_close_discards_late_snapshot() {
	let env = setup();
	env.backend.insert_post(post("p1", "u2"));
	env.backend.set_latency(Some(Duration::from_millis(100)));
	let view = env.client.open_feed();

	let (res, ()) = tokio::join!(view.load(), async {
		tokio::time::sleep(Duration::from_millis(10)).await;
		view.close();
	});

	assert!(matches!(res, Err(Error::Cancelled)));
	assert!(view.is_empty());
	assert_eq!(view.state(), ViewState::Loading);
}

#[tokio::test]
async fn test_views_watch_revisions() {
	let env = setup();
	env.client.login("u1").await;
	let view = env.client.open_feed();
	let mut changes = view.watch();
	view.load().await.expect("load");
	assert!(changes.has_changed().expect("view alive"));
	let _ = changes.borrow_and_update();

	publish(&env, PushEvent::ItemCreated(post("p1", "u2")));
	tokio::time::timeout(Duration::from_secs(2), changes.changed())
		.await
		.expect("change in time")
		.expect("view alive");
	assert_eq!(view.len(), 1);
}

// vim: ts=4
