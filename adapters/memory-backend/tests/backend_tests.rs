//! Memory backend integration tests
//!
//! Drives the store and the broker together, the way a client sees them

use std::sync::Arc;
use std::time::Duration;

use vibely_memory_backend::{DeliveryResult, MemoryBackend, MemoryBroker, MemoryTransport, Op};
use vibely_types::api_adapter::{FeedApi, ProfileApi};
use vibely_types::error::Error;
use vibely_types::event::{EventKind, PushEvent};
use vibely_types::model::{PostDraft, PostPatch, ProfilePatch};
use vibely_types::transport_adapter::Transport;
use vibely_types::types::{Patch, SubjectId};

fn create_backend() -> Arc<MemoryBackend> {
	let backend = MemoryBackend::new(Arc::new(MemoryBroker::new()));
	backend.register_user("alice", "Alice");
	backend.register_user("bob", "Bob");
	Arc::new(backend)
}

fn draft(content: &str) -> PostDraft {
	PostDraft { content: Some(content.into()), media: None }
}

#[tokio::test]
async fn test_snapshot_newest_first() {
	let backend = create_backend();
	let alice = SubjectId::from("alice");
	let first = backend.create_post_as(&alice, draft("first")).expect("create first");
	let second = backend.create_post_as(&alice, draft("second")).expect("create second");

	let feed = backend.fetch_feed_snapshot().await.expect("feed snapshot");
	let ids: Vec<_> = feed.iter().map(|p| p.id.clone()).collect();
	assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn test_author_snapshot() {
	let backend = create_backend();
	backend.create_post_as(&"alice".into(), draft("a")).expect("create");
	backend.create_post_as(&"bob".into(), draft("b")).expect("create");

	let posts = backend.fetch_author_snapshot(&"bob".into()).await.expect("author snapshot");
	assert_eq!(posts.len(), 1);
	assert_eq!(posts[0].author_id().as_str(), "bob");

	let res = backend.fetch_author_snapshot(&"nobody".into()).await;
	assert!(matches!(res, Err(Error::NotFound)));
}

#[tokio::test]
async fn test_mutations_publish_feed_events() {
	let backend = create_backend();
	let transport = MemoryTransport::new(backend.broker().clone());
	let opened = transport.open().await.expect("open link");
	opened.link.subscribe("feed").await.expect("subscribe");

	backend.login("alice");
	let post = backend.create_post(draft("hello")).await.expect("create");
	let edit = PostPatch { content: Patch::Value("edited".into()), ..Default::default() };
	backend.edit_post(&post.id, edit).await.expect("edit");
	backend.delete_post(&post.id).await.expect("delete");

	let mut kinds = Vec::new();
	for _ in 0..3 {
		let msg = opened.inbound.recv_async().await.expect("message");
		let event = PushEvent::from_message(&msg).expect("decode").expect("known kind");
		kinds.push(event.kind());
	}
	assert_eq!(kinds, vec![EventKind::ItemCreated, EventKind::ItemUpdated, EventKind::ItemDeleted]);
}

#[tokio::test]
async fn test_concurrent_likes() {
	let backend = create_backend();
	let post = backend.seed_post("alice", "popular");

	let mut handles = vec![];
	for i in 0..10 {
		let backend = Arc::clone(&backend);
		let id = post.id.clone();
		let user: SubjectId = format!("user{}", i).into();
		backend.register_user(user.clone(), format!("User {}", i));
		handles.push(tokio::spawn(async move { backend.like_as(&user, &id) }));
	}
	for handle in handles {
		handle.await.expect("Task panicked").expect("like");
	}

	let post = backend.post(&post.id).expect("post exists");
	assert_eq!(post.like_count(), 10);
}

#[tokio::test]
async fn test_notifications_go_to_room() {
	let backend = create_backend();
	let transport = MemoryTransport::new(backend.broker().clone());
	let alice_link = transport.open().await.expect("open link");
	alice_link.link.subscribe("room:alice").await.expect("subscribe");

	backend.login("bob");
	backend.follow_user(&"alice".into()).await.expect("follow");

	let msg = alice_link.inbound.recv_async().await.expect("notification");
	assert_eq!(msg.event, "notification");
	assert_eq!(msg.topic, "room:alice");

	// Nobody listens to bob's room
	let res = backend.broker().publish_event("room:bob", &PushEvent::ItemDeleted { id: "x".into() });
	assert_eq!(res.expect("publish"), DeliveryResult::NoSubscribers);
}

#[tokio::test]
async fn test_update_profile_refreshes_author_summaries() {
	let backend = create_backend();
	backend.seed_post("alice", "hello");
	backend.login("alice");

	let patch = ProfilePatch { username: Patch::Value("Alicia".into()), ..Default::default() };
	let profile = backend.update_profile(patch).await.expect("update");
	assert_eq!(&*profile.username, "Alicia");

	let posts = backend.fetch_author_snapshot(&"alice".into()).await.expect("snapshot");
	assert_eq!(posts[0].author.display_name.as_deref(), Some("Alicia"));
}

#[tokio::test(start_paused = true)]
async fn test_latency_and_failure_injection() {
	let backend = create_backend();
	backend.set_latency(Some(Duration::from_millis(200)));

	let started = tokio::time::Instant::now();
	backend.fetch_feed_snapshot().await.expect("snapshot");
	assert!(started.elapsed() >= Duration::from_millis(200));

	backend.fail_next(Op::Follow);
	backend.login("bob");
	assert!(matches!(backend.follow_user(&"alice".into()).await, Err(Error::Internal(_))));
	assert!(backend.follow_user(&"alice".into()).await.is_ok());
}

// vim: ts=4
