//! Demo session against the in-memory broker and backend
//!
//! Run with `RUST_LOG=info` (or `debug`) to follow the push traffic.

use std::sync::Arc;
use std::time::Duration;

use vibely::model::{PostDraft, PostPatch};
use vibely::prelude::*;
use vibely::{ChannelState, ClientBuilder};
use vibely_memory_backend::{MemoryBackend, MemoryBroker, MemoryTransport};

fn draft(content: &str) -> PostDraft {
	PostDraft { content: Some(content.into()), media: None }
}

/// Let the push channel catch up
async fn settle() {
	tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ClResult<()> {
	let broker = Arc::new(MemoryBroker::new());
	let backend = Arc::new(MemoryBackend::new(broker.clone()));
	backend.register_user("alice", "Alice");
	backend.register_user("bob", "Bob");
	backend.seed_post("bob", "Hello from Bob");

	let mut builder = ClientBuilder::new();
	builder.transport(Arc::new(MemoryTransport::new(broker.clone()))).backend(backend.clone());
	let client = builder.build()?;

	let me = SubjectId::from("alice");
	backend.login(me.clone());
	if client.set_identity(Some(me.clone())).await != ChannelState::Connected {
		warn!("Push channel unavailable, continuing without live updates");
	}

	let feed = client.open_feed();
	feed.load().await?;
	let profile = client.open_profile("bob");
	profile.load().await?;

	// Alice's own actions
	let post = feed.create_post(draft("First post from Alice")).await?;
	let bob_post = feed.items().into_iter().find(|p| p.author_id().as_str() == "bob");
	if let Some(bob_post) = bob_post {
		feed.like(&bob_post.id).await?;
		feed.add_comment(&bob_post.id, "Nice one!").await?;
	}
	profile.follow(&me).await?;
	feed.edit_post(&post.id, PostPatch { content: Patch::Value("Edited".into()), ..Default::default() })
		.await?;

	// Bob reacting from another client
	let bob = SubjectId::from("bob");
	backend.like_as(&bob, &post.id)?;
	backend.comment_as(&bob, &post.id, "Welcome!")?;
	backend.create_post_as(&bob, draft("Bob again"))?;
	settle().await;

	for item in feed.items() {
		info!(
			id = %item.id,
			author = %item.author_id(),
			content = item.content.as_deref().unwrap_or(""),
			likes = item.like_count(),
			comments = item.comments.len(),
			"Feed item"
		);
	}
	info!(posts = profile.post_count(), following = profile.is_following(&me), "Bob's profile");
	for entry in client.notifications().list() {
		info!(message = %entry.notification.message, "Notification");
	}

	// Server drops the link, then the session comes back
	broker.drop_connections();
	settle().await;
	info!(state = ?client.channel_state(), "Link dropped");
	info!(state = ?client.reconnect().await, "Reconnected");

	client.logout().await;
	info!(
		state = ?client.channel_state(),
		notifications = client.notification_count(),
		"Logged out"
	);
	Ok(())
}

// vim: ts=4
