//! Shared setup for the client integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use vibely::model::{AuthorSummary, Post};
use vibely::{Client, ClientBuilder, ClientConfig};
use vibely_memory_backend::{MemoryBackend, MemoryBroker, MemoryTransport};

pub struct TestEnv {
	pub broker: Arc<MemoryBroker>,
	pub backend: Arc<MemoryBackend>,
	pub client: Client,
}

/// A client wired to an in-memory broker and backend with users u1, u2, u3
pub fn setup() -> TestEnv {
	let broker = Arc::new(MemoryBroker::new());
	let backend = Arc::new(MemoryBackend::new(broker.clone()));
	backend.register_user("u1", "alice");
	backend.register_user("u2", "bob");
	backend.register_user("u3", "carol");

	let mut builder = ClientBuilder::new();
	builder
		.config(ClientConfig::default())
		.connect_timeout(Duration::from_secs(1))
		.transport(Arc::new(MemoryTransport::new(broker.clone())))
		.backend(backend.clone());
	let client = builder.build().expect("Failed to build client");

	TestEnv { broker, backend, client }
}

pub fn post(id: &str, author: &str) -> Post {
	Post::new(id, AuthorSummary::new(author))
}

pub fn ids(items: &[Post]) -> Vec<String> {
	items.iter().map(|p| p.id.to_string()).collect()
}

/// Poll `cond` until it holds, failing the test after two seconds
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
	for _ in 0..400 {
		if cond() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	assert!(cond(), "timed out waiting for: {}", what);
}

// vim: ts=4
