//! Client builder - wires adapters and the synchronization core together

use std::sync::Arc;
use std::time::Duration;

use crate::api_adapter::{FeedApi, ProfileApi};
use crate::prelude::*;
use crate::transport_adapter::Transport;
use vibely_core::{
	ChannelHandle, ChannelState, ClientConfig, FeedReconciler, NotificationAggregator, ProfileController,
	SessionBinding, ViewController, ViewScope,
};

pub struct ClientBuilder {
	config: ClientConfig,
	transport: Option<Arc<dyn Transport>>,
	feed_api: Option<Arc<dyn FeedApi>>,
	profile_api: Option<Arc<dyn ProfileApi>>,
}

impl ClientBuilder {
	/// Start from the `VIBELY_*` environment, installs the log subscriber
	/// unless one is already set
	pub fn new() -> Self {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.try_init();
		ClientBuilder {
			config: ClientConfig::from_env(),
			transport: None,
			feed_api: None,
			profile_api: None,
		}
	}

	pub fn config(&mut self, config: ClientConfig) -> &mut Self {
		self.config = config;
		self
	}

	pub fn api_url(&mut self, api_url: impl Into<Box<str>>) -> &mut Self {
		self.config.api_url = api_url.into();
		self
	}

	pub fn socket_url(&mut self, socket_url: impl Into<Box<str>>) -> &mut Self {
		self.config.socket_url = Some(socket_url.into());
		self
	}

	pub fn global_topic(&mut self, global_topic: impl Into<Box<str>>) -> &mut Self {
		self.config.global_topic = global_topic.into();
		self
	}

	pub fn connect_timeout(&mut self, timeout: Duration) -> &mut Self {
		self.config.connect_timeout = timeout;
		self
	}

	pub fn transport(&mut self, transport: Arc<dyn Transport>) -> &mut Self {
		self.transport = Some(transport);
		self
	}

	pub fn feed_api(&mut self, feed_api: Arc<dyn FeedApi>) -> &mut Self {
		self.feed_api = Some(feed_api);
		self
	}

	pub fn profile_api(&mut self, profile_api: Arc<dyn ProfileApi>) -> &mut Self {
		self.profile_api = Some(profile_api);
		self
	}

	/// Use one adapter for both feed and profile calls
	pub fn backend<B>(&mut self, backend: Arc<B>) -> &mut Self
	where
		B: FeedApi + ProfileApi + 'static,
	{
		self.feed_api = Some(backend.clone());
		self.profile_api = Some(backend);
		self
	}

	pub fn build(self) -> ClResult<Client> {
		let Some(transport) = self.transport else {
			error!("No transport adapter configured");
			return Err(Error::Internal("No transport adapter configured".to_string()));
		};
		let Some(feed_api) = self.feed_api else {
			error!("No feed adapter configured");
			return Err(Error::Internal("No feed adapter configured".to_string()));
		};
		let Some(profile_api) = self.profile_api else {
			error!("No profile adapter configured");
			return Err(Error::Internal("No profile adapter configured".to_string()));
		};
		if self.config.global_topic.is_empty() {
			error!("Global topic is empty");
			return Err(Error::ValidationError("global topic is empty".to_string()));
		}

		let channel =
			Arc::new(ChannelHandle::new(transport).with_connect_timeout(self.config.connect_timeout));
		let notifications = Arc::new(NotificationAggregator::new());
		let session =
			SessionBinding::new(channel.clone(), notifications.clone(), self.config.global_topic.clone());
		let reconciler = FeedReconciler::attached(&channel);

		info!(
			api_url = %self.config.api_url,
			socket_url = %self.config.socket_url(),
			global_topic = %self.config.global_topic,
			"Client ready"
		);

		Ok(Client {
			config: self.config,
			channel,
			notifications,
			session,
			reconciler,
			feed_api,
			profile_api,
		})
	}
}

impl Default for ClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// A client session
///
/// Owns the push channel, the session binding, the notification stream and
/// the reconciler every opened view registers with.
pub struct Client {
	config: ClientConfig,
	channel: Arc<ChannelHandle>,
	notifications: Arc<NotificationAggregator>,
	session: SessionBinding,
	reconciler: FeedReconciler,
	feed_api: Arc<dyn FeedApi>,
	profile_api: Arc<dyn ProfileApi>,
}

impl Client {
	pub fn builder() -> ClientBuilder {
		ClientBuilder::new()
	}

	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Apply an identity transition (login, logout or account switch)
	pub async fn set_identity(&self, identity: Option<SubjectId>) -> ChannelState {
		self.session.set_identity(identity).await
	}

	pub async fn login(&self, subject: impl Into<SubjectId>) -> ChannelState {
		self.set_identity(Some(subject.into())).await
	}

	pub async fn logout(&self) {
		self.set_identity(None).await;
	}

	pub async fn identity(&self) -> Option<SubjectId> {
		self.session.identity().await
	}

	/// Retry the push connection for the current identity
	pub async fn reconnect(&self) -> ChannelState {
		self.session.reconnect().await
	}

	pub fn channel(&self) -> &Arc<ChannelHandle> {
		&self.channel
	}

	pub fn channel_state(&self) -> ChannelState {
		self.channel.state()
	}

	pub fn session(&self) -> &SessionBinding {
		&self.session
	}

	pub fn notifications(&self) -> &Arc<NotificationAggregator> {
		&self.notifications
	}

	pub fn notification_count(&self) -> usize {
		self.notifications.count()
	}

	pub fn clear_notifications(&self) {
		self.notifications.clear();
	}

	/// Open a view of the global feed
	pub fn open_feed(&self) -> ViewController {
		ViewController::new(ViewScope::Global, self.feed_api.clone(), &self.reconciler)
	}

	/// Open a view of one author's posts
	pub fn open_author(&self, author: impl Into<SubjectId>) -> ViewController {
		ViewController::new(ViewScope::Author(author.into()), self.feed_api.clone(), &self.reconciler)
	}

	/// Open a profile page
	pub fn open_profile(&self, author: impl Into<SubjectId>) -> ProfileController {
		ProfileController::new(
			author.into(),
			self.feed_api.clone(),
			self.profile_api.clone(),
			&self.reconciler,
		)
	}

	/// Number of views currently receiving events
	pub fn open_view_count(&self) -> usize {
		self.reconciler.view_count()
	}
}

impl std::fmt::Debug for Client {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Client")
			.field("config", &self.config)
			.field("channel", &self.channel)
			.field("views", &self.reconciler.view_count())
			.finish_non_exhaustive()
	}
}

// vim: ts=4
