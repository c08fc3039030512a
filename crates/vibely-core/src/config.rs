//! Client configuration
//!
//! Values come from [`ClientConfig::default`], from the environment
//! ([`ClientConfig::from_env`]) or from the builder setters of the client.
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `VIBELY_API_URL` | REST API base URL | `http://localhost:5000/api` |
//! | `VIBELY_SOCKET_URL` | push socket URL | API URL without trailing `/api` |
//! | `VIBELY_GLOBAL_TOPIC` | topic of feed-wide events | `feed` |
//! | `VIBELY_CONNECT_TIMEOUT_MS` | push connect timeout | `10000` |

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::prelude::*;
use vibely_types::{topic, utils::socket_url_from_api_url};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
	/// REST API base URL, handed to the pull adapter
	pub api_url: Box<str>,
	/// Push socket URL, handed to the transport adapter
	pub socket_url: Option<Box<str>>,
	/// Topic carrying feed-wide events
	pub global_topic: Box<str>,
	/// Upper bound for establishing the push connection
	#[serde(with = "duration_ms")]
	pub connect_timeout: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			api_url: DEFAULT_API_URL.into(),
			socket_url: None,
			global_topic: topic::GLOBAL_FEED.into(),
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
		}
	}
}

impl ClientConfig {
	/// Read configuration from `VIBELY_*` environment variables
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Build configuration from an arbitrary key lookup
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let mut config = Self::default();

		if let Some(api_url) = lookup("VIBELY_API_URL").filter(|v| !v.is_empty()) {
			config.api_url = api_url.into();
		}
		if let Some(socket_url) = lookup("VIBELY_SOCKET_URL").filter(|v| !v.is_empty()) {
			config.socket_url = Some(socket_url.into());
		}
		if let Some(global_topic) = lookup("VIBELY_GLOBAL_TOPIC").filter(|v| !v.is_empty()) {
			config.global_topic = global_topic.into();
		}
		if let Some(timeout) = lookup("VIBELY_CONNECT_TIMEOUT_MS") {
			match timeout.parse::<u64>() {
				Ok(ms) if ms > 0 => config.connect_timeout = Duration::from_millis(ms),
				_ => warn!(value = %timeout, "Invalid VIBELY_CONNECT_TIMEOUT_MS, using default"),
			}
		}

		config
	}

	/// Effective push socket URL
	pub fn socket_url(&self) -> String {
		match &self.socket_url {
			Some(url) => url.to_string(),
			None => socket_url_from_api_url(&self.api_url),
		}
	}
}

mod duration_ms {
	use serde::{Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
		Ok(Duration::from_millis(u64::deserialize(d)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> =
			vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
		move |key| vars.get(key).cloned()
	}

	#[test]
	fn test_defaults() {
		let config = ClientConfig::from_lookup(lookup(&[]));
		assert_eq!(config, ClientConfig::default());
		assert_eq!(config.socket_url(), "http://localhost:5000");
		assert_eq!(&*config.global_topic, "feed");
	}

	#[test]
	fn test_socket_url_derived_from_api_url() {
		let config = ClientConfig::from_lookup(lookup(&[("VIBELY_API_URL", "https://api.example.com/api")]));
		assert_eq!(config.socket_url(), "https://api.example.com");

		let config = ClientConfig::from_lookup(lookup(&[
			("VIBELY_API_URL", "https://api.example.com/api"),
			("VIBELY_SOCKET_URL", "wss://push.example.com"),
		]));
		assert_eq!(config.socket_url(), "wss://push.example.com");
	}

	#[test]
	fn test_invalid_timeout_keeps_default() {
		let config = ClientConfig::from_lookup(lookup(&[("VIBELY_CONNECT_TIMEOUT_MS", "soon")]));
		assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);

		let config = ClientConfig::from_lookup(lookup(&[("VIBELY_CONNECT_TIMEOUT_MS", "250")]));
		assert_eq!(config.connect_timeout, Duration::from_millis(250));
	}

	#[test]
	fn test_deserialize_partial() {
		let config: ClientConfig =
			serde_json::from_str(r#"{ "globalTopic": "public", "connectTimeout": 500 }"#).unwrap();
		assert_eq!(&*config.global_topic, "public");
		assert_eq!(config.connect_timeout, Duration::from_millis(500));
		assert_eq!(&*config.api_url, DEFAULT_API_URL);
	}
}

// vim: ts=4
