//! Utility functions

use crate::prelude::*;
use rand::RngExt;

pub const ID_LENGTH: usize = 24;
pub const SAFE: [char; 62] = [
	'0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
	'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
	'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
	'V', 'W', 'X', 'Y', 'Z',
];

pub fn random_id() -> ClResult<String> {
	let mut rng = rand::rng();
	let mut result = String::with_capacity(ID_LENGTH);

	for _ in 0..ID_LENGTH {
		result.push(SAFE[rng.random_range(0..SAFE.len())]);
	}
	Ok(result)
}

/// Derive the push socket URL from the REST API URL
///
/// The socket lives on the same origin as the API: a trailing `/api` path
/// segment is stripped.
///
/// # Examples
/// - `"https://api.example.com/api"` → `"https://api.example.com"`
/// - `"http://localhost:5000/api/"` → `"http://localhost:5000"`
/// - `"http://localhost:5000"` → `"http://localhost:5000"`
pub fn socket_url_from_api_url(api_url: &str) -> String {
	let trimmed = api_url.strip_suffix('/').unwrap_or(api_url);
	trimmed.strip_suffix("/api").unwrap_or(trimmed).to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_random_id() {
		let id1 = random_id().unwrap();
		let id2 = random_id().unwrap();
		assert_eq!(id1.len(), ID_LENGTH);
		assert_ne!(id1, id2);
		assert!(id1.chars().all(|c| c.is_ascii_alphanumeric()));
	}

	#[test]
	fn test_socket_url_from_api_url() {
		assert_eq!(socket_url_from_api_url("https://api.example.com/api"), "https://api.example.com");
		assert_eq!(socket_url_from_api_url("http://localhost:5000/api/"), "http://localhost:5000");
		assert_eq!(socket_url_from_api_url("http://localhost:5000"), "http://localhost:5000");
	}
}

// vim: ts=4
