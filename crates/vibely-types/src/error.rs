//! Error type shared by the client core and its adapters

use std::fmt;

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// The push transport could not establish a connection
	TransportUnavailable(String),
	/// A pull-based snapshot fetch failed
	SnapshotLoadFailed(String),
	/// A remote round trip for a user action failed
	ActionFailed(String),
	/// A push payload is missing required fields or has the wrong shape
	MalformedEvent(String),
	/// The view is not in the Ready state
	NotReady,
	/// The view was closed while the request was in flight
	Cancelled,
	NotFound,
	PermissionDenied,
	ValidationError(String),
	Parse,
	Internal(String),

	// externals
	Json(serde_json::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::TransportUnavailable(msg) => write!(f, "transport unavailable: {}", msg),
			Error::SnapshotLoadFailed(msg) => write!(f, "snapshot load failed: {}", msg),
			Error::ActionFailed(msg) => write!(f, "action failed: {}", msg),
			Error::MalformedEvent(msg) => write!(f, "malformed event: {}", msg),
			Error::NotReady => write!(f, "view is not ready"),
			Error::Cancelled => write!(f, "cancelled"),
			Error::NotFound => write!(f, "not found"),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::Parse => write!(f, "parse error"),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Json(e) => write!(f, "json error: {}", e),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Json(e) => Some(e),
			_ => None,
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Json(err)
	}
}

impl Error {
	/// Wrap a collaborator error as a failed user action, keeping its message
	pub fn into_action_failed(self) -> Self {
		match self {
			Error::ActionFailed(_) | Error::Cancelled | Error::NotReady => self,
			other => Error::ActionFailed(other.to_string()),
		}
	}

	/// Wrap a collaborator error as a failed snapshot load, keeping its message
	pub fn into_snapshot_failed(self) -> Self {
		match self {
			Error::SnapshotLoadFailed(_) | Error::Cancelled => self,
			other => Error::SnapshotLoadFailed(other.to_string()),
		}
	}
}


// vim: ts=4
