//! Identifier, timestamp and patch primitives

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

// SubjectId //
//***********//

/// Opaque identity of an authenticated subject (user)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub Box<str>);

impl SubjectId {
	pub fn new(id: impl Into<Box<str>>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for SubjectId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SubjectId {
	fn from(id: &str) -> Self {
		Self(id.into())
	}
}

impl From<String> for SubjectId {
	fn from(id: String) -> Self {
		Self(id.into())
	}
}

// PostId //
//********//

/// Identity key of a feed item
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub Box<str>);

impl PostId {
	pub fn new(id: impl Into<Box<str>>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for PostId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for PostId {
	fn from(id: &str) -> Self {
		Self(id.into())
	}
}

impl From<String> for PostId {
	fn from(id: String) -> Self {
		Self(id.into())
	}
}

// Timestamp //
//***********//

/// Seconds since the Unix epoch
///
/// Serializes as a number. Deserializes from a number or from an RFC 3339
/// string (the backend sends `createdAt` as an ISO date).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i64(self.0)
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		struct TimestampVisitor;

		impl serde::de::Visitor<'_> for TimestampVisitor {
			type Value = Timestamp;

			fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
				f.write_str("a unix timestamp or an RFC 3339 date string")
			}

			fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Timestamp, E> {
				Ok(Timestamp(v))
			}

			fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Timestamp, E> {
				i64::try_from(v).map(Timestamp).map_err(E::custom)
			}

			#[allow(clippy::cast_possible_truncation)]
			fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Timestamp, E> {
				Ok(Timestamp(v as i64))
			}

			fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Timestamp, E> {
				chrono::DateTime::parse_from_rfc3339(v)
					.map(|dt| Timestamp(dt.timestamp()))
					.map_err(E::custom)
			}
		}

		deserializer.deserialize_any(TimestampVisitor)
	}
}

pub fn now() -> Timestamp {
	let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
	Timestamp(i64::try_from(res.as_secs()).unwrap_or(i64::MAX))
}

// Patch //
//*******//

/// Tri-state field update
///
/// `Undefined` leaves the field untouched, `Null` clears it, `Value` sets it.
/// Fields of this type need `#[serde(default)]` so that a missing key
/// decodes as `Undefined`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
	#[default]
	Undefined,
	Null,
	Value(T),
}

impl<T> Patch<T> {
	pub fn is_undefined(&self) -> bool {
		matches!(self, Patch::Undefined)
	}

	pub fn as_ref(&self) -> Patch<&T> {
		match self {
			Patch::Undefined => Patch::Undefined,
			Patch::Null => Patch::Null,
			Patch::Value(v) => Patch::Value(v),
		}
	}

	/// Apply this patch to an optional field
	pub fn apply_to(self, field: &mut Option<T>) {
		match self {
			Patch::Undefined => {}
			Patch::Null => *field = None,
			Patch::Value(v) => *field = Some(v),
		}
	}
}

impl<T: Serialize> Serialize for Patch<T> {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		match self {
			Patch::Undefined | Patch::Null => serializer.serialize_none(),
			Patch::Value(v) => serializer.serialize_some(v),
		}
	}
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(match Option::<T>::deserialize(deserializer)? {
			None => Patch::Null,
			Some(v) => Patch::Value(v),
		})
	}
}


// vim: ts=4
