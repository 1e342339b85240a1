//! Order identifiers.
//!
//! Ids follow the 12-byte layout the document store uses natively:
//!
//! - [0-3]: creation timestamp (u32, big-endian, Unix seconds)
//! - [4-8]: process-unique random value
//! - [9-11]: counter (u24, big-endian), seeded randomly per process
//!
//! The external representation is 24 lowercase hex characters.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use thiserror::Error;

const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Error returned when a string is not a valid hex-encoded order id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid order id '{0}': expected 24 hex characters")]
pub struct InvalidOrderId(pub String);

/// Unique identifier of an order document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId([u8; 12]);

impl OrderId {
	/// The all-zero id. Never produced by [`OrderId::new`].
	pub const ZERO: OrderId = OrderId([0; 12]);

	/// Generates a fresh id for a new document.
	pub fn new() -> Self {
		let timestamp = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX);
		let counter = next_counter();

		let mut bytes = [0u8; 12];
		bytes[0..4].copy_from_slice(&timestamp.to_be_bytes());
		bytes[4..9].copy_from_slice(process_unique());
		bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
		Self(bytes)
	}

	/// Parses a hex id, falling back to [`OrderId::ZERO`] when it is malformed.
	///
	/// A zero id matches no stored document, so lookups with it end in a
	/// not-found error from the store.
	pub fn parse_lenient(s: &str) -> Self {
		s.parse().unwrap_or(Self::ZERO)
	}

	/// Returns the 24-character lowercase hex representation.
	pub fn to_hex(&self) -> String {
		hex::encode(self.0)
	}

	pub fn is_zero(&self) -> bool {
		self.0 == Self::ZERO.0
	}
}

fn process_unique() -> &'static [u8; 5] {
	static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
	PROCESS_UNIQUE.get_or_init(|| {
		let random = uuid::Uuid::new_v4();
		let mut bytes = [0u8; 5];
		bytes.copy_from_slice(&random.as_bytes()[..5]);
		bytes
	})
}

fn next_counter() -> u32 {
	static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
	let counter = COUNTER.get_or_init(|| {
		let random = uuid::Uuid::new_v4();
		let b = random.as_bytes();
		// Seed in the lower half so a process can mint millions of ids before wrapping.
		AtomicU32::new(u32::from_be_bytes([0, b[0] & 0x7F, b[1], b[2]]))
	});
	counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK
}

impl fmt::Display for OrderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

impl FromStr for OrderId {
	type Err = InvalidOrderId;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut bytes = [0u8; 12];
		hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidOrderId(s.to_string()))?;
		Ok(Self(bytes))
	}
}

impl Serialize for OrderId {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.to_hex())
	}
}

impl<'de> Deserialize<'de> for OrderId {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(D::Error::custom)
	}
}
