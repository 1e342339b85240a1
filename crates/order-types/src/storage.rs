//! Result types returned by the persistence gateway.

use crate::OrderId;
use serde::{Deserialize, Serialize};

/// Default bound on a single store operation, in milliseconds.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 100_000;

/// Default name of the order collection.
pub const DEFAULT_COLLECTION: &str = "orders";

/// Outcome of inserting a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertResult {
	/// Id assigned to the inserted document.
	#[serde(rename = "InsertedID")]
	pub inserted_id: OrderId,
}

/// Outcome of a partial update or a full replace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
	/// Number of documents whose id matched.
	pub matched_count: u64,
	/// Number of documents whose stored content changed.
	pub modified_count: u64,
}

impl UpdateResult {
	pub const UNMATCHED: UpdateResult = UpdateResult {
		matched_count: 0,
		modified_count: 0,
	};
}

/// Outcome of a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
	pub deleted_count: u64,
}
