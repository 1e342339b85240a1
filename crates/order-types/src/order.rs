//! Order document types.
//!
//! An [`Order`] is the persisted record of a restaurant order line. Request
//! bodies never carry the id: [`OrderFields`] is the body of create and full
//! replace requests, [`WaiterUpdate`] the body of the waiter-only patch.

use crate::OrderId;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A stored order document.
///
/// Every field key is always present on the wire; an absent value is `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Identifier assigned by the store on creation.
	#[serde(rename = "_id")]
	pub id: OrderId,
	/// Name of the ordered dish.
	pub dish: Option<String>,
	/// Price of the dish.
	pub price: Option<f64>,
	/// Name of the waiter serving the table.
	pub server: Option<String>,
	/// Table the order belongs to.
	pub table: Option<String>,
}

impl Order {
	/// Creates a document from its id and body fields.
	pub fn new(id: OrderId, fields: OrderFields) -> Self {
		Self {
			id,
			dish: fields.dish,
			price: fields.price,
			server: fields.server,
			table: fields.table,
		}
	}

	/// Returns a copy of every field except the id.
	pub fn fields(&self) -> OrderFields {
		OrderFields {
			dish: self.dish.clone(),
			price: self.price,
			server: self.server.clone(),
			table: self.table.clone(),
		}
	}
}

/// Order body used by create and full-replace requests.
///
/// Unknown keys, including any client-supplied id, are ignored. Only the
/// presence of `dish` is checked; values themselves are taken as sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct OrderFields {
	#[validate(required(message = "dish is required"))]
	pub dish: Option<String>,
	pub price: Option<f64>,
	pub server: Option<String>,
	pub table: Option<String>,
}

/// Body of the waiter-only partial update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaiterUpdate {
	pub server: Option<String>,
}
