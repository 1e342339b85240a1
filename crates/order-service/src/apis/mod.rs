//! Request handlers for the order desk API.
//!
//! Functions here take decoded inputs and the collection gateway and return
//! domain results; the router in [`crate::server`] owns extraction and
//! response encoding.

pub mod order;
pub mod waiter;

use order_types::{ApiError, OrderId};

/// Parses an id path segment.
///
/// In lenient mode a malformed segment becomes the zero id, which never
/// matches a stored document. Strict mode rejects it with
/// [`ApiError::InvalidId`].
pub fn parse_order_id(raw: &str, strict: bool) -> Result<OrderId, ApiError> {
	if strict {
		Ok(raw.parse::<OrderId>()?)
	} else {
		Ok(OrderId::parse_lenient(raw))
	}
}
