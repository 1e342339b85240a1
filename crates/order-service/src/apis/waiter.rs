//! Waiter endpoints.

use order_storage::{OrderCollection, OrderFilter};
use order_types::{ApiError, Order, OrderId, WaiterUpdate};
use tracing::{debug, info};

/// Handles GET /waiter/{waiter}.
///
/// Matches the server field exactly; an unknown waiter yields an empty list.
pub async fn get_orders_by_waiter(
	collection: &OrderCollection,
	waiter: &str,
) -> Result<Vec<Order>, ApiError> {
	let orders = collection.find(&OrderFilter::by_server(waiter)).await?;
	debug!("Listed {} orders for waiter '{}'", orders.len(), waiter);
	Ok(orders)
}

/// Handles PUT /waiter/update/{id}.
///
/// Only the server field changes; a missing `server` key clears it.
pub async fn update_waiter(
	collection: &OrderCollection,
	id: &OrderId,
	update: WaiterUpdate,
) -> Result<u64, ApiError> {
	let result = collection.update_server(id, update.server).await?;
	info!(
		"Reassigned order {} (matched {}, modified {})",
		id, result.matched_count, result.modified_count
	);
	Ok(result.modified_count)
}
