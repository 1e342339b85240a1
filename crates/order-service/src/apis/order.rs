//! Order endpoints: create, list, fetch, replace and delete.

use order_storage::{OrderCollection, OrderFilter};
use order_types::{ApiError, InsertResult, Order, OrderFields, OrderId};
use tracing::{debug, info};
use validator::Validate;

/// Handles POST /order/create.
///
/// The store assigns the id; any id in the body is ignored.
pub async fn add_order(
	collection: &OrderCollection,
	fields: OrderFields,
) -> Result<InsertResult, ApiError> {
	fields.validate()?;

	let order = Order::new(OrderId::new(), fields);
	let result = collection
		.insert(&order)
		.await
		.map_err(|e| ApiError::Persistence(format!("order item was not created: {}", e)))?;

	info!("Created order {}", result.inserted_id);
	Ok(result)
}

/// Handles GET /orders.
pub async fn get_orders(collection: &OrderCollection) -> Result<Vec<Order>, ApiError> {
	let orders = collection.find(&OrderFilter::all()).await?;
	debug!("Listed {} orders", orders.len());
	Ok(orders)
}

/// Handles GET /order/{id}.
///
/// An unknown id is a persistence failure, not a 404.
pub async fn get_order_by_id(
	collection: &OrderCollection,
	id: &OrderId,
) -> Result<Order, ApiError> {
	let order = collection.find_by_id(id).await?;
	debug!("Fetched order {}", order.id);
	Ok(order)
}

/// Handles PUT /order/update/{id}.
///
/// Replaces every field but the id and returns the modified count.
pub async fn update_order(
	collection: &OrderCollection,
	id: &OrderId,
	fields: OrderFields,
) -> Result<u64, ApiError> {
	fields.validate()?;

	let result = collection.replace(id, fields).await?;
	info!(
		"Replaced order {} (matched {}, modified {})",
		id, result.matched_count, result.modified_count
	);
	Ok(result.modified_count)
}

/// Handles DELETE /order/delete/{id}.
pub async fn delete_order(collection: &OrderCollection, id: &OrderId) -> Result<u64, ApiError> {
	let result = collection.delete(id).await?;
	info!("Deleted order {} (deleted {})", id, result.deleted_count);
	Ok(result.deleted_count)
}

#[cfg(test)]
mod tests {
	use super::*;
	use order_storage::implementations::memory::MemoryStorage;
	use std::time::Duration;

	fn collection() -> OrderCollection {
		OrderCollection::new(
			Box::new(MemoryStorage::new()),
			"orders",
			Duration::from_secs(5),
		)
	}

	fn fields(dish: &str, server: &str) -> OrderFields {
		OrderFields {
			dish: Some(dish.to_string()),
			price: Some(12.5),
			server: Some(server.to_string()),
			table: Some("4".to_string()),
		}
	}

	#[tokio::test]
	async fn test_add_then_fetch() {
		let collection = collection();
		let created = add_order(&collection, fields("Ramen", "Ann")).await.unwrap();

		let order = get_order_by_id(&collection, &created.inserted_id)
			.await
			.unwrap();
		assert_eq!(order.dish.as_deref(), Some("Ramen"));
		assert_eq!(get_orders(&collection).await.unwrap(), vec![order]);
	}

	#[tokio::test]
	async fn test_add_rejects_missing_dish() {
		let collection = collection();
		let err = add_order(&collection, OrderFields::default())
			.await
			.unwrap_err();
		assert!(matches!(err, ApiError::Validation { .. }));
		assert!(get_orders(&collection).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_update_and_delete_counts() {
		let collection = collection();
		let id = add_order(&collection, fields("Ramen", "Ann"))
			.await
			.unwrap()
			.inserted_id;

		assert_eq!(
			update_order(&collection, &id, fields("Udon", "Ann"))
				.await
				.unwrap(),
			1
		);
		assert_eq!(
			update_order(&collection, &id, fields("Udon", "Ann"))
				.await
				.unwrap(),
			0
		);
		assert_eq!(delete_order(&collection, &id).await.unwrap(), 1);
		assert_eq!(delete_order(&collection, &id).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_unknown_id_is_a_persistence_error() {
		let collection = collection();
		let err = get_order_by_id(&collection, &OrderId::ZERO)
			.await
			.unwrap_err();
		assert!(matches!(err, ApiError::Persistence(_)));
	}
}
