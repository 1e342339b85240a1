//! HTTP server for the order desk API.
//!
//! Routing, middleware and request extraction live here; the handlers in
//! [`crate::apis`] do the work.

use axum::{
	body::Bytes,
	extract::{rejection::BytesRejection, DefaultBodyLimit, Path, State},
	http::{HeaderName, HeaderValue, Method},
	response::Json,
	routing::{delete, get, post, put},
	Router,
};
use order_config::{Config, CorsConfig};
use order_storage::OrderCollection;
use order_types::{ApiError, InsertResult, Order, OrderFields, WaiterUpdate};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::apis::{self, parse_order_id};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Gateway to the order collection.
	pub collection: Arc<OrderCollection>,
	/// Complete configuration.
	pub config: Arc<Config>,
}

impl AppState {
	pub fn new(config: Config, collection: OrderCollection) -> Self {
		Self {
			collection: Arc::new(collection),
			config: Arc::new(config),
		}
	}

	fn strict_ids(&self) -> bool {
		self.config.api.strict_ids
	}
}

/// Builds the router with every order desk route and the API middleware.
pub fn build_router(state: AppState) -> Router {
	let api = &state.config.api;
	let middleware = ServiceBuilder::new()
		.layer(TraceLayer::new_for_http())
		.layer(cors_layer(api.cors.as_ref()))
		.layer(DefaultBodyLimit::max(api.max_request_size));

	Router::new()
		.route("/health", get(handle_health))
		.route("/orders", get(handle_get_orders))
		.route("/order/create", post(handle_add_order))
		.route("/order/{id}", get(handle_get_order_by_id))
		.route("/order/{id}/", get(handle_get_order_by_id))
		.route("/order/update/{id}", put(handle_update_order))
		.route("/order/delete/{id}", delete(handle_delete_order))
		.route("/waiter/{waiter}", get(handle_get_orders_by_waiter))
		.route("/waiter/update/{id}", put(handle_update_waiter))
		.layer(middleware)
		.with_state(state)
}

/// Starts the HTTP server and serves until `shutdown` resolves.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
where
	F: Future<Output = ()> + Send + 'static,
{
	let bind_address = format!("{}:{}", state.config.api.host, state.config.api.port);
	let service_id = state.config.service.id.clone();
	let app = build_router(state);

	let listener = TcpListener::bind(&bind_address).await?;
	tracing::info!("Order desk API [{}] listening on {}", service_id, bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown)
		.await?;

	Ok(())
}

/// Builds the CORS layer. Permissive when no CORS section is configured.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let origins = if allows_any(&cors.allowed_origins) {
		AllowOrigin::any()
	} else {
		AllowOrigin::list(parse_entries(&cors.allowed_origins, "origin", |s| {
			HeaderValue::from_str(s).ok()
		}))
	};
	let methods = if cors.allowed_methods.is_empty() || allows_any(&cors.allowed_methods) {
		AllowMethods::any()
	} else {
		AllowMethods::list(parse_entries(&cors.allowed_methods, "method", |s| {
			Method::from_bytes(s.to_ascii_uppercase().as_bytes()).ok()
		}))
	};
	let headers = if cors.allowed_headers.is_empty() || allows_any(&cors.allowed_headers) {
		AllowHeaders::any()
	} else {
		AllowHeaders::list(parse_entries(&cors.allowed_headers, "header", |s| {
			HeaderName::from_bytes(s.as_bytes()).ok()
		}))
	};

	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(methods)
		.allow_headers(headers)
}

fn allows_any(entries: &[String]) -> bool {
	entries.iter().any(|entry| entry == "*")
}

fn parse_entries<T>(entries: &[String], kind: &str, parse: impl Fn(&str) -> Option<T>) -> Vec<T> {
	entries
		.iter()
		.filter_map(|entry| {
			let parsed = parse(entry);
			if parsed.is_none() {
				tracing::warn!("Ignoring invalid CORS {} '{}'", kind, entry);
			}
			parsed
		})
		.collect()
}

/// Decodes a JSON request body.
///
/// The `Content-Type` header is not consulted.
fn decode_body<T: DeserializeOwned>(body: Result<Bytes, BytesRejection>) -> Result<T, ApiError> {
	Ok(serde_json::from_slice(&body?)?)
}

/// Logs a failed request and wraps a successful result as JSON.
fn respond<T>(operation: &str, result: Result<T, ApiError>) -> Result<Json<T>, ApiError> {
	match result {
		Ok(value) => Ok(Json(value)),
		Err(e) => {
			tracing::warn!("{} failed: {}", operation, e);
			Err(e)
		}
	}
}

/// Handles GET /health requests.
async fn handle_health(State(state): State<AppState>) -> Json<Value> {
	Json(json!({
		"status": "ok",
		"service": state.config.service.id,
	}))
}

/// Handles POST /order/create requests.
async fn handle_add_order(
	State(state): State<AppState>,
	body: Result<Bytes, BytesRejection>,
) -> Result<Json<InsertResult>, ApiError> {
	let result = match decode_body::<OrderFields>(body) {
		Ok(fields) => apis::order::add_order(&state.collection, fields).await,
		Err(e) => Err(e),
	};
	respond("Order creation", result)
}

/// Handles GET /orders requests.
async fn handle_get_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, ApiError> {
	respond(
		"Order listing",
		apis::order::get_orders(&state.collection).await,
	)
}

/// Handles GET /order/{id} requests.
async fn handle_get_order_by_id(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Order>, ApiError> {
	let result = match parse_order_id(&id, state.strict_ids()) {
		Ok(id) => apis::order::get_order_by_id(&state.collection, &id).await,
		Err(e) => Err(e),
	};
	respond("Order retrieval", result)
}

/// Handles PUT /order/update/{id} requests.
async fn handle_update_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
	body: Result<Bytes, BytesRejection>,
) -> Result<Json<u64>, ApiError> {
	let result = match (parse_order_id(&id, state.strict_ids()), body) {
		(Err(e), _) => Err(e),
		(Ok(id), body) => match decode_body::<OrderFields>(body) {
			Ok(fields) => apis::order::update_order(&state.collection, &id, fields).await,
			Err(e) => Err(e),
		},
	};
	respond("Order update", result)
}

/// Handles DELETE /order/delete/{id} requests.
async fn handle_delete_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<u64>, ApiError> {
	let result = match parse_order_id(&id, state.strict_ids()) {
		Ok(id) => apis::order::delete_order(&state.collection, &id).await,
		Err(e) => Err(e),
	};
	respond("Order deletion", result)
}

/// Handles GET /waiter/{waiter} requests.
async fn handle_get_orders_by_waiter(
	Path(waiter): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, ApiError> {
	respond(
		"Waiter order listing",
		apis::waiter::get_orders_by_waiter(&state.collection, &waiter).await,
	)
}

/// Handles PUT /waiter/update/{id} requests.
async fn handle_update_waiter(
	Path(id): Path<String>,
	State(state): State<AppState>,
	body: Result<Bytes, BytesRejection>,
) -> Result<Json<u64>, ApiError> {
	let result = match (parse_order_id(&id, state.strict_ids()), body) {
		(Err(e), _) => Err(e),
		(Ok(id), body) => match decode_body::<WaiterUpdate>(body) {
			Ok(update) => apis::waiter::update_waiter(&state.collection, &id, update).await,
			Err(e) => Err(e),
		},
	};
	respond("Waiter update", result)
}
