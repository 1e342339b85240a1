//! API error types for the order HTTP API.
//!
//! Every failure a handler can produce is one [`ApiError`] variant. Each
//! variant maps to a fixed HTTP status through the constants in [`status`] and
//! is rendered as an [`ErrorResponse`] JSON body.

use crate::InvalidOrderId;
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

/// HTTP status assigned to each error kind.
pub mod status {
	use axum::http::StatusCode;

	/// Unreadable body, malformed JSON or wrong field types.
	pub const DECODE: StatusCode = StatusCode::BAD_REQUEST;
	/// A declarative validation rule failed.
	pub const VALIDATION: StatusCode = StatusCode::BAD_REQUEST;
	/// Malformed id path segment, only raised in strict id mode.
	pub const INVALID_ID: StatusCode = StatusCode::BAD_REQUEST;
	/// Any store failure, including not-found on single-document lookups.
	pub const PERSISTENCE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR;
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Human-readable error message.
	pub error: String,
	/// Per-field details for validation failures.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Errors surfaced by the request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
	/// The request body could not be decoded.
	#[error("{0}")]
	Decode(String),
	/// The decoded body broke a validation rule.
	#[error("{message}")]
	Validation {
		message: String,
		details: Option<serde_json::Value>,
	},
	/// The id path segment is not a valid order id.
	#[error("{0}")]
	InvalidId(String),
	/// The store failed the operation.
	#[error("{0}")]
	Persistence(String),
}

impl ApiError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			ApiError::Decode(_) => status::DECODE,
			ApiError::Validation { .. } => status::VALIDATION,
			ApiError::InvalidId(_) => status::INVALID_ID,
			ApiError::Persistence(_) => status::PERSISTENCE,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let details = match self {
			ApiError::Validation { details, .. } => details.clone(),
			_ => None,
		};
		ErrorResponse {
			error: self.to_string(),
			details,
		}
	}
}

impl From<BytesRejection> for ApiError {
	fn from(rejection: BytesRejection) -> Self {
		ApiError::Decode(rejection.body_text())
	}
}

impl From<serde_json::Error> for ApiError {
	fn from(err: serde_json::Error) -> Self {
		ApiError::Decode(format!("Failed to parse the request body as JSON: {}", err))
	}
}

impl From<ValidationErrors> for ApiError {
	fn from(errors: ValidationErrors) -> Self {
		ApiError::Validation {
			message: errors.to_string(),
			details: serde_json::to_value(&errors).ok(),
		}
	}
}

impl From<InvalidOrderId> for ApiError {
	fn from(err: InvalidOrderId) -> Self {
		ApiError::InvalidId(err.to_string())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status_code(), Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::OrderFields;
	use validator::Validate;

	#[test]
	fn test_status_mapping() {
		assert_eq!(ApiError::Decode("bad".into()).status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(
			ApiError::InvalidId("bad".into()).status_code(),
			StatusCode::BAD_REQUEST
		);
		assert_eq!(
			ApiError::Persistence("down".into()).status_code(),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}

	#[test]
	fn test_validation_error_carries_details() {
		let errors = OrderFields::default().validate().unwrap_err();
		let err = ApiError::from(errors);

		assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
		let body = err.to_error_response();
		assert!(body.error.contains("dish"));
		assert!(body.details.unwrap().get("dish").is_some());
	}

	#[test]
	fn test_error_body_omits_empty_details() {
		let body = ApiError::Persistence("Not found".into()).to_error_response();
		let json = serde_json::to_value(&body).unwrap();
		assert_eq!(json, serde_json::json!({ "error": "Not found" }));
	}

	#[test]
	fn test_json_error_is_a_decode_failure() {
		let err = serde_json::from_str::<OrderFields>("{not json").unwrap_err();
		let err = ApiError::from(err);
		assert!(matches!(err, ApiError::Decode(_)));
		assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
	}

	#[test]
	fn test_invalid_id_message() {
		let err = ApiError::from(InvalidOrderId("nope".to_string()));
		assert!(err.to_string().contains("nope"));
	}
}
