//! Common types module for the order desk.
//!
//! This module defines the data types shared by every crate of the workspace:
//! the order document and its request bodies, the identifier the store assigns,
//! the HTTP error taxonomy, and the primitives used to validate backend
//! configuration.

/// API error taxonomy and the JSON error body.
pub mod api;
/// Order identifiers in the store's native layout.
pub mod id;
/// The order document, request bodies and declarative validation rules.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Result types returned by the persistence gateway.
pub mod storage;
/// Configuration validation types for backend configuration tables.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use id::*;
pub use order::*;
pub use registry::*;
pub use storage::*;
pub use validation::*;
