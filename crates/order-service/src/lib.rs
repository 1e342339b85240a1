//! Order desk HTTP service.
//!
//! Exposes the router and state so the binary and the integration tests
//! build the same application.

pub mod apis;
pub mod factory_registry;
pub mod server;

pub use factory_registry::{build_collection, get_registry};
pub use server::{build_router, start_server, AppState};
