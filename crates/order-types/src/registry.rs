//! Naming contract for pluggable backends.

/// Ties a backend module to the key it is configured under.
///
/// `NAME` is the key of the backend table, e.g. `"file"` for
/// `[storage.implementations.file]`.
pub trait ImplementationRegistry {
	const NAME: &'static str;

	/// Constructor signature shared by every backend of one kind.
	type Factory;

	fn factory() -> Self::Factory;
}
