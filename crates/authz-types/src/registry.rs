//! Registry trait for self-registering backend implementations.

/// Ties a backend implementation to the name it is selected by in configuration.
///
/// Each backend module (storage, account, delivery, relay) exposes a `Registry`
/// unit struct implementing this trait, e.g. `"file"` for
/// `[storage.implementations.file]` or `"http"` for `[relayer.implementations.http]`.
pub trait ImplementationRegistry {
	/// Configuration name of the implementation.
	const NAME: &'static str;

	/// Factory function type of the owning module.
	type Factory;

	fn factory() -> Self::Factory;
}
