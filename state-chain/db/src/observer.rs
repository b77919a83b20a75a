/// Read-only hooks invoked synchronously, in registration order, after the
/// database mutates an entity. Observers must never mutate chain state;
/// errors they return are logged by the caller and suppressed.
pub trait IndexObserver<A> {
	fn on_add(&mut self, obj: &A) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

	fn on_modify(&mut self, obj: &A) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

	fn on_remove(&mut self, obj: &A) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
