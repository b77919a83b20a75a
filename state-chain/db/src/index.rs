use crate::DbObject;
use onyx_primitives::ObjectId;
use std::collections::BTreeMap;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
	#[error("object {0} not found")]
	NotFound(ObjectId),
	#[error("constructor produced instance {got} but {expected} was assigned")]
	IdMismatch { expected: u64, got: u64 },
	#[error("instance {0} already occupied")]
	DuplicateInstance(u64),
	#[error("instance counter exhausted")]
	OutOfInstanceIds,
}

/// Maps instance numbers to entities of a single `(space, type)` pair and
/// owns the monotone next-instance counter.
///
/// Iteration order is instance order, which is creation order; everything
/// downstream relies on that determinism.
#[derive(Debug, Clone)]
pub struct PrimaryIndex<T: DbObject> {
	entries: BTreeMap<u64, T>,
	next_instance: u64,
}

impl<T: DbObject> Default for PrimaryIndex<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: DbObject> PrimaryIndex<T> {
	pub fn new() -> Self {
		Self { entries: BTreeMap::new(), next_instance: 0 }
	}

	/// Builds a new entity via `ctor`, which receives the assigned instance
	/// number exactly once and must store it in the returned value.
	pub fn create(&mut self, ctor: impl FnOnce(u64) -> T) -> Result<&T, IndexError> {
		let instance = self.next_instance;
		if instance == u64::MAX {
			return Err(IndexError::OutOfInstanceIds);
		}
		let obj = ctor(instance);
		if obj.instance() != instance {
			return Err(IndexError::IdMismatch { expected: instance, got: obj.instance() });
		}
		self.next_instance = instance + 1;
		Ok(self.entries.entry(instance).or_insert(obj))
	}

	/// Reinstalls an entity under its existing instance, e.g. when rolling
	/// back a removal. The counter is not advanced.
	pub fn insert(&mut self, obj: T) -> Result<&T, IndexError> {
		let instance = obj.instance();
		if self.entries.contains_key(&instance) {
			return Err(IndexError::DuplicateInstance(instance));
		}
		Ok(self.entries.entry(instance).or_insert(obj))
	}

	pub fn get(&self, instance: u64) -> Option<&T> {
		self.entries.get(&instance)
	}

	/// Runs `mutator` on a writable alias of the entity. The caller is
	/// responsible for having recorded an undo snapshot first.
	pub fn modify(&mut self, instance: u64, mutator: impl FnOnce(&mut T)) -> Result<&T, IndexError> {
		let obj = self
			.entries
			.get_mut(&instance)
			.ok_or_else(|| IndexError::NotFound(ObjectId::new(T::SPACE, T::TYPE, instance)))?;
		mutator(obj);
		if obj.instance() != instance {
			return Err(IndexError::IdMismatch { expected: instance, got: obj.instance() });
		}
		Ok(obj)
	}

	pub fn remove(&mut self, instance: u64) -> Option<T> {
		self.entries.remove(&instance)
	}

	pub fn contains(&self, instance: u64) -> bool {
		self.entries.contains_key(&instance)
	}

	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.entries.values()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn next_instance(&self) -> u64 {
		self.next_instance
	}

	/// Rewinds the counter during undo. Never moves forward.
	pub fn set_next_instance(&mut self, next: u64) {
		debug_assert!(next <= self.next_instance);
		self.next_instance = next;
	}
}
