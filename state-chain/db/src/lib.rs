//! The object-database machinery: typed primary indexes keyed by
//! `(space, type, instance)` ids, an undo stack supporting nested sessions,
//! and observer hooks for read-only plugins.
//!
//! This crate is deliberately ignorant of the chain's entity catalog. The
//! chain crate instantiates [`PrimaryIndex`] per entity type and drives
//! [`UndoStack`] with its own snapshot enum.

mod index;
mod observer;
mod undo;

pub use index::{IndexError, PrimaryIndex};
pub use observer::IndexObserver;
pub use undo::{UndoError, UndoStack, UndoState};

/// Objects that live in a primary index.
pub trait DbObject: Clone {
	const SPACE: u8;
	const TYPE: u8;

	/// The instance number of this object within its `(space, type)` index.
	fn instance(&self) -> u64;

	fn object_id(&self) -> onyx_primitives::ObjectId {
		onyx_primitives::ObjectId::new(Self::SPACE, Self::TYPE, self.instance())
	}
}
