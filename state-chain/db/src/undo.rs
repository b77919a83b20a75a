use onyx_primitives::ObjectId;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum UndoError {
	#[error("no active undo session")]
	NoActiveSession,
	#[error("operation requires all sessions to be committed")]
	ActiveSessions,
	#[error("undo stack is empty")]
	EmptyStack,
	#[error("merge requires at least two states on the stack")]
	TooFewStates,
}

/// Everything needed to roll the database back to where it was when the
/// owning session started.
#[derive(Debug, Clone, Default)]
pub struct UndoState<A> {
	/// Prior full values of entities that were mutated or removed but
	/// already existed at session start.
	pub old_values: BTreeMap<ObjectId, A>,
	/// Entities deleted in this session that were not created in it.
	pub removed: BTreeMap<ObjectId, A>,
	/// Entities created in this session.
	pub new_ids: BTreeSet<ObjectId>,
	/// Per-index next-instance counters as of the first create in this
	/// session.
	pub old_index_next_ids: BTreeMap<(u8, u8), u64>,
}

impl<A> UndoState<A> {
	fn new() -> Self {
		Self {
			old_values: BTreeMap::new(),
			removed: BTreeMap::new(),
			new_ids: BTreeSet::new(),
			old_index_next_ids: BTreeMap::new(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.old_values.is_empty() &&
			self.removed.is_empty() &&
			self.new_ids.is_empty() &&
			self.old_index_next_ids.is_empty()
	}
}

/// The undo bookkeeping state machine.
///
/// This type records *what* must be restored; applying a popped
/// [`UndoState`] back onto the indexes is the owning database's job, since
/// only it can dispatch snapshots to typed indexes.
///
/// Committed per-session states are retained on the stack (one per applied
/// block) so the chain can rewind whole blocks during reorganization; the
/// stack is trimmed to `max_size` at session start.
#[derive(Debug, Default)]
pub struct UndoStack<A> {
	stack: VecDeque<UndoState<A>>,
	active_sessions: u32,
	disabled: bool,
	max_size: usize,
}

impl<A: Clone> UndoStack<A> {
	pub fn new(max_size: usize) -> Self {
		Self { stack: VecDeque::new(), active_sessions: 0, disabled: false, max_size }
	}

	pub fn enable(&mut self) {
		self.disabled = false;
	}

	pub fn disable(&mut self) {
		self.disabled = true;
	}

	pub fn is_disabled(&self) -> bool {
		self.disabled
	}

	pub fn active_sessions(&self) -> u32 {
		self.active_sessions
	}

	pub fn size(&self) -> usize {
		self.stack.len()
	}

	pub fn set_max_size(&mut self, max_size: usize) {
		self.max_size = max_size;
	}

	pub fn max_size(&self) -> usize {
		self.max_size
	}

	pub fn head(&self) -> Option<&UndoState<A>> {
		self.stack.back()
	}

	/// Opens a new session. Old committed states beyond the retention window
	/// are discarded from the front.
	pub fn start_session(&mut self) {
		while self.stack.len() > self.max_size {
			self.stack.pop_front();
		}
		self.stack.push_back(UndoState::new());
		self.active_sessions += 1;
	}

	fn recording_state(&mut self) -> &mut UndoState<A> {
		if self.stack.is_empty() {
			self.stack.push_back(UndoState::new());
		}
		self.stack.back_mut().expect("just ensured non-empty")
	}

	/// Records a creation. `prev_next_instance` is the index's counter value
	/// before the create, i.e. the created object's own instance.
	pub fn on_create(&mut self, id: ObjectId, prev_next_instance: u64) {
		if self.disabled {
			return;
		}
		let state = self.recording_state();
		state.old_index_next_ids.entry(id.index_key()).or_insert(prev_next_instance);
		state.new_ids.insert(id);
	}

	/// Records a modification. `snapshot` is only invoked if this session
	/// has no prior record for the id.
	pub fn on_modify(&mut self, id: ObjectId, snapshot: impl FnOnce() -> A) {
		if self.disabled {
			return;
		}
		let state = self.recording_state();
		if state.new_ids.contains(&id) || state.old_values.contains_key(&id) {
			return;
		}
		state.old_values.insert(id, snapshot());
	}

	/// Records a removal. A create-then-remove within one session cancels
	/// both facts.
	pub fn on_remove(&mut self, id: ObjectId, snapshot: impl FnOnce() -> A) {
		if self.disabled {
			return;
		}
		let state = self.recording_state();
		if state.new_ids.remove(&id) {
			return;
		}
		if let Some(old) = state.old_values.remove(&id) {
			state.removed.insert(id, old);
			return;
		}
		if state.removed.contains_key(&id) {
			return;
		}
		state.removed.insert(id, snapshot());
	}

	/// Closes the innermost session keeping its effects. The recorded state
	/// stays on the stack so the whole session can still be rewound later
	/// (e.g. popping an applied block).
	pub fn commit(&mut self) -> Result<(), UndoError> {
		if self.active_sessions == 0 {
			return Err(UndoError::NoActiveSession);
		}
		self.active_sessions -= 1;
		Ok(())
	}

	/// Detaches the innermost session's record for the caller to apply in
	/// reverse. Restores the baseline invariant of a non-empty stack.
	pub fn pop_for_undo(&mut self) -> Result<UndoState<A>, UndoError> {
		if self.active_sessions == 0 {
			return Err(UndoError::NoActiveSession);
		}
		let state = self.stack.pop_back().ok_or(UndoError::EmptyStack)?;
		if self.stack.is_empty() {
			self.stack.push_back(UndoState::new());
		}
		self.active_sessions -= 1;
		Ok(state)
	}

	/// Detaches the newest *committed* state, used to rewind one applied
	/// block when no sessions are open.
	pub fn pop_committed(&mut self) -> Result<UndoState<A>, UndoError> {
		if self.active_sessions != 0 {
			return Err(UndoError::ActiveSessions);
		}
		self.stack.pop_back().ok_or(UndoError::EmptyStack)
	}

	/// Merges the innermost session's diffs into its parent, closing the
	/// inner session.
	pub fn merge(&mut self) -> Result<(), UndoError> {
		if self.active_sessions == 0 {
			return Err(UndoError::NoActiveSession);
		}
		if self.stack.len() < 2 {
			return Err(UndoError::TooFewStates);
		}
		let state = self.stack.pop_back().expect("len checked");
		let prev = self.stack.back_mut().expect("len checked");

		for (id, value) in state.old_values {
			if prev.new_ids.contains(&id) {
				continue;
			}
			prev.old_values.entry(id).or_insert(value);
		}
		for id in state.new_ids {
			prev.new_ids.insert(id);
		}
		for (key, next) in state.old_index_next_ids {
			prev.old_index_next_ids.entry(key).or_insert(next);
		}
		for (id, value) in state.removed {
			if prev.new_ids.remove(&id) {
				continue;
			}
			// Keep the oldest snapshot: if the parent already recorded a
			// prior value for the id, that is the one to reinstall.
			let snapshot = prev.old_values.remove(&id).unwrap_or(value);
			prev.removed.entry(id).or_insert(snapshot);
		}
		self.active_sessions -= 1;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id(instance: u64) -> ObjectId {
		ObjectId::new(0, 1, instance)
	}

	#[test]
	fn modify_records_only_the_first_prior_value() {
		let mut undo = UndoStack::<u32>::new(8);
		undo.start_session();
		undo.on_modify(id(1), || 10);
		undo.on_modify(id(1), || 20);
		assert_eq!(undo.head().unwrap().old_values[&id(1)], 10);
	}

	#[test]
	fn create_then_remove_cancels() {
		let mut undo = UndoStack::<u32>::new(8);
		undo.start_session();
		undo.on_create(id(5), 5);
		undo.on_remove(id(5), || 99);
		let head = undo.head().unwrap();
		assert!(head.new_ids.is_empty());
		assert!(head.removed.is_empty());
	}

	#[test]
	fn modify_after_create_is_not_recorded() {
		let mut undo = UndoStack::<u32>::new(8);
		undo.start_session();
		undo.on_create(id(5), 5);
		undo.on_modify(id(5), || 1);
		assert!(undo.head().unwrap().old_values.is_empty());
	}

	#[test]
	fn remove_after_modify_keeps_the_prior_value() {
		let mut undo = UndoStack::<u32>::new(8);
		undo.start_session();
		undo.on_modify(id(2), || 7);
		undo.on_remove(id(2), || 8);
		let head = undo.head().unwrap();
		assert!(head.old_values.is_empty());
		assert_eq!(head.removed[&id(2)], 7);
	}

	#[test]
	fn nested_merge_prefers_parent_records() {
		let mut undo = UndoStack::<u32>::new(8);
		undo.start_session();
		undo.on_modify(id(1), || 100);
		undo.start_session();
		undo.on_modify(id(1), || 150);
		undo.on_modify(id(2), || 200);
		undo.merge().unwrap();
		let head = undo.head().unwrap();
		assert_eq!(head.old_values[&id(1)], 100);
		assert_eq!(head.old_values[&id(2)], 200);
		assert_eq!(undo.active_sessions(), 1);
	}

	#[test]
	fn merge_cancels_parent_creation_on_child_removal() {
		let mut undo = UndoStack::<u32>::new(8);
		undo.start_session();
		undo.on_create(id(3), 3);
		undo.start_session();
		undo.on_remove(id(3), || 30);
		undo.merge().unwrap();
		let head = undo.head().unwrap();
		assert!(head.new_ids.is_empty());
		assert!(head.removed.is_empty());
	}

	#[test]
	fn merge_moves_parent_old_value_into_removed() {
		let mut undo = UndoStack::<u32>::new(8);
		undo.start_session();
		undo.on_modify(id(4), || 40);
		undo.start_session();
		undo.on_remove(id(4), || 44);
		undo.merge().unwrap();
		let head = undo.head().unwrap();
		assert!(head.old_values.is_empty());
		assert_eq!(head.removed[&id(4)], 40);
	}

	#[test]
	fn next_id_snapshot_is_first_create_per_session() {
		let mut undo = UndoStack::<u32>::new(8);
		undo.start_session();
		undo.on_create(id(10), 10);
		undo.on_create(id(11), 11);
		assert_eq!(undo.head().unwrap().old_index_next_ids[&(0, 1)], 10);
	}

	#[test]
	fn commit_keeps_state_for_block_rewind() {
		let mut undo = UndoStack::<u32>::new(8);
		undo.start_session();
		undo.on_modify(id(1), || 1);
		undo.commit().unwrap();
		assert_eq!(undo.active_sessions(), 0);
		assert_eq!(undo.size(), 1);
		let popped = undo.pop_committed().unwrap();
		assert_eq!(popped.old_values[&id(1)], 1);
	}

	#[test]
	fn stack_depth_matches_outstanding_sessions() {
		let mut undo = UndoStack::<u32>::new(8);
		undo.start_session();
		undo.start_session();
		undo.start_session();
		assert_eq!(undo.active_sessions(), 3);
		assert_eq!(undo.size(), 3);
		undo.pop_for_undo().unwrap();
		assert_eq!(undo.active_sessions(), 2);
	}

	#[test]
	fn retention_window_trims_oldest_states() {
		let mut undo = UndoStack::<u32>::new(2);
		for _ in 0..5 {
			undo.start_session();
			undo.commit().unwrap();
		}
		assert!(undo.size() <= 3);
	}
}
