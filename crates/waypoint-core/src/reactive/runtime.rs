//! Notification Runtime
//!
//! Keeps the per-thread bookkeeping shared by every [`Signal`](super::Signal):
//! node identifiers and the batch queue.
//!
//! ## Batching
//!
//! Navigation updates several signals at once (url, app state, history action).
//! Observers must never see one of them changed without the others, so writes
//! made inside [`batch`] only enqueue their notification. The queue is flushed
//! once, when the outermost batch returns, with each signal notified at most once
//! in the order it was first written.
//!
//! ```ignore
//! use waypoint_core::reactive::{Signal, batch};
//!
//! let url = Signal::new("/".to_string());
//! let state = Signal::new(None::<u32>);
//!
//! batch(|| {
//!     url.set("/users".to_string());
//!     state.set(Some(1));
//! });
//! ```

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicUsize, Ordering};

extern crate alloc;
use alloc::rc::Rc;
use alloc::vec::Vec;

/// Unique identifier for observable nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
	/// Create a new unique NodeId
	pub fn new() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl Default for NodeId {
	fn default() -> Self {
		Self::new()
	}
}

/// Deferred notification for one node.
pub(crate) type Notifier = Rc<dyn Fn()>;

/// Per-thread notification runtime.
pub(crate) struct Runtime {
	/// Nesting depth of active `batch` calls
	depth: Cell<usize>,
	/// Notifications deferred until the outermost batch ends
	pending: RefCell<Vec<(NodeId, Notifier)>>,
}

thread_local! {
	static RUNTIME: Runtime = Runtime {
		depth: Cell::new(0),
		pending: RefCell::new(Vec::new()),
	};
}

impl Runtime {
	/// Runs `notifier` now, or queues it when a batch is open.
	pub(crate) fn notify(&self, id: NodeId, notifier: Notifier) {
		if self.depth.get() == 0 {
			notifier();
			return;
		}
		let mut pending = self.pending.borrow_mut();
		if !pending.iter().any(|(queued, _)| *queued == id) {
			pending.push((id, notifier));
		}
	}

	fn enter(&self) {
		self.depth.set(self.depth.get() + 1);
	}

	/// Leaves one batch level; returns the queue when the outermost level closes.
	fn exit(&self) -> Vec<(NodeId, Notifier)> {
		let depth = self.depth.get().saturating_sub(1);
		self.depth.set(depth);
		if depth == 0 {
			core::mem::take(&mut *self.pending.borrow_mut())
		} else {
			Vec::new()
		}
	}

	pub(crate) fn is_batching(&self) -> bool {
		self.depth.get() > 0
	}
}

/// Access the thread-local runtime.
pub(crate) fn with_runtime<R>(f: impl FnOnce(&Runtime) -> R) -> R {
	RUNTIME.with(f)
}

/// Closes one batch level even if the batched closure panics.
struct BatchGuard;

impl Drop for BatchGuard {
	fn drop(&mut self) {
		let flushed = with_runtime(Runtime::exit);
		if !flushed.is_empty() {
			tracing::trace!(count = flushed.len(), "flushing batched notifications");
		}
		for (_, notifier) in flushed {
			notifier();
		}
	}
}

/// Groups signal writes so that observers are notified once, after all of them.
///
/// Nested calls join the outermost batch.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
	with_runtime(Runtime::enter);
	let _guard = BatchGuard;
	f()
}

/// Returns `true` while a [`batch`] is open on this thread.
pub fn is_batching() -> bool {
	with_runtime(Runtime::is_batching)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_node_ids_are_unique() {
		let a = NodeId::new();
		let b = NodeId::new();
		assert_ne!(a, b);
	}

	#[rstest]
	fn test_notify_runs_immediately_outside_batch() {
		let hits = Rc::new(Cell::new(0));
		let counter = Rc::clone(&hits);
		with_runtime(|rt| rt.notify(NodeId::new(), Rc::new(move || counter.set(counter.get() + 1))));
		assert_eq!(hits.get(), 1);
	}

	#[rstest]
	fn test_batch_deduplicates_by_node() {
		let hits = Rc::new(Cell::new(0));
		let id = NodeId::new();
		batch(|| {
			for _ in 0..3 {
				let counter = Rc::clone(&hits);
				with_runtime(|rt| rt.notify(id, Rc::new(move || counter.set(counter.get() + 1))));
			}
			assert_eq!(hits.get(), 0);
		});
		assert_eq!(hits.get(), 1);
	}

	#[rstest]
	fn test_nested_batch_flushes_at_outermost_level() {
		let hits = Rc::new(Cell::new(0));
		batch(|| {
			batch(|| {
				let counter = Rc::clone(&hits);
				with_runtime(|rt| rt.notify(NodeId::new(), Rc::new(move || counter.set(counter.get() + 1))));
			});
			assert!(is_batching());
			assert_eq!(hits.get(), 0);
		});
		assert!(!is_batching());
		assert_eq!(hits.get(), 1);
	}
}
