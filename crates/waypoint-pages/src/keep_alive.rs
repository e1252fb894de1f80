//! Keep-alive registry.
//!
//! Retains the mounted subtrees of deactivated routes so reactivation can
//! reuse them. Entries are kept newest first. When a capacity is configured,
//! unmounted entries past it are evicted (oldest first) and their release hook
//! runs exactly once. Mounted entries are never evicted.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Hook run when an element leaves the registry.
pub type ReleaseHook = Box<dyn FnOnce()>;

/// A retained subtree.
pub struct KeepAliveElement {
	id: String,
	subtree: Rc<dyn Any>,
	unmounted: Cell<bool>,
	release: RefCell<Option<ReleaseHook>>,
}

impl KeepAliveElement {
	/// Wraps a mounted subtree.
	pub fn new<T: Any>(id: impl Into<String>, subtree: T) -> Self {
		Self {
			id: id.into(),
			subtree: Rc::new(subtree),
			unmounted: Cell::new(false),
			release: RefCell::new(None),
		}
	}

	/// Sets the hook run on eviction or removal.
	pub fn on_release<F>(self, hook: F) -> Self
	where
		F: FnOnce() + 'static,
	{
		*self.release.borrow_mut() = Some(Box::new(hook));
		self
	}

	/// The element id.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// The retained subtree.
	pub fn subtree(&self) -> Rc<dyn Any> {
		Rc::clone(&self.subtree)
	}

	/// The retained subtree, if it has type `T`.
	pub fn subtree_as<T: Any>(&self) -> Option<Rc<T>> {
		Rc::clone(&self.subtree).downcast::<T>().ok()
	}

	/// Whether the subtree is currently detached.
	pub fn is_unmounted(&self) -> bool {
		self.unmounted.get()
	}

	fn release(&self) {
		let hook = self.release.borrow_mut().take();
		if let Some(hook) = hook {
			hook();
		}
	}
}

impl fmt::Debug for KeepAliveElement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeepAliveElement")
			.field("id", &self.id)
			.field("unmounted", &self.unmounted.get())
			.finish()
	}
}

/// Bounded store of [`KeepAliveElement`]s.
#[derive(Default)]
pub struct KeepAliveRegistry {
	max: Option<usize>,
	elements: RefCell<Vec<Rc<KeepAliveElement>>>,
}

impl fmt::Debug for KeepAliveRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeepAliveRegistry")
			.field("max", &self.max)
			.field("elements", &self.elements.borrow())
			.finish()
	}
}

impl KeepAliveRegistry {
	/// Creates a registry, unbounded when `max` is `None`.
	pub fn new(max: Option<usize>) -> Self {
		Self {
			max,
			elements: RefCell::new(Vec::new()),
		}
	}

	/// The capacity bound.
	pub fn max(&self) -> Option<usize> {
		self.max
	}

	/// Prepends `element`, then evicts unmounted overflow.
	pub fn insert(&self, element: KeepAliveElement) -> Rc<KeepAliveElement> {
		let element = Rc::new(element);
		self.elements.borrow_mut().insert(0, Rc::clone(&element));
		self.evict_overflow();
		element
	}

	/// Removes `id` and runs its release hook.
	pub fn remove(&self, id: &str) -> bool {
		let removed = {
			let mut elements = self.elements.borrow_mut();
			elements
				.iter()
				.position(|element| element.id == id)
				.map(|index| elements.remove(index))
		};
		match removed {
			Some(element) => {
				element.release();
				true
			}
			None => false,
		}
	}

	/// The element `id`.
	pub fn get(&self, id: &str) -> Option<Rc<KeepAliveElement>> {
		self.elements
			.borrow()
			.iter()
			.find(|element| element.id == id)
			.cloned()
	}

	/// Marks `id` mounted, creating it with `make` on first activation.
	pub fn activate<F>(&self, id: &str, make: F) -> Rc<KeepAliveElement>
	where
		F: FnOnce() -> KeepAliveElement,
	{
		match self.get(id) {
			Some(element) => {
				element.unmounted.set(false);
				element
			}
			None => self.insert(make()),
		}
	}

	/// Marks `id` unmounted; evicts it at once if it sits past the bound.
	pub fn deactivate(&self, id: &str) {
		if let Some(element) = self.get(id) {
			element.unmounted.set(true);
			self.evict_overflow();
		}
	}

	/// Ids in retention order, newest first.
	pub fn ids(&self) -> Vec<String> {
		self.elements
			.borrow()
			.iter()
			.map(|element| element.id.clone())
			.collect()
	}

	/// Number of retained elements.
	pub fn len(&self) -> usize {
		self.elements.borrow().len()
	}

	/// Returns `true` if nothing is retained.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Releases every element.
	pub fn clear(&self) {
		let drained: Vec<_> = self.elements.borrow_mut().drain(..).collect();
		for element in drained {
			element.release();
		}
	}

	fn evict_overflow(&self) {
		let Some(max) = self.max else {
			return;
		};
		let evicted = {
			let mut elements = self.elements.borrow_mut();
			let mut evicted = Vec::new();
			while elements.len() > max {
				let oldest = elements
					.iter()
					.enumerate()
					.skip(max)
					.rev()
					.find(|(_, element)| element.unmounted.get())
					.map(|(index, _)| index);
				match oldest {
					Some(index) => evicted.push(elements.remove(index)),
					None => break,
				}
			}
			evicted
		};
		for element in evicted {
			tracing::debug!(id = %element.id, "evicting keep-alive element");
			element.release();
		}
	}
}

impl Drop for KeepAliveRegistry {
	fn drop(&mut self) {
		self.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn tracked(id: &str, released: &Rc<RefCell<Vec<String>>>) -> KeepAliveElement {
		let released = Rc::clone(released);
		let name = id.to_string();
		KeepAliveElement::new(id, ()).on_release(move || released.borrow_mut().push(name))
	}

	#[rstest]
	fn test_third_unmounted_entry_evicts_oldest() {
		let released = Rc::new(RefCell::new(Vec::new()));
		let registry = KeepAliveRegistry::new(Some(2));

		for id in ["a", "b"] {
			registry.insert(tracked(id, &released));
			registry.deactivate(id);
		}
		registry.insert(tracked("c", &released));
		registry.deactivate("c");

		assert_eq!(registry.ids(), vec!["c", "b"]);
		assert_eq!(*released.borrow(), vec!["a".to_string()]);
	}

	#[rstest]
	fn test_mounted_entries_are_never_evicted() {
		let released = Rc::new(RefCell::new(Vec::new()));
		let registry = KeepAliveRegistry::new(Some(1));

		registry.insert(tracked("a", &released));
		registry.insert(tracked("b", &released));
		registry.insert(tracked("c", &released));

		assert_eq!(registry.len(), 3);
		assert!(released.borrow().is_empty());

		registry.deactivate("a");
		assert_eq!(registry.ids(), vec!["c", "b"]);
		assert_eq!(*released.borrow(), vec!["a".to_string()]);
	}

	#[rstest]
	fn test_unmounted_entry_within_bound_is_kept() {
		let released = Rc::new(RefCell::new(Vec::new()));
		let registry = KeepAliveRegistry::new(Some(2));

		registry.insert(tracked("a", &released));
		registry.insert(tracked("b", &released));
		registry.deactivate("b");
		registry.insert(tracked("c", &released));

		assert_eq!(registry.ids(), vec!["c", "b", "a"]);
		assert!(released.borrow().is_empty());

		registry.deactivate("a");
		assert_eq!(registry.ids(), vec!["c", "b"]);
		assert_eq!(*released.borrow(), vec!["a".to_string()]);
	}

	#[rstest]
	fn test_remove_always_releases() {
		let released = Rc::new(RefCell::new(Vec::new()));
		let registry = KeepAliveRegistry::new(None);
		registry.insert(tracked("a", &released));

		assert!(registry.remove("a"));
		assert!(!registry.remove("a"));
		assert_eq!(*released.borrow(), vec!["a".to_string()]);
	}

	#[rstest]
	fn test_activate_reuses_element() {
		let registry = KeepAliveRegistry::new(Some(2));
		let first = registry.activate("page", || KeepAliveElement::new("page", 41_u32));
		registry.deactivate("page");
		assert!(first.is_unmounted());

		let second = registry.activate("page", || KeepAliveElement::new("page", 0_u32));
		assert!(Rc::ptr_eq(&first, &second));
		assert!(!second.is_unmounted());
		assert_eq!(second.subtree_as::<u32>().map(|v| *v), Some(41));
	}

	#[rstest]
	fn test_drop_releases_everything() {
		let released = Rc::new(RefCell::new(Vec::new()));
		{
			let registry = KeepAliveRegistry::new(None);
			registry.insert(tracked("a", &released));
			registry.insert(tracked("b", &released));
		}
		assert_eq!(released.borrow().len(), 2);
	}
}
