//! Signal - Observable State Cell
//!
//! `Signal<T>` holds a value and notifies subscribers whenever it is written.
//! There is no implicit dependency tracking: consumers [`subscribe`](Signal::subscribe)
//! explicitly and re-derive whatever they need when notified.
//!
//! ## Example
//!
//! ```ignore
//! use waypoint_core::reactive::Signal;
//!
//! let pending = Signal::new(false);
//! let sub = pending.subscribe({
//!     let pending = pending.clone();
//!     move || println!("pending = {}", pending.get())
//! });
//!
//! pending.set(true); // prints "pending = true"
//! drop(sub);
//! pending.set(false); // nothing printed
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;

extern crate alloc;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;

use super::runtime::{NodeId, Notifier, with_runtime};

type Subscriber = Rc<dyn Fn()>;

struct Inner<T> {
	id: NodeId,
	value: RefCell<T>,
	subscribers: RefCell<Vec<(u64, Subscriber)>>,
	next_subscriber: Cell<u64>,
}

impl<T> Inner<T> {
	fn notify_subscribers(&self) {
		// Snapshot so subscribers may (un)subscribe while being notified.
		let subscribers: Vec<Subscriber> = self
			.subscribers
			.borrow()
			.iter()
			.map(|(_, s)| Rc::clone(s))
			.collect();
		for subscriber in subscribers {
			subscriber();
		}
	}
}

/// An observable value.
///
/// Cloning a `Signal` yields another handle to the same value and subscriber list.
pub struct Signal<T: 'static> {
	inner: Rc<Inner<T>>,
}

impl<T: 'static> Clone for Signal<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Rc::clone(&self.inner),
		}
	}
}

impl<T: 'static> Signal<T> {
	/// Create a new Signal with the given initial value
	pub fn new(value: T) -> Self {
		Self {
			inner: Rc::new(Inner {
				id: NodeId::new(),
				value: RefCell::new(value),
				subscribers: RefCell::new(Vec::new()),
				next_subscriber: Cell::new(0),
			}),
		}
	}

	/// Get a clone of the current value
	pub fn get(&self) -> T
	where
		T: Clone,
	{
		self.inner.value.borrow().clone()
	}

	/// Read the current value through a closure without cloning it
	pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		f(&self.inner.value.borrow())
	}

	/// Replace the value and notify subscribers
	pub fn set(&self, value: T) {
		*self.inner.value.borrow_mut() = value;
		self.notify();
	}

	/// Mutate the value in place and notify subscribers once
	pub fn update<F>(&self, f: F)
	where
		F: FnOnce(&mut T),
	{
		f(&mut *self.inner.value.borrow_mut());
		self.notify();
	}

	/// Replace the value only when it differs; returns whether it changed
	pub fn set_if_changed(&self, value: T) -> bool
	where
		T: PartialEq,
	{
		if *self.inner.value.borrow() == value {
			return false;
		}
		self.set(value);
		true
	}

	/// Register a callback run after every write.
	///
	/// The callback stays registered for as long as the returned
	/// [`Subscription`] is alive.
	#[must_use = "dropping the subscription unsubscribes immediately"]
	pub fn subscribe<F>(&self, f: F) -> Subscription
	where
		F: Fn() + 'static,
	{
		let key = self.inner.next_subscriber.get();
		self.inner.next_subscriber.set(key + 1);
		self.inner
			.subscribers
			.borrow_mut()
			.push((key, Rc::new(f)));

		let weak: Weak<Inner<T>> = Rc::downgrade(&self.inner);
		Subscription {
			cancel: Some(Box::new(move || {
				if let Some(inner) = weak.upgrade() {
					inner.subscribers.borrow_mut().retain(|(k, _)| *k != key);
				}
			})),
		}
	}

	/// Number of live subscriptions
	pub fn subscriber_count(&self) -> usize {
		self.inner.subscribers.borrow().len()
	}

	/// Get the NodeId of this signal
	pub fn id(&self) -> NodeId {
		self.inner.id
	}

	fn notify(&self) {
		let weak = Rc::downgrade(&self.inner);
		let notifier: Notifier = Rc::new(move || {
			if let Some(inner) = weak.upgrade() {
				inner.notify_subscribers();
			}
		});
		with_runtime(|rt| rt.notify(self.inner.id, notifier));
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for Signal<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Signal")
			.field("id", &self.inner.id)
			.field("value", &*self.inner.value.borrow())
			.finish()
	}
}

impl<T: Default + 'static> Default for Signal<T> {
	fn default() -> Self {
		Self::new(T::default())
	}
}

/// Handle keeping a subscriber registered.
///
/// Dropping it (or calling [`Subscription::cancel`]) removes the subscriber.
pub struct Subscription {
	cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
	/// A subscription that is not attached to anything.
	pub fn empty() -> Self {
		Self { cancel: None }
	}

	/// Remove the subscriber now.
	pub fn cancel(mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel();
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel();
		}
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("active", &self.cancel.is_some())
			.finish()
	}
}
