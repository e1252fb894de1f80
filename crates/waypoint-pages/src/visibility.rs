//! Shared viewport observation for `visible` prefetching.
//!
//! All links share one [`VisibilityDispatcher`] per thread. Each link registers
//! a single one-shot callback under its [`ElementKey`]; whatever watches the
//! viewport calls [`VisibilityDispatcher::dispatch`] with that key when the
//! element becomes visible. In the browser that is one shared
//! `IntersectionObserver` ([`DomViewportObserver`]); elsewhere nothing watches
//! and visibility prefetch never fires.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Identity of an observed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey(u64);

impl ElementKey {
	/// A key not handed out before on this thread.
	pub fn next() -> Self {
		thread_local! {
			static NEXT: Cell<u64> = const { Cell::new(0) };
		}
		NEXT.with(|next| {
			let key = next.get();
			next.set(key + 1);
			Self(key)
		})
	}

	/// The raw key value.
	pub fn get(self) -> u64 {
		self.0
	}

	/// Rebuilds a key from [`ElementKey::get`].
	pub fn from_raw(raw: u64) -> Self {
		Self(raw)
	}
}

type VisibleCallback = Rc<dyn Fn()>;

/// Routes visibility notifications to per-element callbacks.
#[derive(Default)]
pub struct VisibilityDispatcher {
	callbacks: RefCell<HashMap<ElementKey, VisibleCallback>>,
}

impl fmt::Debug for VisibilityDispatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("VisibilityDispatcher")
			.field("registered", &self.len())
			.finish()
	}
}

thread_local! {
	static DISPATCHER: Rc<VisibilityDispatcher> = Rc::new(VisibilityDispatcher::default());
}

impl VisibilityDispatcher {
	/// The dispatcher shared by this thread.
	pub fn global() -> Rc<Self> {
		DISPATCHER.with(Rc::clone)
	}

	/// Registers the callback of `key`, replacing a previous one.
	pub fn register<F>(&self, key: ElementKey, callback: F)
	where
		F: Fn() + 'static,
	{
		self.callbacks.borrow_mut().insert(key, Rc::new(callback));
	}

	/// Removes the callback of `key`; returns whether one was registered.
	pub fn unregister(&self, key: ElementKey) -> bool {
		self.callbacks.borrow_mut().remove(&key).is_some()
	}

	/// Runs and removes the callback of `key`.
	pub fn dispatch(&self, key: ElementKey) -> bool {
		let callback = self.callbacks.borrow_mut().remove(&key);
		match callback {
			Some(callback) => {
				callback();
				true
			}
			None => false,
		}
	}

	/// Returns whether `key` has a callback.
	pub fn is_registered(&self, key: ElementKey) -> bool {
		self.callbacks.borrow().contains_key(&key)
	}

	/// Number of registered callbacks.
	pub fn len(&self) -> usize {
		self.callbacks.borrow().len()
	}

	/// Returns `true` if nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub use dom::DomViewportObserver;

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
mod dom {
	use std::rc::Rc;

	use wasm_bindgen::JsCast;
	use wasm_bindgen::prelude::Closure;

	use super::{ElementKey, VisibilityDispatcher};

	/// Attribute carrying the [`ElementKey`] of an observed element.
	const KEY_ATTRIBUTE: &str = "data-waypoint-prefetch";

	type ObserverClosure = Closure<dyn FnMut(js_sys::Array, web_sys::IntersectionObserver)>;

	/// The `IntersectionObserver` shared by all visibility prefetches.
	pub struct DomViewportObserver {
		observer: web_sys::IntersectionObserver,
		_callback: ObserverClosure,
	}

	thread_local! {
		static OBSERVER: Option<Rc<DomViewportObserver>> = DomViewportObserver::create().map(Rc::new);
	}

	impl DomViewportObserver {
		/// The shared observer, `None` where `IntersectionObserver` is unavailable.
		pub fn global() -> Option<Rc<Self>> {
			OBSERVER.with(Clone::clone)
		}

		fn create() -> Option<Self> {
			let callback = ObserverClosure::new(
				|entries: js_sys::Array, observer: web_sys::IntersectionObserver| {
					let dispatcher = VisibilityDispatcher::global();
					for entry in entries.iter() {
						let Ok(entry) = entry.dyn_into::<web_sys::IntersectionObserverEntry>() else {
							continue;
						};
						if !entry.is_intersecting() {
							continue;
						}
						let target = entry.target();
						observer.unobserve(&target);
						let key = target
							.get_attribute(KEY_ATTRIBUTE)
							.and_then(|raw| raw.parse::<u64>().ok())
							.map(ElementKey::from_raw);
						if let Some(key) = key {
							dispatcher.dispatch(key);
						}
					}
				},
			);
			match web_sys::IntersectionObserver::new(callback.as_ref().unchecked_ref()) {
				Ok(observer) => Some(Self {
					observer,
					_callback: callback,
				}),
				Err(err) => {
					tracing::warn!(?err, "IntersectionObserver unavailable, visible prefetch disabled");
					None
				}
			}
		}

		/// Starts watching `element` for `key`.
		pub fn observe(&self, element: &web_sys::Element, key: ElementKey) {
			if element
				.set_attribute(KEY_ATTRIBUTE, &key.get().to_string())
				.is_ok()
			{
				self.observer.observe(element);
			}
		}

		/// Stops watching `element`.
		pub fn unobserve(&self, element: &web_sys::Element) {
			self.observer.unobserve(element);
		}
	}
}
