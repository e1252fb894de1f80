//! History Bridge
//!
//! The single owner of session-history mutation. Every entry written through
//! [`HistoryBridge`] carries an envelope holding the router's [`Session`] next to
//! the application's own state:
//!
//! ```json
//! { "__waypoint_session": { "url": "/x?y=1", "base": "/en" }, "state": { "app": true } }
//! ```
//!
//! Application code only ever sees the inner `state`; popstate listeners only
//! ever see the restored [`Session`]. Entries written by someone else carry no
//! envelope and are ignored on popstate.
//!
//! The browser is reached through a [`HistoryBackend`]. Without one (server
//! rendering, native tests without [`MemoryHistory`]) every operation is a
//! silent no-op.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key of the router envelope inside a history entry's state.
pub const SESSION_KEY: &str = "__waypoint_session";

/// Callback a backend invokes with the raw state of a popped entry.
pub type PopStateHandler = Rc<dyn Fn(Option<Value>)>;

/// Navigation type for history changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationType {
	/// The location the router started at.
	#[default]
	Initial,
	/// New history entry.
	Push,
	/// Replace current entry.
	Replace,
	/// Back/forward navigation.
	Pop,
}

/// Navigation snapshot persisted in a history entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Session {
	/// URL without base prefix (path, query and fragment).
	pub url: String,
	/// Base prefix at the time of the write.
	pub base: String,
	/// Application state of the entry.
	#[serde(default)]
	pub state: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct SessionRecord {
	url: String,
	base: String,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
	#[serde(rename = "__waypoint_session")]
	session: SessionRecord,
	#[serde(default)]
	state: Option<Value>,
}

fn wrap(session: &Session) -> Value {
	let envelope = Envelope {
		session: SessionRecord {
			url: session.url.clone(),
			base: session.base.clone(),
		},
		state: session.state.clone(),
	};
	serde_json::to_value(envelope).unwrap_or(Value::Null)
}

fn unwrap_session(raw: &Value) -> Option<Session> {
	if raw.get(SESSION_KEY).is_none() {
		return None;
	}
	let envelope: Envelope = serde_json::from_value(raw.clone()).ok()?;
	Some(Session {
		url: envelope.session.url,
		base: envelope.session.base,
		state: envelope.state,
	})
}

/// Browser session-history primitives.
pub trait HistoryBackend {
	/// Appends an entry.
	fn push_state(&self, state: &Value, url: &str);

	/// Overwrites the current entry.
	fn replace_state(&self, state: &Value, url: &str);

	/// Raw state of the current entry.
	fn state(&self) -> Option<Value>;

	/// Current location as displayed, if any.
	fn href(&self) -> Option<String>;

	/// Installs (or with `None`, removes) the popstate handler.
	fn set_popstate_handler(&self, handler: Option<PopStateHandler>);
}

/// Handle returned by [`HistoryBridge::on_pop_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type PopListener = Rc<dyn Fn(&Session)>;

struct BridgeInner {
	backend: Option<Rc<dyn HistoryBackend>>,
	listeners: RefCell<Vec<(ListenerId, PopListener)>>,
	next_listener: Cell<u64>,
}

impl BridgeInner {
	fn dispatch(&self, raw: Option<Value>) {
		let Some(session) = raw.as_ref().and_then(unwrap_session) else {
			tracing::debug!("ignoring popstate without router session");
			return;
		};
		tracing::debug!(url = %session.url, base = %session.base, "popstate");
		let listeners: Vec<PopListener> = self
			.listeners
			.borrow()
			.iter()
			.map(|(_, listener)| Rc::clone(listener))
			.collect();
		for listener in listeners {
			listener(&session);
		}
	}
}

impl Drop for BridgeInner {
	fn drop(&mut self) {
		if let Some(backend) = &self.backend {
			backend.set_popstate_handler(None);
		}
	}
}

/// Typed facade over the browser history with a session envelope.
///
/// Cloning yields another handle to the same bridge.
#[derive(Clone)]
pub struct HistoryBridge {
	inner: Rc<BridgeInner>,
}

impl fmt::Debug for HistoryBridge {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HistoryBridge")
			.field("headless", &self.is_headless())
			.field("listeners", &self.inner.listeners.borrow().len())
			.finish()
	}
}

impl HistoryBridge {
	/// A bridge with no history; every operation is a no-op.
	pub fn headless() -> Self {
		Self {
			inner: Rc::new(BridgeInner {
				backend: None,
				listeners: RefCell::new(Vec::new()),
				next_listener: Cell::new(0),
			}),
		}
	}

	/// A bridge over `backend`; installs the backend's popstate handler.
	pub fn new<B: HistoryBackend + 'static>(backend: B) -> Self {
		Self::from_backend(Rc::new(backend))
	}

	/// Like [`HistoryBridge::new`] for an already shared backend.
	pub fn from_backend(backend: Rc<dyn HistoryBackend>) -> Self {
		let inner = Rc::new(BridgeInner {
			backend: Some(Rc::clone(&backend)),
			listeners: RefCell::new(Vec::new()),
			next_listener: Cell::new(0),
		});
		let weak: Weak<BridgeInner> = Rc::downgrade(&inner);
		backend.set_popstate_handler(Some(Rc::new(move |raw| {
			if let Some(inner) = weak.upgrade() {
				inner.dispatch(raw);
			}
		})));
		Self { inner }
	}

	/// The browser's history, or a headless bridge when there is none.
	pub fn browser() -> Self {
		#[cfg(all(target_family = "wasm", target_os = "unknown"))]
		{
			match BrowserHistory::new() {
				Some(history) => Self::new(history),
				None => Self::headless(),
			}
		}

		#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
		{
			Self::headless()
		}
	}

	/// Returns `true` when no history backend is attached.
	pub fn is_headless(&self) -> bool {
		self.inner.backend.is_none()
	}

	/// Writes a new entry for `display_url` carrying `session`.
	pub fn push_session(&self, display_url: &str, session: &Session) {
		if let Some(backend) = &self.inner.backend {
			tracing::debug!(url = %display_url, "history push");
			backend.push_state(&wrap(session), display_url);
		}
	}

	/// Overwrites the current entry with `display_url` and `session`.
	pub fn replace_session(&self, display_url: &str, session: &Session) {
		if let Some(backend) = &self.inner.backend {
			tracing::debug!(url = %display_url, "history replace");
			backend.replace_state(&wrap(session), display_url);
		}
	}

	/// Registers a back/forward listener receiving the popped entry's session.
	pub fn on_pop_state<F>(&self, listener: F) -> ListenerId
	where
		F: Fn(&Session) + 'static,
	{
		let id = ListenerId(self.inner.next_listener.get());
		self.inner.next_listener.set(id.0 + 1);
		self.inner
			.listeners
			.borrow_mut()
			.push((id, Rc::new(listener)));
		id
	}

	/// Removes a listener; returns whether it was registered.
	pub fn remove_pop_state(&self, id: ListenerId) -> bool {
		let mut listeners = self.inner.listeners.borrow_mut();
		let before = listeners.len();
		listeners.retain(|(listener, _)| *listener != id);
		listeners.len() != before
	}

	/// Application state of the current entry, envelope removed.
	///
	/// Entries written outside the router expose their raw state.
	pub fn state(&self) -> Option<Value> {
		let raw = self.inner.backend.as_ref()?.state()?;
		match unwrap_session(&raw) {
			Some(session) => session.state,
			None if raw.is_null() => None,
			None => Some(raw),
		}
	}

	/// Router session of the current entry.
	pub fn session(&self) -> Option<Session> {
		let raw = self.inner.backend.as_ref()?.state()?;
		unwrap_session(&raw)
	}

	/// Current displayed location.
	pub fn href(&self) -> Option<String> {
		self.inner.backend.as_ref()?.href()
	}
}

#[derive(Debug, Clone)]
struct MemoryEntry {
	url: String,
	state: Option<Value>,
}

#[derive(Default)]
struct MemoryInner {
	entries: RefCell<Vec<MemoryEntry>>,
	index: Cell<usize>,
	handler: RefCell<Option<PopStateHandler>>,
	pushes: Cell<usize>,
	replaces: Cell<usize>,
}

/// In-memory [`HistoryBackend`] with back/forward support.
///
/// Clones share the same stack, so a test can keep a handle after moving one
/// into a [`HistoryBridge`].
#[derive(Clone, Default)]
pub struct MemoryHistory {
	inner: Rc<MemoryInner>,
}

impl fmt::Debug for MemoryHistory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryHistory")
			.field("entries", &self.inner.entries.borrow())
			.field("index", &self.inner.index.get())
			.finish()
	}
}

impl MemoryHistory {
	/// Creates a stack holding one entry for `url` with no state.
	pub fn new(url: impl Into<String>) -> Self {
		let history = Self::default();
		history.inner.entries.borrow_mut().push(MemoryEntry {
			url: url.into(),
			state: None,
		});
		history
	}

	/// Goes back one entry.
	pub fn back(&self) {
		self.go(-1);
	}

	/// Goes forward one entry.
	pub fn forward(&self) {
		self.go(1);
	}

	/// Moves `delta` entries and fires popstate when the position changed.
	pub fn go(&self, delta: isize) {
		let len = self.inner.entries.borrow().len();
		if len == 0 {
			return;
		}
		let current = self.inner.index.get();
		let target = current.saturating_add_signed(delta).min(len - 1);
		if target == current {
			return;
		}
		self.inner.index.set(target);
		let state = self.inner.entries.borrow()[target].state.clone();
		let handler = self.inner.handler.borrow().clone();
		if let Some(handler) = handler {
			handler(state);
		}
	}

	/// URL of the current entry.
	pub fn current_url(&self) -> Option<String> {
		let index = self.inner.index.get();
		self.inner
			.entries
			.borrow()
			.get(index)
			.map(|entry| entry.url.clone())
	}

	/// Number of entries in the stack.
	pub fn len(&self) -> usize {
		self.inner.entries.borrow().len()
	}

	/// Returns `true` if the stack is empty.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Position of the current entry.
	pub fn index(&self) -> usize {
		self.inner.index.get()
	}

	/// Number of `push_state` calls.
	pub fn push_count(&self) -> usize {
		self.inner.pushes.get()
	}

	/// Number of `replace_state` calls.
	pub fn replace_count(&self) -> usize {
		self.inner.replaces.get()
	}

	/// Total number of history writes.
	pub fn writes(&self) -> usize {
		self.push_count() + self.replace_count()
	}
}

impl HistoryBackend for MemoryHistory {
	fn push_state(&self, state: &Value, url: &str) {
		let mut entries = self.inner.entries.borrow_mut();
		let keep = if entries.is_empty() {
			0
		} else {
			self.inner.index.get() + 1
		};
		entries.truncate(keep);
		entries.push(MemoryEntry {
			url: url.to_string(),
			state: Some(state.clone()),
		});
		self.inner.index.set(entries.len() - 1);
		self.inner.pushes.set(self.inner.pushes.get() + 1);
	}

	fn replace_state(&self, state: &Value, url: &str) {
		let mut entries = self.inner.entries.borrow_mut();
		let entry = MemoryEntry {
			url: url.to_string(),
			state: Some(state.clone()),
		};
		match entries.get_mut(self.inner.index.get()) {
			Some(current) => *current = entry,
			None => entries.push(entry),
		}
		self.inner.replaces.set(self.inner.replaces.get() + 1);
	}

	fn state(&self) -> Option<Value> {
		let index = self.inner.index.get();
		self.inner
			.entries
			.borrow()
			.get(index)
			.and_then(|entry| entry.state.clone())
	}

	fn href(&self) -> Option<String> {
		self.current_url()
	}

	fn set_popstate_handler(&self, handler: Option<PopStateHandler>) {
		*self.inner.handler.borrow_mut() = handler;
	}
}

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub use browser::BrowserHistory;

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
mod browser {
	use std::cell::RefCell;

	use serde_json::Value;
	use wasm_bindgen::JsCast;
	use wasm_bindgen::JsValue;
	use wasm_bindgen::prelude::Closure;

	use super::{HistoryBackend, PopStateHandler};

	type PopStateClosure = Closure<dyn FnMut(web_sys::PopStateEvent)>;

	fn to_js(value: &Value) -> JsValue {
		serde_json::to_string(value)
			.ok()
			.and_then(|json| js_sys::JSON::parse(&json).ok())
			.unwrap_or(JsValue::NULL)
	}

	fn from_js(value: &JsValue) -> Option<Value> {
		if value.is_null() || value.is_undefined() {
			return None;
		}
		let json: String = js_sys::JSON::stringify(value).ok()?.into();
		serde_json::from_str(&json).ok()
	}

	/// [`HistoryBackend`] over `window.history`.
	pub struct BrowserHistory {
		window: web_sys::Window,
		listener: RefCell<Option<PopStateClosure>>,
	}

	impl BrowserHistory {
		/// Returns `None` outside a browser window.
		pub fn new() -> Option<Self> {
			Some(Self {
				window: web_sys::window()?,
				listener: RefCell::new(None),
			})
		}

		fn history(&self) -> Option<web_sys::History> {
			self.window.history().ok()
		}
	}

	impl HistoryBackend for BrowserHistory {
		fn push_state(&self, state: &Value, url: &str) {
			let Some(history) = self.history() else {
				return;
			};
			if let Err(err) = history.push_state_with_url(&to_js(state), "", Some(url)) {
				tracing::warn!(?err, url, "pushState failed");
			}
		}

		fn replace_state(&self, state: &Value, url: &str) {
			let Some(history) = self.history() else {
				return;
			};
			if let Err(err) = history.replace_state_with_url(&to_js(state), "", Some(url)) {
				tracing::warn!(?err, url, "replaceState failed");
			}
		}

		fn state(&self) -> Option<Value> {
			let state = self.history()?.state().ok()?;
			from_js(&state)
		}

		fn href(&self) -> Option<String> {
			self.window.location().href().ok()
		}

		fn set_popstate_handler(&self, handler: Option<PopStateHandler>) {
			if let Some(previous) = self.listener.borrow_mut().take() {
				let _ = self
					.window
					.remove_event_listener_with_callback("popstate", previous.as_ref().unchecked_ref());
			}
			let Some(handler) = handler else {
				return;
			};
			let closure = PopStateClosure::new(move |event: web_sys::PopStateEvent| {
				handler(from_js(&event.state()));
			});
			match self
				.window
				.add_event_listener_with_callback("popstate", closure.as_ref().unchecked_ref())
			{
				Ok(()) => *self.listener.borrow_mut() = Some(closure),
				Err(err) => tracing::warn!(?err, "failed to register popstate listener"),
			}
		}
	}

	impl Drop for BrowserHistory {
		fn drop(&mut self) {
			self.set_popstate_handler(None);
		}
	}
}
