//! Navigation Store
//!
//! Owns the navigation state of one router: current URL (base removed), base
//! prefix, application state, pending flag and the kind of the last history
//! change. Each piece is its own [`Signal`] so the rendering layer can observe
//! them independently.
//!
//! State changes through [`NavigationStore::navigate`],
//! [`NavigationStore::change_base`] and popstate intake only. The first two
//! write history before touching any signal, and every change of several
//! signals happens inside one [`batch`], so observers see url and state move
//! together and can rely on the address bar already showing the new location.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use url::Url;
use waypoint_core::{Signal, batch};
use waypoint_urls::{
	Location, join_base, parse_url, relative_href, set_query_param, strip_base, trim_trailing_slash,
};

use crate::error::{RouterError, RouterResult};
use crate::history::{HistoryBridge, ListenerId, NavigationType, Session};
use crate::settings::RouterSettings;

/// Arguments of [`NavigationStore::navigate`].
///
/// # Example
///
/// ```ignore
/// store.navigate(
///     NavigateOptions::new("/search")
///         .query("q", "rust")
///         .hash("results")
///         .state(serde_json::json!({ "from": "header" })),
/// )?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigateOptions {
	/// Target, resolved relative to the current URL.
	pub url: String,
	/// Query parameters set on the target, each overwriting an existing key.
	pub query_params: Vec<(String, String)>,
	/// Fragment of the target.
	pub hash: Option<String>,
	/// Replace the current history entry instead of pushing a new one.
	pub replace: bool,
	/// Application state stored with the entry.
	pub state: Option<Value>,
}

impl NavigateOptions {
	/// Navigation to `url` with no extras.
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			..Self::default()
		}
	}

	/// Sets query parameter `key`.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query_params.push((key.into(), value.into()));
		self
	}

	/// Sets the fragment.
	pub fn hash(mut self, hash: impl Into<String>) -> Self {
		self.hash = Some(hash.into());
		self
	}

	/// Replaces the current entry.
	pub fn replace(mut self, replace: bool) -> Self {
		self.replace = replace;
		self
	}

	/// Attaches application state.
	pub fn state(mut self, state: Value) -> Self {
		self.state = Some(state);
		self
	}
}

impl From<&str> for NavigateOptions {
	fn from(url: &str) -> Self {
		Self::new(url)
	}
}

impl From<String> for NavigateOptions {
	fn from(url: String) -> Self {
		Self::new(url)
	}
}

struct StoreInner {
	url: Signal<Url>,
	base: Signal<String>,
	state: Signal<Option<Value>>,
	pending: Signal<bool>,
	in_flight: Cell<usize>,
	action: Signal<NavigationType>,
	bridge: HistoryBridge,
	listener: Cell<Option<ListenerId>>,
}

impl StoreInner {
	fn apply_session(&self, session: &Session) {
		let url = match self.url.with(|current| current.join(&session.url)) {
			Ok(url) => url,
			Err(err) => {
				tracing::warn!(url = %session.url, error = %err, "ignoring popstate with invalid url");
				return;
			}
		};
		batch(|| {
			self.url.set(url);
			self.base.set_if_changed(session.base.clone());
			self.state.set(session.state.clone());
			self.action.set(NavigationType::Pop);
		});
	}
}

impl Drop for StoreInner {
	fn drop(&mut self) {
		if let Some(id) = self.listener.take() {
			self.bridge.remove_pop_state(id);
		}
	}
}

/// Navigation state of one router root.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct NavigationStore {
	inner: Rc<StoreInner>,
}

impl fmt::Debug for NavigationStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NavigationStore")
			.field("url", &self.inner.url.with(|url| url.to_string()))
			.field("base", &self.inner.base.get())
			.field("pending", &self.inner.pending.get())
			.finish()
	}
}

impl NavigationStore {
	/// Creates the store and synchronizes it with the current history entry.
	///
	/// The initial URL is `settings.url` or, failing that, the bridge's current
	/// location. Its base prefix is stripped, the entry's application state is
	/// adopted, and the entry is rewritten with a session so that coming back
	/// to it restores this state.
	///
	/// # Errors
	///
	/// [`RouterError::MissingInitialUrl`] when neither source yields a URL.
	pub fn new(settings: &RouterSettings, bridge: HistoryBridge) -> RouterResult<Self> {
		let raw = settings
			.url
			.clone()
			.or_else(|| bridge.href())
			.ok_or(RouterError::MissingInitialUrl)?;
		let mut url = parse_url(&raw)?;
		let base = settings.default_base.clone();
		if let Some(path) = strip_base(&base, url.path()) {
			url.set_path(&path);
		}
		let state = bridge.state();

		bridge.replace_session(
			&relative_href(&join_base(&base, &url)),
			&Session {
				url: relative_href(&url),
				base: base.clone(),
				state: state.clone(),
			},
		);

		let inner = Rc::new(StoreInner {
			url: Signal::new(url),
			base: Signal::new(base),
			state: Signal::new(state),
			pending: Signal::new(false),
			in_flight: Cell::new(0),
			action: Signal::new(NavigationType::Initial),
			bridge: bridge.clone(),
			listener: Cell::new(None),
		});

		let weak: Weak<StoreInner> = Rc::downgrade(&inner);
		let id = bridge.on_pop_state(move |session| {
			if let Some(inner) = weak.upgrade() {
				inner.apply_session(session);
			}
		});
		inner.listener.set(Some(id));

		Ok(Self { inner })
	}

	/// Navigates to `options.url`.
	///
	/// # Errors
	///
	/// [`RouterError::InvalidUrl`] when the target cannot be resolved. Nothing
	/// is written in that case.
	pub fn navigate(&self, options: impl Into<NavigateOptions>) -> RouterResult<()> {
		let options = options.into();
		let mut target = self.resolve(&options.url)?;
		for (key, value) in &options.query_params {
			set_query_param(&mut target, key, value);
		}
		if let Some(hash) = &options.hash {
			let hash = hash.trim_start_matches('#');
			target.set_fragment((!hash.is_empty()).then_some(hash));
		}

		let base = self.inner.base.get();
		let display = relative_href(&join_base(&base, &target));
		let session = Session {
			url: relative_href(&target),
			base,
			state: options.state.clone(),
		};
		let action = if options.replace {
			self.inner.bridge.replace_session(&display, &session);
			NavigationType::Replace
		} else {
			self.inner.bridge.push_session(&display, &session);
			NavigationType::Push
		};

		batch(|| {
			self.inner.url.set(target);
			self.inner.state.set(options.state);
			self.inner.action.set(action);
		});
		Ok(())
	}

	/// Resolves `to` against the current URL and removes the trailing slash
	/// and the base prefix, the way [`navigate`](Self::navigate) does.
	pub fn resolve(&self, to: &str) -> RouterResult<Url> {
		let mut target = self.inner.url.with(|current| current.join(to))?;
		let path = trim_trailing_slash(target.path()).to_string();
		let path = self
			.inner
			.base
			.with(|base| strip_base(base, &path))
			.unwrap_or(path);
		target.set_path(&path);
		Ok(target)
	}

	/// Switches the base prefix.
	///
	/// A no-op when `base` is already current. Coming from an empty base, a
	/// current path lying under `base` is absorbed into it (the address bar does
	/// not change). Application state is always cleared.
	pub fn change_base(&self, base: impl Into<String>, replace: bool) {
		let base = base.into();
		if self.inner.base.with(|current| *current == base) {
			return;
		}

		let mut url = self.inner.url.get();
		let absorbed = self
			.inner
			.base
			.with(String::is_empty)
			.then(|| strip_base(&base, url.path()))
			.flatten();
		if let Some(path) = &absorbed {
			url.set_path(path);
		}
		let absorbed = absorbed.is_some();

		let display = relative_href(&join_base(&base, &url));
		let session = Session {
			url: relative_href(&url),
			base: base.clone(),
			state: None,
		};
		let action = if replace || absorbed {
			self.inner.bridge.replace_session(&display, &session);
			NavigationType::Replace
		} else {
			self.inner.bridge.push_session(&display, &session);
			NavigationType::Push
		};

		tracing::debug!(base = %base, absorbed, "base changed");
		batch(|| {
			self.inner.url.set(url);
			self.inner.base.set(base);
			self.inner.state.set(None);
			self.inner.action.set(action);
		});
	}

	/// Current URL without base prefix.
	pub fn url(&self) -> Signal<Url> {
		self.inner.url.clone()
	}

	/// Current base prefix.
	pub fn base(&self) -> Signal<String> {
		self.inner.base.clone()
	}

	/// Application state of the current entry.
	pub fn state(&self) -> Signal<Option<Value>> {
		self.inner.state.clone()
	}

	/// Whether any resolution is loading a component.
	pub fn pending(&self) -> Signal<bool> {
		self.inner.pending.clone()
	}

	/// Kind of the last history change.
	pub fn action(&self) -> Signal<NavigationType> {
		self.inner.action.clone()
	}

	/// Current pathname without base prefix.
	pub fn pathname(&self) -> String {
		self.inner.url.with(|url| url.path().to_string())
	}

	/// Snapshot of url, base and state.
	pub fn location(&self) -> Location {
		Location::new(
			self.inner.url.get(),
			self.inner.base.get(),
			self.inner.state.get(),
		)
	}

	/// Decoded query parameters of the current URL.
	pub fn query_params(&self) -> Vec<(String, String)> {
		self.inner
			.url
			.with(|url| url.query_pairs().into_owned().collect())
	}

	/// The current URL as displayed (base re-applied).
	pub fn full_url(&self) -> Url {
		self.inner
			.base
			.with(|base| self.inner.url.with(|url| join_base(base, url)))
	}

	/// The bridge this store writes through.
	pub fn bridge(&self) -> &HistoryBridge {
		&self.inner.bridge
	}

	pub(crate) fn begin_pending(&self) {
		let count = self.inner.in_flight.get() + 1;
		self.inner.in_flight.set(count);
		self.inner.pending.set_if_changed(true);
	}

	pub(crate) fn end_pending(&self) {
		let count = self.inner.in_flight.get().saturating_sub(1);
		self.inner.in_flight.set(count);
		if count == 0 {
			self.inner.pending.set_if_changed(false);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::history::MemoryHistory;
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::cell::RefCell;

	#[fixture]
	fn memory() -> MemoryHistory {
		MemoryHistory::new("/")
	}

	fn store_at(memory: &MemoryHistory, settings: RouterSettings) -> NavigationStore {
		NavigationStore::new(&settings, HistoryBridge::new(memory.clone())).unwrap()
	}

	#[rstest]
	fn test_headless_requires_initial_url() {
		let err = NavigationStore::new(&RouterSettings::default(), HistoryBridge::headless())
			.unwrap_err();
		assert!(matches!(err, RouterError::MissingInitialUrl));

		let store = NavigationStore::new(
			&RouterSettings::new().with_url("/docs"),
			HistoryBridge::headless(),
		)
		.unwrap();
		assert_eq!(store.pathname(), "/docs");
	}

	#[rstest]
	fn test_startup_strips_base_and_tags_entry() {
		let memory = MemoryHistory::new("/en/docs");
		let store = store_at(&memory, RouterSettings::new().with_base("/en"));

		assert_eq!(store.pathname(), "/docs");
		assert_eq!(store.action().get(), NavigationType::Initial);
		assert_eq!(memory.replace_count(), 1);
		assert_eq!(memory.push_count(), 0);
		assert_eq!(memory.current_url().as_deref(), Some("/en/docs"));
		assert_eq!(
			store.bridge().session().map(|s| (s.url, s.base)),
			Some(("/docs".to_string(), "/en".to_string()))
		);
	}

	#[rstest]
	fn test_navigate_reads_back(memory: MemoryHistory) {
		let store = store_at(&memory, RouterSettings::default());
		store.navigate("/x?y=1").unwrap();

		assert_eq!(store.pathname(), "/x");
		assert_eq!(store.query_params(), vec![("y".to_string(), "1".to_string())]);
		assert_eq!(store.action().get(), NavigationType::Push);
		assert_eq!(memory.push_count(), 1);
		assert_eq!(memory.current_url().as_deref(), Some("/x?y=1"));
	}

	#[rstest]
	fn test_navigate_applies_query_hash_and_slash(memory: MemoryHistory) {
		let store = store_at(&memory, RouterSettings::default());
		store
			.navigate(
				NavigateOptions::new("/list/?page=1&sort=asc")
					.query("page", "2")
					.hash("#bottom"),
			)
			.unwrap();

		let url = store.url().get();
		assert_eq!(url.path(), "/list");
		assert_eq!(url.query(), Some("page=2&sort=asc"));
		assert_eq!(url.fragment(), Some("bottom"));
	}

	#[rstest]
	#[case("/en/x", "/x")]
	#[case("/english", "/english")]
	#[case("/en", "/")]
	fn test_navigate_strips_base(#[case] target: &str, #[case] expected: &str) {
		let memory = MemoryHistory::new("/en");
		let store = store_at(&memory, RouterSettings::new().with_base("/en"));
		store.navigate(target).unwrap();
		assert_eq!(store.pathname(), expected);
	}

	#[rstest]
	fn test_navigate_relative_target(memory: MemoryHistory) {
		let store = store_at(&memory, RouterSettings::default());
		store.navigate("/docs/intro").unwrap();
		store.navigate("setup").unwrap();
		assert_eq!(store.pathname(), "/docs/setup");
	}

	#[rstest]
	fn test_replace_does_not_push(memory: MemoryHistory) {
		let store = store_at(&memory, RouterSettings::default());
		store.navigate(NavigateOptions::new("/a").replace(true)).unwrap();

		assert_eq!(memory.push_count(), 0);
		assert_eq!(memory.replace_count(), 2);
		assert_eq!(memory.len(), 1);
		assert_eq!(store.action().get(), NavigationType::Replace);
	}

	#[rstest]
	fn test_url_and_state_change_together(memory: MemoryHistory) {
		let store = store_at(&memory, RouterSettings::default());
		let seen = Rc::new(RefCell::new(Vec::new()));
		let _sub = store.url().subscribe({
			let store = store.clone();
			let seen = Rc::clone(&seen);
			move || seen.borrow_mut().push((store.pathname(), store.state().get()))
		});

		store
			.navigate(NavigateOptions::new("/a").state(json!({"n": 1})))
			.unwrap();

		assert_eq!(
			*seen.borrow(),
			vec![("/a".to_string(), Some(json!({"n": 1})))]
		);
	}

	#[rstest]
	fn test_history_written_before_state_observed(memory: MemoryHistory) {
		let store = store_at(&memory, RouterSettings::default());
		let address = Rc::new(RefCell::new(None));
		let _sub = store.url().subscribe({
			let memory = memory.clone();
			let address = Rc::clone(&address);
			move || *address.borrow_mut() = memory.current_url()
		});

		store.navigate("/after").unwrap();
		assert_eq!(address.borrow().as_deref(), Some("/after"));
	}

	#[rstest]
	fn test_popstate_restores_session(memory: MemoryHistory) {
		let store = store_at(&memory, RouterSettings::default());
		store
			.navigate(NavigateOptions::new("/x?y=1").state(json!("kept")))
			.unwrap();
		store.navigate("/z").unwrap();
		let writes = memory.writes();

		memory.back();

		assert_eq!(store.pathname(), "/x");
		assert_eq!(store.query_params(), vec![("y".to_string(), "1".to_string())]);
		assert_eq!(store.state().get(), Some(json!("kept")));
		assert_eq!(store.action().get(), NavigationType::Pop);
		assert_eq!(memory.writes(), writes);
	}

	#[rstest]
	fn test_change_base_is_idempotent(memory: MemoryHistory) {
		let store = store_at(&memory, RouterSettings::default());
		store.navigate("/docs").unwrap();

		store.change_base("/en", false);
		let writes = memory.writes();
		store.change_base("/en", false);

		assert_eq!(memory.writes(), writes);
		assert_eq!(store.base().get(), "/en");
		assert_eq!(store.pathname(), "/docs");
		assert_eq!(memory.current_url().as_deref(), Some("/en/docs"));
	}

	#[rstest]
	fn test_change_base_absorbs_matching_prefix() {
		let memory = MemoryHistory::new("/en/docs");
		let store = store_at(&memory, RouterSettings::default());
		assert_eq!(store.pathname(), "/en/docs");

		store.change_base("/en", false);

		assert_eq!(store.pathname(), "/docs");
		assert_eq!(memory.current_url().as_deref(), Some("/en/docs"));
		assert_eq!(memory.push_count(), 0);
	}

	#[rstest]
	fn test_change_base_clears_state(memory: MemoryHistory) {
		let store = store_at(&memory, RouterSettings::default());
		store
			.navigate(NavigateOptions::new("/a").state(json!(true)))
			.unwrap();
		store.change_base("/fr", false);

		assert_eq!(store.state().get(), None);
		assert_eq!(store.full_url().path(), "/fr/a");
		assert_eq!(store.action().get(), NavigationType::Push);
	}

	#[rstest]
	fn test_pending_counts_overlapping_loads() {
		let store = NavigationStore::new(
			&RouterSettings::new().with_url("/"),
			HistoryBridge::headless(),
		)
		.unwrap();
		store.begin_pending();
		store.begin_pending();
		store.end_pending();
		assert!(store.pending().get());
		store.end_pending();
		assert!(!store.pending().get());
	}
}
