//! Navigation links.
//!
//! A [`Link`] is the controller behind an anchor element: it computes the
//! `href` to render, turns clicks into in-app navigations and prefetches the
//! target route according to its [`PrefetchMode`].
//!
//! ```ignore
//! let link = scope.link("/users/42").query("tab", "posts");
//! let href = link.href()?; // "/en/users/42?tab=posts" under base "/en"
//! link.mount(); // starts `visible` prefetching
//! link.click()?;
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use url::Url;
use waypoint_urls::{FlatRoute, RouteMatch, join_base, relative_href, set_query_param};

use crate::error::RouterResult;
use crate::navigation::{NavigateOptions, NavigationStore};
use crate::prefetch::{PrefetchCache, PrefetchMode};
use crate::resolver::RouteResolver;
use crate::visibility::{ElementKey, VisibilityDispatcher};

/// Anchor target that opens a new browsing context.
const TARGET_BLANK: &str = "_blank";

/// Controller of an in-app anchor.
pub struct Link {
	to: String,
	query_params: Vec<(String, String)>,
	state: Option<Value>,
	replace: bool,
	target: Option<String>,
	prefetch: PrefetchMode,

	store: NavigationStore,
	cache: PrefetchCache,
	scope: Option<RouteResolver>,

	hover_armed: Cell<bool>,
	visibility_key: Cell<Option<ElementKey>>,
}

impl fmt::Debug for Link {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Link")
			.field("to", &self.to)
			.field("query_params", &self.query_params)
			.field("replace", &self.replace)
			.field("target", &self.target)
			.field("prefetch", &self.prefetch)
			.finish()
	}
}

impl Link {
	/// Creates a link to `to`, resolved relative to the current URL.
	///
	/// Without a scope the link navigates but cannot match or prefetch its target.
	pub fn new(store: &NavigationStore, cache: &PrefetchCache, to: impl Into<String>) -> Self {
		Self {
			to: to.into(),
			query_params: Vec::new(),
			state: None,
			replace: false,
			target: None,
			prefetch: PrefetchMode::default(),
			store: store.clone(),
			cache: cache.clone(),
			scope: None,
			hover_armed: Cell::new(false),
			visibility_key: Cell::new(None),
		}
	}

	/// Matches the target through `scope` (and its ancestors).
	pub fn in_scope(mut self, scope: &RouteResolver) -> Self {
		self.scope = Some(scope.clone());
		self
	}

	/// Sets query parameter `key` on the target.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query_params.push((key.into(), value.into()));
		self
	}

	/// Application state stored with the navigation.
	pub fn state(mut self, state: Value) -> Self {
		self.state = Some(state);
		self
	}

	/// Replaces the current history entry instead of pushing.
	pub fn replace(mut self, replace: bool) -> Self {
		self.replace = replace;
		self
	}

	/// Anchor target. `_blank` leaves clicks to the browser.
	pub fn target(mut self, target: impl Into<String>) -> Self {
		self.target = Some(target.into());
		self
	}

	/// When to prefetch the target route.
	pub fn prefetch(mut self, mode: PrefetchMode) -> Self {
		self.prefetch = mode;
		self
	}

	/// The destination as written.
	pub fn to(&self) -> &str {
		&self.to
	}

	/// The prefetch mode.
	pub fn prefetch_mode(&self) -> PrefetchMode {
		self.prefetch
	}

	/// The resolved target, without base.
	pub fn url(&self) -> RouterResult<Url> {
		self.store.resolve(&self.to)
	}

	/// The `href` to render: base, path and query, without origin.
	pub fn href(&self) -> RouterResult<String> {
		let base = self.store.base().get();
		let mut url = join_base(&base, &self.url()?);
		for (key, value) in &self.query_params {
			set_query_param(&mut url, key, value);
		}
		Ok(relative_href(&url))
	}

	/// The route the target resolves to in this link's scope.
	pub fn target_match(&self) -> Option<RouteMatch> {
		let scope = self.scope.as_ref()?;
		let url = self.url().ok()?;
		scope.current_match(url.path())
	}

	/// Whether the target resolves to the route currently shown, with the
	/// same parameters.
	pub fn is_active(&self) -> bool {
		let Some(scope) = self.scope.as_ref() else {
			return false;
		};
		let Some(target) = self.target_match() else {
			return false;
		};
		scope
			.current_match(&self.store.pathname())
			.is_some_and(|current| {
				current.route.same_route(&target.route) && current.params == target.params
			})
	}

	/// Handles a click. Returns whether an in-app navigation happened.
	///
	/// # Errors
	///
	/// Propagates [`NavigationStore::navigate`] failures.
	pub fn click(&self) -> RouterResult<bool> {
		if self.target.as_deref() == Some(TARGET_BLANK) {
			return Ok(false);
		}
		let mut options = NavigateOptions::new(self.to.clone()).replace(self.replace);
		for (key, value) in &self.query_params {
			options = options.query(key.clone(), value.clone());
		}
		if let Some(state) = &self.state {
			options = options.state(state.clone());
		}
		self.store.navigate(options)?;
		Ok(true)
	}

	/// Arms the prefetch trigger of this link.
	///
	/// `immediate` prefetches now, `hover` waits for
	/// [`on_pointer_enter`](Self::on_pointer_enter) and `visible` registers
	/// with the shared [`VisibilityDispatcher`]. Returns the key under which a
	/// viewport observer must report the element for `visible`.
	pub fn mount(&self) -> Option<ElementKey> {
		self.cleanup();
		let route = self.prefetch_target()?;
		match self.prefetch {
			PrefetchMode::Immediate => {
				self.cache.prefetch_chain(&route);
				None
			}
			PrefetchMode::Hover => {
				self.hover_armed.set(true);
				None
			}
			PrefetchMode::Visible => {
				let key = ElementKey::next();
				let cache = self.cache.clone();
				VisibilityDispatcher::global().register(key, move || cache.prefetch_chain(&route));
				self.visibility_key.set(Some(key));
				Some(key)
			}
			PrefetchMode::None => None,
		}
	}

	/// Watches `element` with the shared viewport observer.
	#[cfg(all(target_family = "wasm", target_os = "unknown"))]
	pub fn observe(&self, element: &web_sys::Element) {
		let Some(key) = self.visibility_key.get() else {
			return;
		};
		if let Some(observer) = crate::visibility::DomViewportObserver::global() {
			observer.observe(element, key);
		}
	}

	/// Pointer entered the anchor.
	pub fn on_pointer_enter(&self) {
		if !self.hover_armed.get() {
			return;
		}
		if let Some(route) = self.prefetch_target() {
			self.cache.prefetch_chain(&route);
		}
	}

	/// Removes the hover and visibility registrations.
	pub fn cleanup(&self) {
		self.hover_armed.set(false);
		if let Some(key) = self.visibility_key.take() {
			VisibilityDispatcher::global().unregister(key);
		}
	}

	fn prefetch_target(&self) -> Option<Rc<FlatRoute>> {
		if self.prefetch == PrefetchMode::None {
			return None;
		}
		let target = self.target_match()?;
		let loadable = std::iter::once(&*target.route)
			.chain(target.route.ancestors())
			.any(|route| route.component().is_some());
		loadable.then_some(target.route)
	}
}

impl Drop for Link {
	fn drop(&mut self) {
		self.cleanup();
	}
}
