//! Router Implementation.
//!
//! [`Router`] owns everything one application mounts once: the
//! [`NavigationStore`], the [`RouteContextTree`], the [`KeepAliveRegistry`]
//! and the root [`RouteResolver`]. The [`PrefetchCache`] is the thread-wide
//! one unless another is injected.
//!
//! ```ignore
//! let router = Router::new(RouterSettings::new().with_url("/docs/intro"), HistoryBridge::headless())?;
//! let root = router.routes(vec![
//!     RouteDefinition::new("/").component(home),
//!     RouteDefinition::new("/docs").child(RouteDefinition::new("/:page")),
//! ]);
//! router.push("/docs/setup")?;
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use waypoint_urls::{RouteDefinition, RouteMatch, first_match};

use crate::context::RouteContextTree;
use crate::error::RouterResult;
use crate::history::HistoryBridge;
use crate::keep_alive::KeepAliveRegistry;
use crate::link::Link;
use crate::navigation::{NavigateOptions, NavigationStore};
use crate::prefetch::PrefetchCache;
use crate::resolver::{ResolverOptions, RouteResolver};
use crate::settings::RouterSettings;

/// The main router.
pub struct Router {
	settings: RouterSettings,
	store: NavigationStore,
	cache: PrefetchCache,
	contexts: RouteContextTree,
	keep_alive: Rc<KeepAliveRegistry>,
	root: RefCell<Option<RouteResolver>>,
}

impl fmt::Debug for Router {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Router")
			.field("settings", &self.settings)
			.field("pathname", &self.store.pathname())
			.field("base", &self.store.base().get())
			.field("contexts", &self.contexts.len())
			.field("keep_alive", &self.keep_alive.len())
			.finish()
	}
}

impl Router {
	/// Creates a router and synchronizes it with the current history entry.
	///
	/// # Errors
	///
	/// See [`NavigationStore::new`].
	pub fn new(settings: RouterSettings, bridge: HistoryBridge) -> RouterResult<Self> {
		let store = NavigationStore::new(&settings, bridge)?;
		tracing::debug!(path = %store.pathname(), base = %store.base().get(), "router created");
		Ok(Self {
			keep_alive: Rc::new(KeepAliveRegistry::new(settings.max_keep_alive)),
			settings,
			store,
			cache: PrefetchCache::global(),
			contexts: RouteContextTree::new(),
			root: RefCell::new(None),
		})
	}

	/// Creates a router from TOML settings.
	///
	/// # Errors
	///
	/// [`RouterError::Settings`](crate::RouterError::Settings) for invalid
	/// settings, otherwise as [`Router::new`].
	pub fn from_toml_str(source: &str, bridge: HistoryBridge) -> RouterResult<Self> {
		Self::new(RouterSettings::from_toml_str(source)?, bridge)
	}

	/// Uses `cache` instead of the thread-wide prefetch cache.
	///
	/// Must be called before [`routes`](Self::routes).
	pub fn with_prefetch_cache(mut self, cache: PrefetchCache) -> Self {
		self.cache = cache;
		self
	}

	/// Mounts the root scope over `routes`, replacing a previous one.
	///
	/// Must be called where [`waypoint_core::spawn_local`] can spawn.
	pub fn routes(&self, routes: impl IntoIterator<Item = RouteDefinition>) -> RouteResolver {
		let routes: Vec<Rc<RouteDefinition>> = routes.into_iter().map(Rc::new).collect();
		drop(self.root.borrow_mut().take());

		let root = RouteResolver::new(
			&self.store,
			&self.cache,
			&self.contexts,
			&routes,
			ResolverOptions::from(&self.settings),
		);
		*self.root.borrow_mut() = Some(root.clone());
		root
	}

	/// The root scope, once mounted.
	pub fn root(&self) -> Option<RouteResolver> {
		self.root.borrow().clone()
	}

	/// First route of the root scope matching `pathname`.
	pub fn match_route(&self, pathname: &str) -> Option<RouteMatch> {
		let root = self.root.borrow();
		let routes = root.as_ref()?.routes();
		first_match(
			pathname,
			&routes,
			&ResolverOptions::from(&self.settings).matching,
		)
	}

	/// A link to `to` in the root scope, using the configured prefetch mode.
	pub fn link(&self, to: impl Into<String>) -> Link {
		let link = Link::new(&self.store, &self.cache, to).prefetch(self.settings.default_prefetch);
		match self.root.borrow().as_ref() {
			Some(root) => link.in_scope(root),
			None => link,
		}
	}

	/// Navigates with full options.
	///
	/// # Errors
	///
	/// See [`NavigationStore::navigate`].
	pub fn navigate(&self, options: impl Into<NavigateOptions>) -> RouterResult<()> {
		self.store.navigate(options)
	}

	/// Navigates to `to`, pushing a history entry.
	///
	/// # Errors
	///
	/// See [`NavigationStore::navigate`].
	pub fn push(&self, to: &str) -> RouterResult<()> {
		self.store.navigate(NavigateOptions::new(to))
	}

	/// Navigates to `to`, replacing the current history entry.
	///
	/// # Errors
	///
	/// See [`NavigationStore::navigate`].
	pub fn replace(&self, to: &str) -> RouterResult<()> {
		self.store.navigate(NavigateOptions::new(to).replace(true))
	}

	/// Navigates to `to` carrying application `state`.
	///
	/// # Errors
	///
	/// See [`NavigationStore::navigate`].
	pub fn push_with_state(&self, to: &str, state: Value) -> RouterResult<()> {
		self.store.navigate(NavigateOptions::new(to).state(state))
	}

	/// Switches the base prefix. See [`NavigationStore::change_base`].
	pub fn change_base(&self, base: impl Into<String>, replace: bool) {
		self.store.change_base(base, replace);
	}

	/// The settings the router was created with.
	pub fn settings(&self) -> &RouterSettings {
		&self.settings
	}

	/// The navigation store.
	pub fn store(&self) -> &NavigationStore {
		&self.store
	}

	/// The prefetch cache.
	pub fn cache(&self) -> &PrefetchCache {
		&self.cache
	}

	/// The route context arena.
	pub fn contexts(&self) -> &RouteContextTree {
		&self.contexts
	}

	/// The keep-alive registry.
	pub fn keep_alive(&self) -> Rc<KeepAliveRegistry> {
		Rc::clone(&self.keep_alive)
	}
}

impl Drop for Router {
	fn drop(&mut self) {
		tracing::debug!("router disposed");
		self.root.borrow_mut().take();
		self.keep_alive.clear();
		self.cache.clear();
	}
}
