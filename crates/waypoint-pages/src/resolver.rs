//! Route Resolver
//!
//! One [`RouteResolver`] per mounted route scope. On every URL change it
//! matches the pathname against the scope's routes and walks through
//!
//! ```text
//! Idle -> Resolving -> Active | Redirecting | Rejected | NotFound
//! ```
//!
//! Resolution is asynchronous (guards and component loads may suspend), so the
//! scope admits one resolution at a time through a FIFO gate. Each URL change
//! gets a generation number; a resolution commits only if no newer one was
//! requested and the URL still matches what it resolved. Otherwise it is
//! discarded and the newer resolution wins.
//!
//! Only the root scope follows the URL. An outlet scope resolves after each
//! commit of its parent, and its own commit is discarded unless the parent is
//! still settled on the route the outlet was resolving under.
//!
//! Per resolution:
//!
//! 1. first match in flatten order, lifted to the route declared at this scope's level
//! 2. `redirect_to`: navigate there replacing the entry, nothing committed
//! 3. leave callbacks of the outgoing route run and settle (failures logged)
//! 4. guard: `false` or `Err` rejects
//! 5. the component chain is loaded through the [`PrefetchCache`]; a load
//!    failure is recorded in [`RouteResolver::load_error`] but still activates
//! 6. commit in one batch

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use tokio::sync::{Notify, Semaphore};
use waypoint_core::{Signal, Subscription, batch};
use waypoint_urls::{
	FlatRoute, HookError, LoadError, LoadableComponent, Location, MatchOptions, RouteDefinition,
	RouteMatch, RouteParams, first_match, flatten, flatten_under,
};

use crate::context::{ContextId, RouteContextTree};
use crate::link::Link;
use crate::navigation::{NavigateOptions, NavigationStore};
use crate::prefetch::{PrefetchCache, PrefetchStatus};
use crate::settings::{DEFAULT_MAX_REDIRECTS, RouterSettings};

/// Resolution state of a route scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolverState {
	/// Nothing resolved yet.
	#[default]
	Idle,
	/// A resolution is queued or running.
	Resolving,
	/// A route is active.
	Active,
	/// The matched route redirected; the follow-up navigation is in flight.
	Redirecting,
	/// The guard refused, or redirects looped.
	Rejected,
	/// No route matched.
	NotFound,
}

/// Matching and redirect limits of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
	/// Path matching options.
	pub matching: MatchOptions,
	/// Consecutive redirects followed before giving up.
	pub max_redirects: usize,
}

impl Default for ResolverOptions {
	fn default() -> Self {
		Self {
			matching: MatchOptions::default(),
			max_redirects: DEFAULT_MAX_REDIRECTS,
		}
	}
}

impl From<&RouterSettings> for ResolverOptions {
	fn from(settings: &RouterSettings) -> Self {
		Self {
			matching: MatchOptions {
				optional_tail: settings.optional_tail,
			},
			max_redirects: settings.max_redirects,
		}
	}
}

type LeaveCallback = Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<(), HookError>>>;

struct ScopeInner {
	store: NavigationStore,
	cache: PrefetchCache,
	contexts: RouteContextTree,
	context: ContextId,
	options: ResolverOptions,
	parent: Option<Weak<ScopeInner>>,
	children: RefCell<Vec<Weak<ScopeInner>>>,
	scope_parent: RefCell<Option<Rc<FlatRoute>>>,
	routes: RefCell<Vec<Rc<FlatRoute>>>,

	gate: Semaphore,
	idle: Notify,
	requested: Cell<u64>,
	completed: Cell<u64>,
	redirects: Cell<usize>,

	state: Signal<ResolverState>,
	active: Signal<Option<Rc<FlatRoute>>>,
	matched: Signal<Option<Rc<FlatRoute>>>,
	params: Signal<RouteParams>,
	pending: Signal<bool>,
	load_error: Signal<Option<LoadError>>,

	leave_callbacks: RefCell<Vec<LeaveCallback>>,
	subscriptions: RefCell<Vec<Subscription>>,
}

impl ScopeInner {
	fn mount(
		store: NavigationStore,
		cache: PrefetchCache,
		contexts: RouteContextTree,
		routes: Vec<Rc<FlatRoute>>,
		options: ResolverOptions,
	) -> Rc<Self> {
		let inner = Self::create(store, cache, contexts, None, routes, options);

		let weak = Rc::downgrade(&inner);
		let subscription = inner.store.url().subscribe(move || {
			if let Some(inner) = weak.upgrade() {
				inner.request();
			}
		});
		inner.subscriptions.borrow_mut().push(subscription);

		inner.prefetch_eager();
		inner.request();
		inner
	}

	/// Mounts an outlet under `parent`, resolving the children of its active route.
	fn mount_outlet(parent: &Rc<Self>) -> Rc<Self> {
		let scope_parent = parent.active.get();
		let routes = child_routes(scope_parent.as_ref());
		let inner = Self::create(
			parent.store.clone(),
			parent.cache.clone(),
			parent.contexts.clone(),
			Some(parent),
			routes,
			parent.options,
		);
		*inner.scope_parent.borrow_mut() = scope_parent;
		parent.children.borrow_mut().push(Rc::downgrade(&inner));

		inner.prefetch_eager();
		if parent.is_settled() {
			inner.request();
		}
		inner
	}

	fn create(
		store: NavigationStore,
		cache: PrefetchCache,
		contexts: RouteContextTree,
		parent: Option<&Rc<Self>>,
		routes: Vec<Rc<FlatRoute>>,
		options: ResolverOptions,
	) -> Rc<Self> {
		let context = contexts.create(parent.map(|parent| parent.context), routes.clone());
		Rc::new(Self {
			store,
			cache,
			contexts,
			context,
			options,
			parent: parent.map(Rc::downgrade),
			children: RefCell::new(Vec::new()),
			scope_parent: RefCell::new(None),
			routes: RefCell::new(routes),
			gate: Semaphore::new(1),
			idle: Notify::new(),
			requested: Cell::new(0),
			completed: Cell::new(0),
			redirects: Cell::new(0),
			state: Signal::new(ResolverState::Idle),
			active: Signal::new(None),
			matched: Signal::new(None),
			params: Signal::new(RouteParams::new()),
			pending: Signal::new(false),
			load_error: Signal::new(None),
			leave_callbacks: RefCell::new(Vec::new()),
			subscriptions: RefCell::new(Vec::new()),
		})
	}

	fn prefetch_eager(&self) {
		for route in self.routes.borrow().iter() {
			if route.definition().is_prefetch_eager() {
				self.cache.prefetch(route);
			}
		}
	}

	fn request(self: &Rc<Self>) {
		let generation = self.requested.get() + 1;
		self.requested.set(generation);
		self.state.set(ResolverState::Resolving);
		let scope = Rc::clone(self);
		waypoint_core::spawn_local(async move { scope.run(generation).await });
	}

	/// Resolves an outlet scope again after its parent committed `parent`.
	fn follow(self: &Rc<Self>, parent: Option<Rc<FlatRoute>>) {
		if !same_parent(self.scope_parent.borrow().as_ref(), parent.as_ref()) {
			let routes = child_routes(parent.as_ref());
			self.contexts.set_routes(self.context, routes.clone());
			*self.scope_parent.borrow_mut() = parent;
			*self.routes.borrow_mut() = routes;
			self.prefetch_eager();
		}
		self.request();
	}

	fn notify_children(&self) {
		let children: Vec<Rc<Self>> = {
			let mut children = self.children.borrow_mut();
			children.retain(|child| child.strong_count() > 0);
			children.iter().filter_map(Weak::upgrade).collect()
		};
		if children.is_empty() {
			return;
		}
		let active = self.active.get();
		for child in children {
			child.follow(active.clone());
		}
	}

	/// Whether the last requested resolution of this scope has committed.
	fn is_settled(&self) -> bool {
		!matches!(
			self.state.get(),
			ResolverState::Idle | ResolverState::Resolving | ResolverState::Redirecting
		)
	}

	/// Whether the parent scope still stands where this outlet resolved under.
	fn parent_admits(&self) -> bool {
		let Some(parent) = &self.parent else {
			return true;
		};
		let Some(parent) = parent.upgrade() else {
			return false;
		};
		parent.is_settled()
			&& parent
				.active
				.with(|active| same_parent(self.scope_parent.borrow().as_ref(), active.as_ref()))
	}

	async fn run(self: Rc<Self>, generation: u64) {
		let Ok(_permit) = self.gate.acquire().await else {
			return;
		};
		if generation != self.requested.get() {
			tracing::debug!(generation, "skipping superseded resolution");
			self.finish(generation);
			return;
		}

		let location = self.store.location();
		let pathname = location.pathname().to_string();
		let hit = {
			let routes = self.routes.borrow();
			first_match(&pathname, &routes, &self.options.matching)
		};
		let Some(hit) = hit else {
			self.leave(None).await;
			if self.is_current(generation, &pathname) {
				tracing::debug!(path = %pathname, "no route matched");
				self.commit_empty(ResolverState::NotFound);
			}
			self.finish(generation);
			return;
		};
		let route = {
			let scope_parent = self.scope_parent.borrow();
			hit.scope_route(scope_parent.as_ref())
		};

		if let Some(target) = route.definition().redirect_target() {
			self.redirect(&route, target);
			self.finish(generation);
			return;
		}

		self.leave(Some(&*route)).await;

		if !self.can_enter(&location, &route).await {
			if self.is_current(generation, &pathname) {
				self.commit_empty(ResolverState::Rejected);
			}
			self.finish(generation);
			return;
		}

		let load_error = self.load(&hit).await;

		if !self.is_current(generation, &pathname) {
			tracing::debug!(path = %pathname, route = %route, "discarding stale resolution");
			self.finish(generation);
			return;
		}
		self.commit(route, hit, load_error);
		self.finish(generation);
	}

	fn redirect(&self, route: &FlatRoute, target: &str) {
		let count = self.redirects.get() + 1;
		self.redirects.set(count);
		if count > self.options.max_redirects {
			tracing::error!(route = %route, to = target, count, "redirect loop detected, giving up");
			self.commit_empty(ResolverState::Rejected);
			return;
		}

		tracing::debug!(route = %route, to = target, "redirecting");
		self.state.set(ResolverState::Redirecting);
		if let Err(err) = self.store.navigate(NavigateOptions::new(target).replace(true)) {
			tracing::warn!(route = %route, to = target, error = %err, "redirect target is invalid");
			self.commit_empty(ResolverState::Rejected);
		}
	}

	/// Runs and settles the leave callbacks when the active route changes away.
	async fn leave(&self, next: Option<&FlatRoute>) {
		let changing = match (self.active.get(), next) {
			(Some(previous), Some(next)) => !previous.same_route(next),
			_ => true,
		};
		if !changing {
			return;
		}
		let callbacks = self.leave_callbacks.take();
		if callbacks.is_empty() {
			return;
		}
		let results = future::join_all(callbacks.into_iter().map(|callback| callback())).await;
		for err in results.into_iter().filter_map(Result::err) {
			tracing::warn!(error = %err, "leave callback failed");
		}
	}

	async fn can_enter(&self, location: &Location, route: &FlatRoute) -> bool {
		let Some(guard) = route.definition().guard() else {
			return true;
		};
		match guard(location, route).await {
			Ok(true) => true,
			Ok(false) => {
				tracing::warn!(route = %route, path = %location.pathname(), "route guard rejected navigation");
				false
			}
			Err(err) => {
				tracing::warn!(route = %route, error = %err, "route guard failed");
				false
			}
		}
	}

	/// Loads the component chain of the match, returning the load failure if any.
	async fn load(&self, hit: &RouteMatch) -> Option<LoadError> {
		let load = self.cache.ensure_chain(&hit.route);
		let loading = std::iter::once(&*hit.route)
			.chain(hit.route.ancestors())
			.any(|route| self.cache.status(route) == Some(PrefetchStatus::Pending));

		if loading {
			self.pending.set(true);
			self.store.begin_pending();
		}
		let result = load.await;
		if loading {
			self.pending.set(false);
			self.store.end_pending();
		}
		result.err()
	}

	fn is_current(&self, generation: u64, pathname: &str) -> bool {
		generation == self.requested.get()
			&& self.store.pathname() == pathname
			&& self.parent_admits()
	}

	fn commit(&self, route: Rc<FlatRoute>, hit: RouteMatch, load_error: Option<LoadError>) {
		tracing::debug!(route = %route, path = %hit.route, "route activated");
		self.contexts
			.set_active_route(self.context, Some(Rc::clone(&route)));
		self.redirects.set(0);
		batch(|| {
			self.state.set(ResolverState::Active);
			self.active.set(Some(route));
			self.matched.set(Some(hit.route));
			self.params.set(hit.params);
			self.load_error.set(load_error);
		});
		self.notify_children();
	}

	fn commit_empty(&self, state: ResolverState) {
		self.contexts.set_active_route(self.context, None);
		self.redirects.set(0);
		batch(|| {
			self.state.set(state);
			self.active.set(None);
			self.matched.set(None);
			self.params.set(RouteParams::new());
			self.load_error.set(None);
		});
		self.notify_children();
	}

	fn finish(&self, generation: u64) {
		self.completed.set(self.completed.get().max(generation));
		if self.completed.get() >= self.requested.get() {
			self.idle.notify_waiters();
		}
	}
}

impl Drop for ScopeInner {
	fn drop(&mut self) {
		self.contexts.remove(self.context);
	}
}

fn same_parent(a: Option<&Rc<FlatRoute>>, b: Option<&Rc<FlatRoute>>) -> bool {
	match (a, b) {
		(Some(a), Some(b)) => a.same_route(b),
		(None, None) => true,
		_ => false,
	}
}

fn child_routes(parent: Option<&Rc<FlatRoute>>) -> Vec<Rc<FlatRoute>> {
	parent
		.map(|parent| flatten_under(parent.definition().child_routes(), parent))
		.unwrap_or_default()
}

/// Resolution state machine of one route scope.
///
/// Cloning yields another handle to the same scope. The scope unmounts (and
/// leaves the context tree) when the last handle is dropped.
#[derive(Clone)]
pub struct RouteResolver {
	inner: Rc<ScopeInner>,
}

impl fmt::Debug for RouteResolver {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteResolver")
			.field("context", &self.inner.context)
			.field("state", &self.inner.state.get())
			.field("active", &self.inner.active.get().map(|r| r.path().to_string()))
			.finish()
	}
}

impl RouteResolver {
	/// Mounts a root scope over `routes` and starts resolving the current URL.
	///
	/// Must be called where [`waypoint_core::spawn_local`] can spawn.
	pub fn new(
		store: &NavigationStore,
		cache: &PrefetchCache,
		contexts: &RouteContextTree,
		routes: &[Rc<RouteDefinition>],
		options: ResolverOptions,
	) -> Self {
		Self {
			inner: ScopeInner::mount(
				store.clone(),
				cache.clone(),
				contexts.clone(),
				flatten(routes, ""),
				options,
			),
		}
	}

	/// Mounts the child scope rendering the children of this scope's active route.
	///
	/// The child follows this scope: it resolves after every commit here,
	/// switching to the children of the newly active route when it changed.
	/// Until this scope has committed, the child stays `Idle`.
	pub fn outlet(&self) -> RouteResolver {
		RouteResolver {
			inner: ScopeInner::mount_outlet(&self.inner),
		}
	}

	/// Resolution state.
	pub fn state(&self) -> Signal<ResolverState> {
		self.inner.state.clone()
	}

	/// The active route, declared at this scope's level.
	pub fn active_route(&self) -> Signal<Option<Rc<FlatRoute>>> {
		self.inner.active.clone()
	}

	/// The deepest route matching the URL (may be a descendant of the active route).
	pub fn matched_route(&self) -> Signal<Option<Rc<FlatRoute>>> {
		self.inner.matched.clone()
	}

	/// Parameters of the deepest match.
	pub fn params(&self) -> Signal<RouteParams> {
		self.inner.params.clone()
	}

	/// Whether this scope is waiting for a component load.
	pub fn pending(&self) -> Signal<bool> {
		self.inner.pending.clone()
	}

	/// Load failure of the active route, for the rendering layer's error boundary.
	pub fn load_error(&self) -> Signal<Option<LoadError>> {
		self.inner.load_error.clone()
	}

	/// Component of the active route.
	pub fn component(&self) -> Option<Rc<dyn LoadableComponent>> {
		self.inner
			.active
			.with(|active| active.as_ref().and_then(|route| route.component().cloned()))
	}

	/// Registers a callback run (and awaited) before the active route changes away.
	///
	/// Callbacks are dropped after running; register again on the next activation.
	pub fn on_leave<F, Fut>(&self, callback: F)
	where
		F: FnOnce() -> Fut + 'static,
		Fut: Future<Output = Result<(), HookError>> + 'static,
	{
		self.inner
			.leave_callbacks
			.borrow_mut()
			.push(Box::new(move || callback().boxed_local()));
	}

	/// Resolves the current URL again, e.g. after a rendering error.
	pub fn reset(&self) {
		self.inner.load_error.set(None);
		self.inner.request();
	}

	/// Completes once every requested resolution has finished.
	pub fn wait_idle(&self) -> LocalBoxFuture<'static, ()> {
		let inner = Rc::clone(&self.inner);
		async move {
			loop {
				let notified = inner.idle.notified();
				if inner.completed.get() >= inner.requested.get() {
					return;
				}
				notified.await;
			}
		}
		.boxed_local()
	}

	/// Matches `pathname` against this scope, then its ancestors.
	pub fn current_match(&self, pathname: &str) -> Option<RouteMatch> {
		self.inner
			.contexts
			.current_match(self.inner.context, pathname, &self.inner.options.matching)
	}

	/// The routes this scope resolves against.
	pub fn routes(&self) -> Vec<Rc<FlatRoute>> {
		self.inner.routes.borrow().clone()
	}

	/// The context node of this scope.
	pub fn context(&self) -> ContextId {
		self.inner.context
	}

	/// The navigation store this scope follows.
	pub fn store(&self) -> &NavigationStore {
		&self.inner.store
	}

	/// The cache this scope loads components through.
	pub fn cache(&self) -> &PrefetchCache {
		&self.inner.cache
	}

	/// A link to `to` resolved against this scope.
	pub fn link(&self, to: impl Into<String>) -> Link {
		Link::new(&self.inner.store, &self.inner.cache, to).in_scope(self)
	}
}
