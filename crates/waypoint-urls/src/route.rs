//! Route declarations.
//!
//! A route tree is declared once with [`RouteDefinition`] builders and never
//! mutated afterwards. Matching works on [`FlatRoute`]s, the depth-first
//! flattening of that tree produced by [`flatten`](crate::flatten).

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};

use super::error::{HookError, LoadError};
use super::location::Location;
use super::pattern::PathPattern;

/// Future returned by [`LoadableComponent::preload`].
pub type LoadFuture = LocalBoxFuture<'static, Result<(), LoadError>>;

/// Future returned by a route guard.
pub type GuardFuture = LocalBoxFuture<'static, Result<bool, HookError>>;

/// Type alias for route guard functions.
pub type RouteGuard = Rc<dyn Fn(&Location, &FlatRoute) -> GuardFuture>;

/// Opaque handle to the UI code of a route.
///
/// The rendering layer downcasts through [`LoadableComponent::as_any`]; the
/// navigation core only ever calls [`preload`](LoadableComponent::preload).
pub trait LoadableComponent: 'static {
	/// Human-readable component name used in logs and errors.
	fn name(&self) -> &str;

	/// Starts (or joins) loading the component's code.
	///
	/// Returns `None` for components that need no loading. Implementations must
	/// be idempotent: the underlying work runs at most once no matter how
	/// often this is called.
	fn preload(&self) -> Option<LoadFuture> {
		None
	}

	/// Access to the concrete component for the rendering layer.
	fn as_any(&self) -> &dyn Any;
}

/// A component that is available immediately.
#[derive(Debug, Clone)]
pub struct StaticComponent<V> {
	name: String,
	view: V,
}

impl<V: 'static> StaticComponent<V> {
	/// Wraps an already-available view.
	pub fn new(name: impl Into<String>, view: V) -> Self {
		Self {
			name: name.into(),
			view,
		}
	}

	/// The wrapped view.
	pub fn view(&self) -> &V {
		&self.view
	}
}

impl<V: 'static> LoadableComponent for StaticComponent<V> {
	fn name(&self) -> &str {
		&self.name
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

type Loader<V> = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<V, LoadError>>>;

/// A component whose code is fetched asynchronously on first use.
///
/// The loader runs at most once; every `preload` call while it runs or after it
/// settled joins the same shared outcome.
///
/// # Example
///
/// ```ignore
/// let settings = LazyComponent::new("Settings", || async {
///     fetch_chunk("settings.wasm").await.map_err(|e| LoadError::new("Settings", e.to_string()))
/// });
/// ```
pub struct LazyComponent<V: 'static> {
	name: String,
	loader: Loader<V>,
	load: RefCell<Option<Shared<LoadFuture>>>,
	view: Rc<RefCell<Option<V>>>,
}

impl<V: 'static> LazyComponent<V> {
	/// Creates a lazy component from an async loader.
	pub fn new<F, Fut>(name: impl Into<String>, loader: F) -> Self
	where
		F: Fn() -> Fut + 'static,
		Fut: Future<Output = Result<V, LoadError>> + 'static,
	{
		Self {
			name: name.into(),
			loader: Rc::new(move || loader().boxed_local()),
			load: RefCell::new(None),
			view: Rc::new(RefCell::new(None)),
		}
	}

	/// The loaded view, once loading succeeded.
	pub fn view(&self) -> Option<V>
	where
		V: Clone,
	{
		self.view.borrow().clone()
	}

	/// Whether loading has been started.
	pub fn is_started(&self) -> bool {
		self.load.borrow().is_some()
	}
}

impl<V: 'static> LoadableComponent for LazyComponent<V> {
	fn name(&self) -> &str {
		&self.name
	}

	fn preload(&self) -> Option<LoadFuture> {
		let mut slot = self.load.borrow_mut();
		let shared = slot.get_or_insert_with(|| {
			let pending = (self.loader)();
			let view = Rc::clone(&self.view);
			async move {
				let loaded = pending.await?;
				*view.borrow_mut() = Some(loaded);
				Ok(())
			}
			.boxed_local()
			.shared()
		});
		Some(shared.clone().boxed_local())
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

impl<V: 'static> fmt::Debug for LazyComponent<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LazyComponent")
			.field("name", &self.name)
			.field("started", &self.is_started())
			.field("loaded", &self.view.borrow().is_some())
			.finish()
	}
}

/// A single route declaration.
///
/// Path patterns are made of literal segments, `:name` (required parameter),
/// `:name?` (optional, last segment only) and `*name` (rest of the path, last
/// segment only). Child paths are concatenated onto the parent path verbatim,
/// so they are authored with a leading `/`.
#[derive(Clone)]
pub struct RouteDefinition {
	path: String,
	id: Option<String>,
	component: Option<Rc<dyn LoadableComponent>>,
	children: Vec<Rc<RouteDefinition>>,
	guard: Option<RouteGuard>,
	redirect_to: Option<String>,
	prefetch_eager: bool,
}

impl fmt::Debug for RouteDefinition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteDefinition")
			.field("path", &self.path)
			.field("id", &self.id)
			.field("component", &self.component.as_ref().map(|c| c.name()))
			.field("children", &self.children)
			.field("has_guard", &self.guard.is_some())
			.field("redirect_to", &self.redirect_to)
			.field("prefetch_eager", &self.prefetch_eager)
			.finish()
	}
}

impl RouteDefinition {
	/// Creates a route for `path`.
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			id: None,
			component: None,
			children: Vec::new(),
			guard: None,
			redirect_to: None,
			prefetch_eager: false,
		}
	}

	/// Sets the route id, used together with the path as prefetch cache key.
	pub fn id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}

	/// Sets the component rendered for this route.
	pub fn component<C: LoadableComponent>(mut self, component: C) -> Self {
		self.component = Some(Rc::new(component));
		self
	}

	/// Sets an already shared component.
	pub fn shared_component(mut self, component: Rc<dyn LoadableComponent>) -> Self {
		self.component = Some(component);
		self
	}

	/// Appends a child route.
	pub fn child(mut self, child: RouteDefinition) -> Self {
		self.children.push(Rc::new(child));
		self
	}

	/// Appends several child routes.
	pub fn children(mut self, children: impl IntoIterator<Item = RouteDefinition>) -> Self {
		self.children.extend(children.into_iter().map(Rc::new));
		self
	}

	/// Adds a synchronous entry guard.
	pub fn can_enter<G>(mut self, guard: G) -> Self
	where
		G: Fn(&Location, &FlatRoute) -> bool + 'static,
	{
		self.guard = Some(Rc::new(move |location, route| {
			let allowed = guard(location, route);
			async move { Ok(allowed) }.boxed_local()
		}));
		self
	}

	/// Adds an asynchronous, fallible entry guard.
	///
	/// An `Err` is treated like `Ok(false)`.
	pub fn can_enter_async<G, Fut>(mut self, guard: G) -> Self
	where
		G: Fn(&Location, &FlatRoute) -> Fut + 'static,
		Fut: Future<Output = Result<bool, HookError>> + 'static,
	{
		self.guard = Some(Rc::new(move |location, route| {
			guard(location, route).boxed_local()
		}));
		self
	}

	/// Redirects to `target` (replacing the history entry) whenever this route matches.
	pub fn redirect_to(mut self, target: impl Into<String>) -> Self {
		self.redirect_to = Some(target.into());
		self
	}

	/// Prefetches the component as soon as the enclosing scope mounts.
	pub fn prefetch_eager(mut self, eager: bool) -> Self {
		self.prefetch_eager = eager;
		self
	}

	/// The authored path segment.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// The route id.
	pub fn route_id(&self) -> Option<&str> {
		self.id.as_deref()
	}

	/// The route component.
	pub fn route_component(&self) -> Option<&Rc<dyn LoadableComponent>> {
		self.component.as_ref()
	}

	/// Child routes in declaration order.
	pub fn child_routes(&self) -> &[Rc<RouteDefinition>] {
		&self.children
	}

	/// The entry guard.
	pub fn guard(&self) -> Option<&RouteGuard> {
		self.guard.as_ref()
	}

	/// The redirect target.
	pub fn redirect_target(&self) -> Option<&str> {
		self.redirect_to.as_deref()
	}

	/// Whether the route prefetches eagerly.
	pub fn is_prefetch_eager(&self) -> bool {
		self.prefetch_eager
	}
}

/// A route with its full path from the tree root and a link to its parent.
pub struct FlatRoute {
	path: String,
	pattern: PathPattern,
	definition: Rc<RouteDefinition>,
	parent: Option<Rc<FlatRoute>>,
}

impl FlatRoute {
	pub(crate) fn new(
		path: String,
		definition: Rc<RouteDefinition>,
		parent: Option<Rc<FlatRoute>>,
	) -> Self {
		Self {
			pattern: PathPattern::new(&path),
			path,
			definition,
			parent,
		}
	}

	/// The full concatenated path pattern.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// The compiled pattern.
	pub fn pattern(&self) -> &PathPattern {
		&self.pattern
	}

	/// The declaration this route was flattened from.
	pub fn definition(&self) -> &Rc<RouteDefinition> {
		&self.definition
	}

	/// The immediate parent route.
	pub fn parent(&self) -> Option<&Rc<FlatRoute>> {
		self.parent.as_ref()
	}

	/// The route id.
	pub fn id(&self) -> Option<&str> {
		self.definition.route_id()
	}

	/// The route component.
	pub fn component(&self) -> Option<&Rc<dyn LoadableComponent>> {
		self.definition.route_component()
	}

	/// Iterates over the ancestors, nearest first.
	pub fn ancestors(&self) -> Ancestors<'_> {
		Ancestors {
			next: self.parent.as_deref(),
		}
	}

	/// Returns whether both refer to the same declared route at the same full path.
	pub fn same_route(&self, other: &FlatRoute) -> bool {
		Rc::ptr_eq(&self.definition, &other.definition) && self.path == other.path
	}
}

impl fmt::Debug for FlatRoute {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FlatRoute")
			.field("path", &self.path)
			.field("id", &self.definition.route_id())
			.field("parent", &self.parent.as_ref().map(|p| p.path()))
			.finish()
	}
}

impl fmt::Display for FlatRoute {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.path)
	}
}

/// Iterator over a route's ancestors.
#[derive(Debug)]
pub struct Ancestors<'a> {
	next: Option<&'a FlatRoute>,
}

impl<'a> Iterator for Ancestors<'a> {
	type Item = &'a FlatRoute;

	fn next(&mut self) -> Option<Self::Item> {
		let current = self.next?;
		self.next = current.parent.as_deref();
		Some(current)
	}
}
