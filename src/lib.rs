//! # Waypoint
//!
//! Client-side navigation core for single-page applications.
//!
//! Waypoint keeps the browser's session history and an application's route tree
//! in sync. It matches paths against nested route declarations, guards and
//! redirects navigations, loads route components lazily (with prefetching) and
//! retains the subtrees of inactive routes. Rendering is left to the UI layer,
//! which observes the navigation state through [`Signal`]s.
//!
//! ## Feature Flags
//!
//! - `minimal` - Observable store and path matching only (with `default-features = false`)
//! - `pages` (default) - History sync, navigation store, route resolution,
//!   prefetching and keep-alive
//! - `full` - All features enabled
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use waypoint::prelude::*;
//!
//! let router = Router::new(RouterSettings::new(), HistoryBridge::browser())?;
//! let root = router.routes(vec![
//!     RouteDefinition::new("/").component(StaticComponent::new("Home", home)),
//!     RouteDefinition::new("/docs")
//!         .component(LazyComponent::new("Docs", load_docs))
//!         .child(RouteDefinition::new("/:page")),
//!     RouteDefinition::new("/old-docs").redirect_to("/docs"),
//! ]);
//!
//! let _render = root.active_route().subscribe(move || render());
//! router.push("/docs/intro")?;
//! ```
//!
//! ## Module Organization
//!
//! - [`core`] - Signals, batching and local task spawning
//! - [`urls`] - Route declarations and path matching
//! - [`pages`] - The navigation runtime

pub mod core;
#[cfg(feature = "pages")]
pub mod pages;
pub mod urls;

pub use waypoint_core::{Signal, Subscription, batch};
pub use waypoint_urls::{
	FlatRoute, LazyComponent, LoadableComponent, RouteDefinition, RouteMatch, RouteParams,
	StaticComponent,
};

#[cfg(feature = "pages")]
pub use waypoint_pages::{
	HistoryBridge, Link, NavigateOptions, NavigationStore, RouteResolver, Router, RouterError,
	RouterResult, RouterSettings,
};

/// Re-exports for the common case.
pub mod prelude {
	pub use crate::{
		FlatRoute, LazyComponent, LoadableComponent, RouteDefinition, RouteMatch, RouteParams,
		Signal, StaticComponent, Subscription, batch,
	};
	pub use waypoint_urls::{HookError, LoadError, PathError};

	#[cfg(feature = "pages")]
	pub use crate::{
		HistoryBridge, Link, NavigateOptions, NavigationStore, RouteResolver, Router, RouterError,
		RouterResult, RouterSettings,
	};
	#[cfg(feature = "pages")]
	pub use waypoint_pages::{
		KeepAliveElement, KeepAliveRegistry, NavigationType, PrefetchCache, PrefetchMode,
		ResolverState,
	};
}
