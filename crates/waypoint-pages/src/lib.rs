//! Waypoint Pages
//!
//! Client-side navigation core for single-page applications.
//!
//! ## Features
//!
//! - **History sync**: [`HistoryBridge`] is the only writer of session history and
//!   tags every entry with a session envelope so back/forward restores state
//! - **Navigation state**: [`NavigationStore`] keeps URL, base, application state
//!   and history action observable as [`Signal`](waypoint_core::Signal)s
//! - **Route resolution**: one [`RouteResolver`] per mounted scope, with guards,
//!   redirects, leave callbacks and serialized asynchronous resolution
//! - **Nested scopes**: [`RouteResolver::outlet`] and the [`RouteContextTree`] arena
//! - **Prefetching**: [`PrefetchCache`] de-duplicates component loads, driven by
//!   [`Link`] triggers (`immediate`, `hover`, `visible`)
//! - **Keep-alive**: [`KeepAliveRegistry`] retains subtrees of inactive routes
//!   within a capacity bound
//!
//! ## Example
//!
//! ```ignore
//! use waypoint_pages::{HistoryBridge, Router, RouterSettings};
//! use waypoint_urls::RouteDefinition;
//!
//! let router = Router::new(RouterSettings::new(), HistoryBridge::browser())?;
//! let root = router.routes(vec![
//!     RouteDefinition::new("/"),
//!     RouteDefinition::new("/users/:id").can_enter(|_, _| logged_in()),
//! ]);
//! router.push("/users/42")?;
//! ```
//!
//! ## Platform
//!
//! On `wasm32-unknown-unknown` the bridge drives `window.history` and `visible`
//! prefetching uses one shared `IntersectionObserver`. Elsewhere the bridge is
//! headless unless given a backend such as [`MemoryHistory`], and resolutions
//! run on the current tokio `LocalSet`.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod history;
pub mod keep_alive;
pub mod link;
pub mod navigation;
pub mod prefetch;
pub mod resolver;
pub mod router;
pub mod settings;
pub mod visibility;

pub use context::{ContextId, RouteContextTree};
pub use error::{RouterError, RouterResult};
pub use history::{
	HistoryBackend, HistoryBridge, ListenerId, MemoryHistory, NavigationType, PopStateHandler,
	SESSION_KEY, Session,
};
pub use keep_alive::{KeepAliveElement, KeepAliveRegistry, ReleaseHook};
pub use link::Link;
pub use navigation::{NavigateOptions, NavigationStore};
pub use prefetch::{PrefetchCache, PrefetchKey, PrefetchMode, PrefetchStatus};
pub use resolver::{ResolverOptions, ResolverState, RouteResolver};
pub use router::Router;
pub use settings::{DEFAULT_MAX_REDIRECTS, RouterSettings};
pub use visibility::{ElementKey, VisibilityDispatcher};

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub use history::BrowserHistory;
#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub use visibility::DomViewportObserver;
