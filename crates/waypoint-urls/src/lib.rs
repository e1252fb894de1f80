//! Waypoint URLs
//!
//! Route declaration and path matching for the waypoint navigation core.
//!
//! ## Features
//!
//! - **Route trees**: [`RouteDefinition`] builders with guards, redirects and lazily
//!   loaded components
//! - **Path matching**: literal, `:param`, `:param?` and `*rest` segments
//! - **Flattening**: [`flatten`] turns a route tree into an ordered list of
//!   [`FlatRoute`]s with parent back-references
//! - **Typed parameters**: [`RouteParams::parse`] for `FromStr` extraction
//! - **URL helpers**: base prefix handling and query manipulation on [`url::Url`]
//!
//! ## Example
//!
//! ```ignore
//! use waypoint_urls::{RouteDefinition, match_all};
//! use std::rc::Rc;
//!
//! let routes = vec![Rc::new(
//!     RouteDefinition::new("/users").child(RouteDefinition::new("/:id")),
//! )];
//! let matches = match_all("/users/42", &routes);
//! assert_eq!(matches[0].route.path(), "/users/:id");
//! assert_eq!(matches[0].params.get("id"), Some("42"));
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod location;
pub mod params;
pub mod pattern;
pub mod route;

pub use error::{HookError, LoadError, PathError};
pub use location::{
	FALLBACK_ORIGIN, Location, join_base, parse_url, relative_href, set_query_param, strip_base,
	trim_trailing_slash,
};
pub use params::RouteParams;
pub use pattern::{
	MatchOptions, PathPattern, RouteMatch, Segment, first_match, flatten, flatten_under, match_all,
	match_flat, match_segment, match_segment_with,
};
pub use route::{
	Ancestors, FlatRoute, GuardFuture, LazyComponent, LoadFuture, LoadableComponent,
	RouteDefinition, RouteGuard, StaticComponent,
};
