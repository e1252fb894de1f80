//! Route declarations and path matching
//!
//! Build route trees with [`RouteDefinition`](waypoint_urls::RouteDefinition),
//! flatten them and match pathnames against the result.
//!
//! ```rust,ignore
//! use waypoint::urls::{match_segment, RouteDefinition};
//!
//! let params = match_segment("/files/a/b.txt", "/files/*path").unwrap();
//! assert_eq!(params.get("path"), Some("a/b.txt"));
//! ```

pub use waypoint_urls::*;
