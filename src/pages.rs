//! Client-side navigation runtime
//!
//! This module provides access to waypoint-pages: history synchronization,
//! the navigation store, per-scope route resolution, prefetching and
//! keep-alive retention.
//!
//! ## Architecture
//!
//! - **HistoryBridge**: sole writer of session history, session envelope handling
//! - **NavigationStore**: observable URL, base, state and history action
//! - **RouteResolver**: guarded, serialized resolution of one route scope
//! - **PrefetchCache**: de-duplicated component loading
//! - **KeepAliveRegistry**: bounded retention of inactive subtrees
//!
//! ## Example
//!
//! ```rust,ignore
//! use waypoint::pages::{HistoryBridge, MemoryHistory, Router, RouterSettings};
//!
//! let history = MemoryHistory::new("/");
//! let router = Router::new(RouterSettings::new(), HistoryBridge::new(history.clone()))?;
//! router.push("/about")?;
//! history.back();
//! assert_eq!(router.store().pathname(), "/");
//! ```

// Re-export all waypoint-pages functionality
pub use waypoint_pages::*;
