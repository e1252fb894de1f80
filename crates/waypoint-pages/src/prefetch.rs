//! Prefetch Cache
//!
//! Tracks which route components have been loaded. A route is keyed by its id
//! and full path, so the same path under two parents stays distinct. Entries
//! only move forward, `Pending` to `Loaded`. A failed load still counts as
//! loaded so it is not retried on every render, but its error is kept and
//! handed to every later caller.
//!
//! Concurrent [`PrefetchCache::ensure`] calls for one key share a single load.
//!
//! ```ignore
//! let cache = PrefetchCache::global();
//! cache.prefetch_chain(&route); // hover or visibility trigger
//! cache.ensure(&route).await?; // resolution
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{self, Shared};
use serde::{Deserialize, Serialize};
use waypoint_urls::{FlatRoute, LoadError, LoadFuture};

/// When a link prefetches its target route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchMode {
	/// As soon as the link mounts.
	Immediate,
	/// When the pointer enters the link.
	Hover,
	/// When the link scrolls into view.
	#[default]
	Visible,
	/// Never.
	None,
}

/// Load state of a route component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchStatus {
	/// A load is in flight.
	Pending,
	/// The load settled, successfully or not.
	Loaded,
}

/// Cache key of a route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefetchKey {
	/// Route id, if declared.
	pub id: Option<String>,
	/// Full flattened path.
	pub path: String,
}

impl PrefetchKey {
	/// The key of `route`.
	pub fn of(route: &FlatRoute) -> Self {
		Self {
			id: route.id().map(str::to_string),
			path: route.path().to_string(),
		}
	}
}

enum Entry {
	/// The ticket identifies the load that owns the entry.
	Pending(Shared<LoadFuture>, Rc<()>),
	Loaded(Result<(), LoadError>),
}

type Entries = RefCell<HashMap<PrefetchKey, Entry>>;

thread_local! {
	static GLOBAL: PrefetchCache = PrefetchCache::new();
}

/// Route load cache.
///
/// Cloning yields another handle to the same cache. One process-wide instance
/// is available through [`PrefetchCache::global`]; tests inject their own.
#[derive(Clone, Default)]
pub struct PrefetchCache {
	entries: Rc<Entries>,
}

impl fmt::Debug for PrefetchCache {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PrefetchCache")
			.field("entries", &self.len())
			.finish()
	}
}

impl PrefetchCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// The process-wide cache of this thread.
	pub fn global() -> Self {
		GLOBAL.with(Clone::clone)
	}

	/// Status of `route`, `None` when it was never requested.
	pub fn status(&self, route: &FlatRoute) -> Option<PrefetchStatus> {
		self.entries
			.borrow()
			.get(&PrefetchKey::of(route))
			.map(|entry| match entry {
				Entry::Pending(..) => PrefetchStatus::Pending,
				Entry::Loaded(_) => PrefetchStatus::Loaded,
			})
	}

	/// Loads the component of `route` unless already loading or loaded.
	///
	/// Callers joining an in-flight load receive its outcome. Once settled the
	/// route is `Loaded` and later calls resolve immediately to the same outcome
	/// without loading.
	pub fn ensure(&self, route: &FlatRoute) -> LoadFuture {
		let key = PrefetchKey::of(route);
		match self.entries.borrow().get(&key) {
			Some(Entry::Loaded(result)) => return future::ready(result.clone()).boxed_local(),
			Some(Entry::Pending(load, _)) => return load.clone().boxed_local(),
			None => {}
		}

		let Some(preload) = route.component().and_then(|component| component.preload()) else {
			self.entries.borrow_mut().insert(key, Entry::Loaded(Ok(())));
			return future::ready(Ok(())).boxed_local();
		};

		tracing::debug!(path = %key.path, "loading route component");
		let entries: Weak<Entries> = Rc::downgrade(&self.entries);
		let ticket = Rc::new(());
		let owner = Rc::clone(&ticket);
		let settled_key = key.clone();
		let load = async move {
			let result = preload.await;
			if let Err(err) = &result {
				tracing::warn!(path = %settled_key.path, error = %err, "route component failed to load");
			}
			if let Some(entries) = entries.upgrade() {
				if let Some(entry) = entries.borrow_mut().get_mut(&settled_key) {
					// A clear() may have handed the key to a newer load.
					if matches!(entry, Entry::Pending(_, current) if Rc::ptr_eq(current, &owner)) {
						*entry = Entry::Loaded(result.clone());
					}
				}
			}
			result
		}
		.boxed_local()
		.shared();

		self.entries
			.borrow_mut()
			.insert(key, Entry::Pending(load.clone(), ticket));
		load.boxed_local()
	}

	/// Ensures `route` and every ancestor in its chain.
	///
	/// Resolves to the first failure, after all loads settled.
	pub fn ensure_chain(&self, route: &FlatRoute) -> LoadFuture {
		let loads: Vec<LoadFuture> = std::iter::once(route)
			.chain(route.ancestors())
			.map(|route| self.ensure(route))
			.collect();
		async move {
			future::join_all(loads)
				.await
				.into_iter()
				.find_map(Result::err)
				.map_or(Ok(()), Err)
		}
		.boxed_local()
	}

	/// Starts loading `route` in the background.
	pub fn prefetch(&self, route: &FlatRoute) {
		let load = self.ensure(route);
		waypoint_core::spawn_local(async move {
			let _: Result<(), LoadError> = load.await;
		});
	}

	/// Starts loading `route` and its ancestors in the background.
	pub fn prefetch_chain(&self, route: &FlatRoute) {
		let load = self.ensure_chain(route);
		waypoint_core::spawn_local(async move {
			let _: Result<(), LoadError> = load.await;
		});
	}

	/// Forgets every entry. Loads in flight complete without being recorded.
	///
	/// Clearing also drops recorded failures, so a failed route loads again.
	pub fn clear(&self) {
		self.entries.borrow_mut().clear();
	}

	/// Number of known routes.
	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	/// Returns `true` if no route was requested.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serial_test::serial;
	use std::cell::Cell;
	use tokio::sync::oneshot;
	use waypoint_urls::{LazyComponent, LoadableComponent, RouteDefinition, StaticComponent, flatten};

	fn counted_route(path: &str, calls: &Rc<Cell<usize>>, fail: bool) -> Rc<FlatRoute> {
		let calls = Rc::clone(calls);
		let component = LazyComponent::new(path.to_string(), move || {
			calls.set(calls.get() + 1);
			async move {
				if fail {
					Err(LoadError::new("Page", "offline"))
				} else {
					Ok(())
				}
			}
		});
		let defs = vec![Rc::new(RouteDefinition::new(path).component(component))];
		flatten(&defs, "").remove(0)
	}

	#[rstest]
	#[tokio::test(flavor = "current_thread")]
	async fn test_concurrent_ensure_loads_once() {
		let calls = Rc::new(Cell::new(0));
		let route = counted_route("/a", &calls, false);
		let cache = PrefetchCache::new();

		let first = cache.ensure(&route);
		let second = cache.ensure(&route);
		assert_eq!(cache.status(&route), Some(PrefetchStatus::Pending));

		let (a, b) = futures::join!(first, second);
		assert!(a.is_ok() && b.is_ok());
		assert_eq!(cache.status(&route), Some(PrefetchStatus::Loaded));

		cache.ensure(&route).await.unwrap();
		assert_eq!(calls.get(), 1);
	}

	#[rstest]
	#[tokio::test(flavor = "current_thread")]
	async fn test_failed_load_is_still_loaded() {
		let calls = Rc::new(Cell::new(0));
		let route = counted_route("/broken", &calls, true);
		let cache = PrefetchCache::new();

		let err = cache.ensure(&route).await.unwrap_err();
		assert_eq!(err.message, "offline");
		assert_eq!(cache.status(&route), Some(PrefetchStatus::Loaded));

		let again = cache.ensure(&route).await.unwrap_err();
		assert_eq!(again, err);
		assert_eq!(calls.get(), 1);
	}

	/// Hands out a fresh load per call, each finishing when its sender fires.
	struct Gated {
		gates: RefCell<Vec<oneshot::Receiver<()>>>,
	}

	impl LoadableComponent for Gated {
		fn name(&self) -> &str {
			"Gated"
		}

		fn preload(&self) -> Option<LoadFuture> {
			let gate = self.gates.borrow_mut().remove(0);
			Some(
				async move {
					let _ = gate.await;
					Ok(())
				}
				.boxed_local(),
			)
		}

		fn as_any(&self) -> &dyn std::any::Any {
			self
		}
	}

	#[rstest]
	#[tokio::test(flavor = "current_thread")]
	async fn test_load_from_before_clear_does_not_settle_newer_entry() {
		let (first_tx, first_rx) = oneshot::channel::<()>();
		let (second_tx, second_rx) = oneshot::channel::<()>();
		let component = Gated {
			gates: RefCell::new(vec![first_rx, second_rx]),
		};
		let defs = vec![Rc::new(RouteDefinition::new("/gated").component(component))];
		let route = flatten(&defs, "").remove(0);
		let cache = PrefetchCache::new();

		let first = cache.ensure(&route);
		cache.clear();
		let second = cache.ensure(&route);
		assert_eq!(cache.status(&route), Some(PrefetchStatus::Pending));

		first_tx.send(()).unwrap();
		first.await.unwrap();
		assert_eq!(cache.status(&route), Some(PrefetchStatus::Pending));

		second_tx.send(()).unwrap();
		second.await.unwrap();
		assert_eq!(cache.status(&route), Some(PrefetchStatus::Loaded));
	}

	#[rstest]
	#[tokio::test(flavor = "current_thread")]
	async fn test_pending_until_settled() {
		let (tx, rx) = oneshot::channel::<()>();
		let rx = RefCell::new(Some(rx));
		let component = LazyComponent::new("Slow", move || {
			let rx = rx.borrow_mut().take();
			async move {
				if let Some(rx) = rx {
					let _ = rx.await;
				}
				Ok(())
			}
		});
		let defs = vec![Rc::new(RouteDefinition::new("/slow").component(component))];
		let route = flatten(&defs, "").remove(0);
		let cache = PrefetchCache::new();

		let load = cache.ensure(&route);
		assert_eq!(cache.status(&route), Some(PrefetchStatus::Pending));
		tx.send(()).unwrap();
		load.await.unwrap();
		assert_eq!(cache.status(&route), Some(PrefetchStatus::Loaded));
	}

	#[rstest]
	#[tokio::test(flavor = "current_thread")]
	async fn test_static_component_is_loaded_immediately() {
		let defs = vec![Rc::new(
			RouteDefinition::new("/home").component(StaticComponent::new("Home", ())),
		)];
		let route = flatten(&defs, "").remove(0);
		let cache = PrefetchCache::new();

		cache.ensure(&route).await.unwrap();
		assert_eq!(cache.status(&route), Some(PrefetchStatus::Loaded));
	}

	#[rstest]
	#[tokio::test(flavor = "current_thread")]
	async fn test_same_path_different_id_is_distinct() {
		let defs = vec![
			Rc::new(RouteDefinition::new("/x").id("one")),
			Rc::new(RouteDefinition::new("/x").id("two")),
		];
		let flat = flatten(&defs, "");
		let cache = PrefetchCache::new();

		cache.ensure(&flat[0]).await.unwrap();
		assert_eq!(cache.status(&flat[0]), Some(PrefetchStatus::Loaded));
		assert_eq!(cache.status(&flat[1]), None);
	}

	#[rstest]
	#[tokio::test(flavor = "current_thread")]
	async fn test_chain_cascades_to_ancestors() {
		let calls = Rc::new(Cell::new(0));
		let lazy = |name: &'static str| {
			let calls = Rc::clone(&calls);
			LazyComponent::new(name, move || {
				calls.set(calls.get() + 1);
				async { Ok(()) }
			})
		};
		let defs = vec![Rc::new(
			RouteDefinition::new("/docs")
				.component(lazy("Docs"))
				.child(RouteDefinition::new("/:page").component(lazy("Page"))),
		)];
		let flat = flatten(&defs, "");
		let cache = PrefetchCache::new();

		cache.ensure_chain(&flat[1]).await.unwrap();

		assert_eq!(calls.get(), 2);
		assert_eq!(cache.status(&flat[0]), Some(PrefetchStatus::Loaded));
		assert_eq!(cache.status(&flat[1]), Some(PrefetchStatus::Loaded));
	}

	#[rstest]
	#[tokio::test(flavor = "current_thread")]
	async fn test_prefetch_runs_in_background() {
		let calls = Rc::new(Cell::new(0));
		let route = counted_route("/bg", &calls, false);
		let cache = PrefetchCache::new();

		let local = tokio::task::LocalSet::new();
		local
			.run_until(async {
				cache.prefetch(&route);
				waypoint_core::yield_now().await;
			})
			.await;

		assert_eq!(calls.get(), 1);
		assert_eq!(cache.status(&route), Some(PrefetchStatus::Loaded));
	}

	#[rstest]
	#[serial(prefetch_global)]
	fn test_global_is_shared() {
		let calls = Rc::new(Cell::new(0));
		let route = counted_route("/global", &calls, false);
		PrefetchCache::global().clear();

		let _load = PrefetchCache::global().ensure(&route);
		assert_eq!(PrefetchCache::global().status(&route), Some(PrefetchStatus::Pending));

		PrefetchCache::global().clear();
		assert!(PrefetchCache::global().is_empty());
	}
}
