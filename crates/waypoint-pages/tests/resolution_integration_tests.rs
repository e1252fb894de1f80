//! Route resolution integration tests
//!
//! Success Criteria:
//! 1. Two rapid URL changes commit exactly one route, the one of the final URL
//! 2. Leave callbacks of the route active before the changes run exactly once
//! 3. Redirect sources never become active
//! 4. Guard rejection leaves the scope without an active route
//! 5. Nested outlets resolve the children of the active route
//! 6. An outlet under a guarded route commits nothing until the guard admits it
//!
//! Test Categories:
//! - Happy Path: 2 tests
//! - Error Path: 1 test
//! - Concurrency: 2 tests
//! - Use Cases: 2 tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rstest::*;
use tokio::sync::oneshot;
use waypoint_pages::{
	HistoryBridge, MemoryHistory, PrefetchCache, ResolverState, RouteResolver, Router,
	RouterSettings,
};
use waypoint_urls::{HookError, LazyComponent, RouteDefinition};

// ============================================================================
// Helpers
// ============================================================================

fn router_at(url: &str) -> (Router, MemoryHistory) {
	let memory = MemoryHistory::new(url);
	let router = Router::new(RouterSettings::new(), HistoryBridge::new(memory.clone()))
		.unwrap()
		.with_prefetch_cache(PrefetchCache::new());
	(router, memory)
}

async fn in_local<F: std::future::Future<Output = ()>>(f: F) {
	tokio::task::LocalSet::new().run_until(f).await;
}

fn active_path(scope: &RouteResolver) -> Option<String> {
	scope.active_route().get().map(|r| r.path().to_string())
}

/// Records every committed active route of `scope`.
fn record_commits(scope: &RouteResolver) -> (Rc<RefCell<Vec<String>>>, waypoint_core::Subscription) {
	let commits = Rc::new(RefCell::new(Vec::new()));
	let active = scope.active_route();
	let sink = Rc::clone(&commits);
	let subscription = scope.active_route().subscribe(move || {
		if let Some(route) = active.get() {
			sink.borrow_mut().push(route.path().to_string());
		}
	});
	(commits, subscription)
}

// ============================================================================
// Happy Path Tests (2 tests)
// ============================================================================

/// Declaration order decides between overlapping patterns
#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn test_first_declared_match_wins() {
	in_local(async {
		let (router, _memory) = router_at("/users/new");
		let root = router.routes(vec![
			RouteDefinition::new("/users/new").id("create"),
			RouteDefinition::new("/users/:id").id("detail"),
		]);
		root.wait_idle().await;

		assert_eq!(
			root.active_route().get().and_then(|r| r.id().map(str::to_string)),
			Some("create".to_string())
		);
		assert!(root.params().get().is_empty());
	})
	.await;
}

/// A redirect replaces the entry and only the target commits
#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn test_redirect_source_never_commits() {
	in_local(async {
		let (router, memory) = router_at("/");
		let root = router.routes(vec![
			RouteDefinition::new("/"),
			RouteDefinition::new("/legacy/:id").redirect_to("/items"),
			RouteDefinition::new("/items"),
		]);
		root.wait_idle().await;
		let (commits, _sub) = record_commits(&root);

		router.push("/legacy/4").unwrap();
		root.wait_idle().await;

		assert_eq!(*commits.borrow(), vec!["/items".to_string()]);
		assert_eq!(memory.len(), 2);
		assert_eq!(memory.current_url().as_deref(), Some("/items"));
	})
	.await;
}

// ============================================================================
// Error Path Tests (1 test)
// ============================================================================

/// A failing guard rejects without touching the URL
#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn test_failing_guard_rejects() {
	in_local(async {
		let (router, _memory) = router_at("/");
		let root = router.routes(vec![
			RouteDefinition::new("/"),
			RouteDefinition::new("/billing")
				.can_enter_async(|_, _| async { Err(HookError::Guard("no session".into())) }),
		]);
		root.wait_idle().await;

		router.push("/billing").unwrap();
		root.wait_idle().await;

		assert_eq!(root.state().get(), ResolverState::Rejected);
		assert!(root.active_route().get().is_none());
		assert_eq!(router.store().pathname(), "/billing");
	})
	.await;
}

// ============================================================================
// Concurrency Tests (2 tests)
// ============================================================================

/// Two URL changes in a row: one commit, final route, leave callbacks once
#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn test_rapid_changes_commit_final_route_once() {
	in_local(async {
		let (router, _memory) = router_at("/inbox");
		let root = router.routes(vec![
			RouteDefinition::new("/inbox"),
			RouteDefinition::new("/drafts"),
			RouteDefinition::new("/sent"),
		]);
		root.wait_idle().await;

		let leaves = Rc::new(Cell::new(0));
		let counter = Rc::clone(&leaves);
		root.on_leave(move || async move {
			counter.set(counter.get() + 1);
			Ok(())
		});
		let (commits, _sub) = record_commits(&root);

		router.push("/drafts").unwrap();
		router.push("/sent").unwrap();
		root.wait_idle().await;

		assert_eq!(*commits.borrow(), vec!["/sent".to_string()]);
		assert_eq!(active_path(&root).as_deref(), Some("/sent"));
		assert_eq!(leaves.get(), 1);
	})
	.await;
}

/// A change arriving while a guard is pending waits for it, then wins
#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn test_change_during_pending_guard() {
	in_local(async {
		let (router, _memory) = router_at("/inbox");
		let (tx, rx) = oneshot::channel::<bool>();
		let rx = Rc::new(RefCell::new(Some(rx)));
		let root = router.routes(vec![
			RouteDefinition::new("/inbox"),
			RouteDefinition::new("/drafts").can_enter_async(move |_, _| {
				let rx = rx.borrow_mut().take();
				async move {
					match rx {
						Some(rx) => Ok(rx.await.unwrap_or(false)),
						None => Ok(true),
					}
				}
			}),
			RouteDefinition::new("/sent"),
		]);
		root.wait_idle().await;

		let leaves = Rc::new(Cell::new(0));
		let counter = Rc::clone(&leaves);
		root.on_leave(move || async move {
			counter.set(counter.get() + 1);
			Ok(())
		});
		let (commits, _sub) = record_commits(&root);

		router.push("/drafts").unwrap();
		waypoint_core::yield_now().await;
		router.push("/sent").unwrap();
		let _ = tx.send(true);
		root.wait_idle().await;

		assert_eq!(*commits.borrow(), vec!["/sent".to_string()]);
		assert_eq!(leaves.get(), 1);
	})
	.await;
}

// ============================================================================
// Use Case Tests (2 tests)
// ============================================================================

/// Layout route with lazily loaded children rendered through an outlet
#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn test_nested_layout_with_outlet() {
	in_local(async {
		let (router, _memory) = router_at("/settings/profile");
		let loads = Rc::new(Cell::new(0));
		let lazy = |name: &'static str| {
			let loads = Rc::clone(&loads);
			LazyComponent::new(name, move || {
				loads.set(loads.get() + 1);
				async { Ok(()) }
			})
		};
		let root = router.routes(vec![
			RouteDefinition::new("/"),
			RouteDefinition::new("/settings")
				.component(lazy("SettingsLayout"))
				.child(RouteDefinition::new("/profile").component(lazy("Profile")))
				.child(RouteDefinition::new("/security").component(lazy("Security"))),
		]);
		root.wait_idle().await;
		assert_eq!(active_path(&root).as_deref(), Some("/settings"));
		assert_eq!(loads.get(), 2);

		let outlet = root.outlet();
		outlet.wait_idle().await;
		assert_eq!(active_path(&outlet).as_deref(), Some("/settings/profile"));
		assert_eq!(loads.get(), 2);

		router.push("/settings/security").unwrap();
		root.wait_idle().await;
		outlet.wait_idle().await;
		assert_eq!(active_path(&root).as_deref(), Some("/settings"));
		assert_eq!(active_path(&outlet).as_deref(), Some("/settings/security"));
		assert_eq!(loads.get(), 3);

		router.push("/").unwrap();
		root.wait_idle().await;
		outlet.wait_idle().await;
		assert_eq!(active_path(&root).as_deref(), Some("/"));
		assert_eq!(outlet.state().get(), ResolverState::NotFound);
	})
	.await;
}

/// Children of a guarded layout wait for the guard's verdict
#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn test_outlet_waits_for_parent_guard() {
	in_local(async {
		let (router, _memory) = router_at("/");
		let (tx, rx) = oneshot::channel::<bool>();
		let rx = Rc::new(RefCell::new(Some(rx)));
		let loads = Rc::new(Cell::new(0));
		let counter = Rc::clone(&loads);
		let root = router.routes(vec![
			RouteDefinition::new("/"),
			RouteDefinition::new("/settings")
				.can_enter_async(move |_, _| {
					let rx = rx.borrow_mut().take();
					async move {
						match rx {
							Some(rx) => Ok(rx.await.unwrap_or(false)),
							None => Ok(true),
						}
					}
				})
				.child(RouteDefinition::new("/security").component(LazyComponent::new(
					"Security",
					move || {
						counter.set(counter.get() + 1);
						async { Ok(()) }
					},
				))),
		]);
		root.wait_idle().await;
		let outlet = root.outlet();
		outlet.wait_idle().await;
		let (commits, _sub) = record_commits(&outlet);

		router.push("/settings/security").unwrap();
		waypoint_core::yield_now().await;
		outlet.wait_idle().await;
		assert_eq!(root.state().get(), ResolverState::Resolving);
		assert!(outlet.active_route().get().is_none());
		assert_eq!(loads.get(), 0);

		let _ = tx.send(false);
		root.wait_idle().await;
		outlet.wait_idle().await;
		assert_eq!(root.state().get(), ResolverState::Rejected);
		assert!(outlet.active_route().get().is_none());
		assert!(commits.borrow().is_empty());
		assert_eq!(loads.get(), 0);

		router.push("/").unwrap();
		root.wait_idle().await;
		router.push("/settings/security").unwrap();
		root.wait_idle().await;
		outlet.wait_idle().await;
		assert_eq!(active_path(&root).as_deref(), Some("/settings"));
		assert_eq!(active_path(&outlet).as_deref(), Some("/settings/security"));
		assert_eq!(*commits.borrow(), vec!["/settings/security".to_string()]);
		assert_eq!(loads.get(), 1);
	})
	.await;
}
