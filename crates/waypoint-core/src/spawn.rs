//! Local task spawning.
//!
//! Route resolution and prefetching run as detached local tasks. On
//! `wasm32-unknown-unknown` they go to `wasm_bindgen_futures::spawn_local`;
//! natively they go to `tokio::task::spawn_local`, which must be called from
//! inside a `tokio::task::LocalSet`. Hosts with another executor install their
//! own spawner with [`set_spawner`].

use core::cell::RefCell;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

extern crate alloc;
use alloc::boxed::Box;
use alloc::rc::Rc;

/// A boxed, non-`Send` unit future.
pub type LocalTask = Pin<Box<dyn Future<Output = ()> + 'static>>;

type SpawnerFn = Rc<dyn Fn(LocalTask)>;

thread_local! {
	static SPAWNER: RefCell<Option<SpawnerFn>> = const { RefCell::new(None) };
}

/// Install the function used by [`spawn_local`] on this thread.
///
/// # Example
///
/// ```ignore
/// waypoint_core::set_spawner(|task| my_executor.spawn_local(task));
/// ```
pub fn set_spawner<F>(spawner: F)
where
	F: Fn(LocalTask) + 'static,
{
	SPAWNER.with(|slot| *slot.borrow_mut() = Some(Rc::new(spawner)));
}

/// Remove a spawner installed with [`set_spawner`].
pub fn clear_spawner() {
	SPAWNER.with(|slot| slot.borrow_mut().take());
}

/// Spawn a detached task on the current thread.
pub fn spawn_local<F>(future: F)
where
	F: Future<Output = ()> + 'static,
{
	let custom = SPAWNER.with(|slot| slot.borrow().clone());
	if let Some(spawner) = custom {
		spawner(Box::pin(future));
		return;
	}

	#[cfg(all(target_family = "wasm", target_os = "unknown"))]
	wasm_bindgen_futures::spawn_local(future);

	#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
	{
		drop(tokio::task::spawn_local(future));
	}
}

/// Yield once to the executor so other ready tasks can make progress.
pub fn yield_now() -> YieldNow {
	YieldNow { yielded: false }
}

/// Future returned by [`yield_now`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
	yielded: bool,
}

impl Future for YieldNow {
	type Output = ();

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
		if self.yielded {
			return Poll::Ready(());
		}
		self.yielded = true;
		cx.waker().wake_by_ref();
		Poll::Pending
	}
}
