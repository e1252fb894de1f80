//! Waypoint Core
//!
//! Runtime primitives shared by the waypoint navigation crates.
//!
//! - [`reactive`]: observable [`Signal`]s with explicit subscriptions and batching
//! - [`spawn`]: fire-and-forget local task spawning plus a cooperative yield point
//!
//! Everything here is single-threaded: values are shared with `Rc` and tasks are
//! spawned on the current thread's local executor.

#![warn(missing_docs)]

pub mod reactive;
pub mod spawn;

pub use reactive::{Signal, Subscription, batch};
pub use spawn::{set_spawner, spawn_local, yield_now};
