//! Observable state primitives.
//!
//! - [`Signal`]: a value cell that notifies explicit subscribers on write
//! - [`Subscription`]: RAII handle for a registered subscriber
//! - [`batch`]: groups writes so observers see them atomically

pub mod runtime;
pub mod signal;

pub use runtime::{NodeId, batch, is_batching};
pub use signal::{Signal, Subscription};
