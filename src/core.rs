//! Runtime primitives
//!
//! Observable signals with explicit subscriptions, update batching and local
//! task spawning. Everything the navigation runtime exposes to a rendering
//! layer is a [`Signal`](waypoint_core::Signal) from this module.

pub use waypoint_core::*;
