// src/watch/mod.rs

//! File watching and dispatch.
//!
//! Compiles `[[watch]]` rules, runs a debounced recursive watcher on the
//! project root and turns each debounced batch into at most one run request.
//! Dependency closure is left to the scheduler.

pub mod event_handler;
pub mod path_utils;
pub mod rules;
pub mod watcher;

pub use rules::{WatchDispatcher, WatchRule};
pub use watcher::{spawn_watcher, WatcherHandle};
