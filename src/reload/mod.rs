// src/reload/mod.rs

//! Reload broadcasting towards connected development clients.
//!
//! The core only needs [`ReloadBroadcaster::broadcast`]. Delivery is
//! at-least-once and unordered; the transport lives in [`livereload`].

use std::fmt::Debug;

use tracing::debug;

pub mod livereload;

pub use livereload::{LiveReloadServer, DEFAULT_PORT};

/// Notify connected development clients that `path` changed.
pub trait ReloadBroadcaster: Send + Sync + Debug {
    fn broadcast(&self, path: &str);
}

/// Broadcaster used when live reload is disabled.
#[derive(Debug, Clone, Default)]
pub struct DisabledBroadcaster;

impl ReloadBroadcaster for DisabledBroadcaster {
    fn broadcast(&self, path: &str) {
        debug!(path = %path, "live reload disabled; not broadcasting");
    }
}
