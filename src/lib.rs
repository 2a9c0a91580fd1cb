//! Offline-first exchange rate synchronization and caching.
//!
//! A [`sync::SyncCoordinator`] answers rate queries from a [`local::LocalStore`]
//! and refreshes it from a [`remote::RemoteSource`] when bulk reads find the
//! cache stale. Consumers can also subscribe to the local rates and receive
//! the current set followed by every change.

pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
pub mod local;
pub mod models;
pub mod observable;
pub mod remote;
pub mod staleness;
pub mod storage;
pub mod sync;
