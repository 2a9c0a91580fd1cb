mod coordinator;
mod fallback;

pub use coordinator::SyncCoordinator;
pub use fallback::ServeStale;
