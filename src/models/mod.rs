mod rate;
mod snapshot;

pub use rate::{normalize_code, RateRecord};
pub use snapshot::RateSnapshot;

pub(crate) use snapshot::dedupe;
