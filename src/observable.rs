//! Three-state outcome shared by one-shot queries and subscription streams.

use futures::stream::BoxStream;

use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ObservableResult<T> {
    #[default]
    Loading,
    Success(T),
    Error(SyncError),
}

/// A subscription: a stream of observations that ends when the publisher is dropped.
pub type Observation<T> = BoxStream<'static, ObservableResult<T>>;

impl<T> ObservableResult<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ObservableResult::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ObservableResult::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ObservableResult::Error(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            ObservableResult::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            ObservableResult::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ObservableResult<U> {
        match self {
            ObservableResult::Loading => ObservableResult::Loading,
            ObservableResult::Success(value) => ObservableResult::Success(f(value)),
            ObservableResult::Error(err) => ObservableResult::Error(err),
        }
    }

    /// Like [`map`](Self::map), but the mapping itself may fail.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> ObservableResult<U>) -> ObservableResult<U> {
        match self {
            ObservableResult::Loading => ObservableResult::Loading,
            ObservableResult::Success(value) => f(value),
            ObservableResult::Error(err) => ObservableResult::Error(err),
        }
    }
}

impl<T, E> From<Result<T, E>> for ObservableResult<T>
where
    E: Into<SyncError>,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => ObservableResult::Success(value),
            Err(err) => ObservableResult::Error(err.into()),
        }
    }
}
