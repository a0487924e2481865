//! UI-facing services shared across clients.

mod restaurants;

pub use restaurants::RestaurantService;

use crate::error::{Error, NetworkError};
use crate::store::StoreKey;

/// Result of a write that may have been deferred
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    /// The server confirmed the write
    Sent(T),
    /// Applied locally and queued for replay
    Queued {
        queue_key: StoreKey,
        value: T,
        /// Network failure that caused the deferral; `None` when the write
        /// was folded into a create that has not reached the server yet
        cause: Option<NetworkError>,
    },
    /// Applied locally to a record the server never saw; nothing to send
    Local(T),
}

impl<T> WriteOutcome<T> {
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }

    pub const fn value(&self) -> &T {
        match self {
            Self::Sent(value) | Self::Queued { value, .. } | Self::Local(value) => value,
        }
    }

    /// Split into the deferral error, if any, and the value
    pub fn into_parts(self) -> (Option<Error>, T) {
        match self {
            Self::Sent(value) | Self::Local(value) => (None, value),
            Self::Queued { value, cause, .. } => (cause.map(Error::Network), value),
        }
    }
}
