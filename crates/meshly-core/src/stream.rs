// ── Reactive state streams ──
//
// Subscription types for consuming ConfigSyncState changes from a
// session.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::state::ConfigSyncState;

/// A subscription to the session's aggregated sync state.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via the `changed()` method or by converting to a `Stream`.
pub struct StateStream {
    current: ConfigSyncState,
    receiver: watch::Receiver<ConfigSyncState>,
}

impl StateStream {
    pub(crate) fn new(receiver: watch::Receiver<ConfigSyncState>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time.
    pub fn current(&self) -> &ConfigSyncState {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> ConfigSyncState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the session has shut down.
    pub async fn changed(&mut self) -> Option<ConfigSyncState> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> StateWatchStream {
        StateWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields a new [`ConfigSyncState`] snapshot each time the session
/// publishes a mutation.
pub struct StateWatchStream {
    inner: WatchStream<ConfigSyncState>,
}

impl Stream for StateWatchStream {
    type Item = ConfigSyncState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream is Unpin when the inner type is Unpin.
        // ConfigSyncState is always Unpin, so this is safe.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
