//! Event-flag bus shared by every task
//!
//! A single 32-bit flag word behind a `watch` channel. Setting bits and
//! test-and-clearing a group both happen inside one `send_modify` closure,
//! so no set can be lost between a waiter's check and its clear.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::trace;

use crate::types::EventFlags;

/// Cloneable handle to the shared flag word.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: Arc<watch::Sender<EventFlags>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(EventFlags::EMPTY);
        Self { tx: Arc::new(tx) }
    }

    /// Set `flags` and wake every waiter.
    pub fn set(&self, flags: EventFlags) {
        trace!(?flags, "Set flags");
        self.tx.send_modify(|word| *word |= flags);
    }

    /// Clear `flags` without waking anyone.
    pub fn clear(&self, flags: EventFlags) {
        self.tx.send_if_modified(|word| {
            *word = word.without(flags);
            false
        });
    }

    /// Current flag word.
    pub fn peek(&self) -> EventFlags {
        *self.tx.borrow()
    }

    /// Clear and return whichever bits of `mask` are set, without waiting.
    pub fn try_take(&self, mask: EventFlags) -> EventFlags {
        let mut taken = EventFlags::EMPTY;
        self.tx.send_if_modified(|word| {
            taken = word.masked(mask);
            *word = word.without(mask);
            false
        });
        taken
    }

    /// Wait until any bit of `mask` is set, then clear and return exactly
    /// the bits of `mask` that were set.
    ///
    /// Cancel safe: bits are only cleared on the path that returns them.
    pub async fn wait_any(&self, mask: EventFlags) -> EventFlags {
        let mut rx = self.tx.subscribe();
        loop {
            let taken = self.try_take(mask);
            if !taken.is_empty() {
                return taken;
            }
            // The bus owns the sender, so the channel cannot close under us
            if rx.changed().await.is_err() {
                return EventFlags::EMPTY;
            }
        }
    }
}
