//! Link lifecycle event types.
//!
//! Events are emitted through a [`tokio::sync::broadcast`] channel when
//! channel or radio availability changes. Embedders subscribe to drive
//! reconnect logic and upper-layer state notifications without polling.

use crate::types::{ChannelId, RadioState};

/// An event emitted when the multiplex's availability changes.
///
/// Events are delivered on a best-effort basis through a bounded broadcast
/// channel; slow consumers may miss events under load.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// The radio availability state changed.
    ///
    /// Emitted exactly once per transition, never for a same-state store.
    RadioStateChanged {
        /// State before the transition.
        old: RadioState,
        /// State after the transition.
        new: RadioState,
    },

    /// A channel was lost (EOF, read error, or final-response timeout).
    ///
    /// Every session queued on the channel has already been flushed with
    /// a failure by the time this event is observable.
    ChannelClosed {
        /// Which channel was lost.
        channel: ChannelId,
    },

    /// A previously lost channel was re-opened over a fresh transport.
    ChannelOpened {
        /// Which channel was re-opened.
        channel: ChannelId,
    },
}
