//! Error types for atmux.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! request-arbitration errors are all captured here.

use crate::types::RequestId;

/// The error type for all atmux operations.
///
/// Variants cover the full range of failure modes encountered when driving
/// a cellular modem over multiplexed AT channels: physical link failures,
/// malformed response lines, timeouts, and radio availability.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, muxed tty, socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed response line, bad token).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for the final response to a command.
    ///
    /// A timeout is treated exactly like a channel loss: the modem firmware
    /// has stopped answering and the link can no longer be trusted.
    #[error("timeout waiting for final response")]
    Timeout,

    /// No route is registered for this request.
    #[error("unsupported request: {0}")]
    Unsupported(RequestId),

    /// The channel is closed; requests are rejected until it is re-opened.
    #[error("channel closed")]
    ChannelClosed,

    /// The radio is off or unavailable and the request needs it on.
    #[error("radio not available")]
    RadioNotAvailable,

    /// The command completed with a failure final response, or the session
    /// was flushed by a channel loss.
    #[error("generic failure")]
    GenericFailure,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
