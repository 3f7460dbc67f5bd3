//! atmux-engine: the AT channel multiplexing engine.
//!
//! Several logical AT channels to one modem, each carrying at most one
//! in-flight command, with a single reader task framing and classifying
//! every line the modem produces. Requests are routed to channels by a
//! per-request table, gated on radio availability, and completed through
//! per-session callbacks; unsolicited reports are routed to their owning
//! service by prefix.
//!
//! Domain knowledge lives behind the [`Service`] trait. The engine knows
//! the AT protocol's shape (final responses, intermediates, the SMS
//! prompt) but never the meaning of any particular command.
//!
//! # Entry point
//!
//! Build a [`Mux`] with one transport per channel, a [`Service`] per
//! [`ServiceKind`](atmux_core::ServiceKind), and a route per request:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use atmux_core::*;
//! # use atmux_engine::*;
//! # async fn example(net: Arc<dyn Service>, t1: Box<dyn Transport>) -> Result<()> {
//! let get_signal = RequestId::new(1);
//! let ch = ChannelId::from_index(0);
//! let mux = Mux::builder()
//!     .channel(ChannelConfig::new(ch, ChannelRole::Command), t1)
//!     .service(ServiceKind::Network, net)
//!     .route(get_signal, Route::new(ServiceKind::Network, ch, StatePolicy::RequiresRadioOn))
//!     .build();
//! let response = mux.query(get_signal, Payload::Null).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

pub mod callbacks;
mod channel;
pub mod classify;
mod dispatch;
pub mod framer;
mod radio;
mod reader;
mod router;
mod service;

pub use channel::{
    CommandDescriptor, CompletionAction, CompletionFn, OutcomeSink, SessionMeta, MAX_COOKIE,
};
pub use classify::{classify, Classification};
pub use dispatch::{ChannelConfig, Mux, MuxBuilder, Route, StatePolicy, SubmittedRequest};
pub use framer::{LineFramer, PendingView, MAX_LINE_BUFFER, SMS_PROMPT};
pub use radio::{RadioStateMachine, RegistrationCache};
pub use router::default_prefix_table;
pub use service::Service;
