//! # atmux -- Async AT Channel Multiplexing for Cellular Modems
//!
//! `atmux` drives a cellular modem over several independent AT command
//! channels at once: one channel per service (calls, messaging, network,
//! SIM, packet data), each carrying at most one in-flight command, with a
//! single reader task that frames, classifies, and routes every line the
//! modem produces.
//!
//! ## Quick Start
//!
//! Add `atmux` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! atmux = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Open one channel per muxed tty and submit a request:
//!
//! ```no_run
//! use std::sync::Arc;
//! use atmux::{
//!     ChannelConfig, ChannelId, ChannelRole, Mux, Payload, RequestId, Route, Service,
//!     ServiceKind, StatePolicy, transport::SerialTransport,
//! };
//!
//! # async fn example(network: Arc<dyn Service>) -> atmux::Result<()> {
//! let get_signal = RequestId::new(1);
//! let cmd = ChannelId::from_index(0);
//!
//! let tty = SerialTransport::open("/dev/cmux1", 115_200).await?;
//! let mux = Mux::builder()
//!     .channel(ChannelConfig::new(cmd, ChannelRole::Command), Box::new(tty))
//!     .service(ServiceKind::Network, network)
//!     .route(
//!         get_signal,
//!         Route::new(ServiceKind::Network, cmd, StatePolicy::RequiresRadioOn),
//!     )
//!     .build();
//!
//! let response = mux.query(get_signal, Payload::Null).await?;
//! println!("signal: {:?}", response.intermediates);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                | Purpose                                         |
//! |----------------------|-------------------------------------------------|
//! | `atmux-core`         | Types, errors, transport traits, tokenizer      |
//! | `atmux-transport`    | Serial / muxed-tty transport                    |
//! | `atmux-engine`       | Framing, classification, arbitration, routing   |
//! | `atmux-test-harness` | Scriptable mock modem for tests                 |
//! | **`atmux`**          | This facade crate -- re-exports everything      |
//!
//! Domain logic lives behind the [`Service`] trait: the engine arbitrates
//! channels and classifies lines, services build commands and consume
//! unsolicited reports.
//!
//! ## Events
//!
//! Channel and radio availability changes are broadcast as [`LinkEvent`]s:
//!
//! ```no_run
//! use atmux::LinkEvent;
//! # async fn example(mux: &atmux::Mux) {
//! let mut events = mux.subscribe();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         LinkEvent::ChannelClosed { channel } => eprintln!("{channel} lost"),
//!         other => println!("{other:?}"),
//!     }
//! }
//! # }
//! ```

pub use atmux_core::*;
pub use atmux_engine::*;

/// Concrete transports (serial ports, muxed ttys).
pub mod transport {
    pub use atmux_transport::*;
}
