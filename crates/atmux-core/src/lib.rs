//! atmux-core: Core traits, types, and error definitions for atmux.
//!
//! This crate defines the service-agnostic abstractions the AT multiplexer
//! engine is built on. Embedding applications depend on these types without
//! pulling in the engine or any concrete transport.
//!
//! # Key types
//!
//! - [`Transport`] / [`TransportRead`] / [`TransportWrite`] -- byte-level link to the modem
//! - [`AtResponse`] -- accumulated command response
//! - [`LinkEvent`] -- channel and radio availability notifications
//! - [`AtTokenizer`] -- response line value parsing
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod tok;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use atmux_core::*`.
pub use error::{Error, Result};
pub use events::LinkEvent;
pub use tok::AtTokenizer;
pub use transport::{IoTransport, Transport, TransportRead, TransportWrite};
pub use types::*;
