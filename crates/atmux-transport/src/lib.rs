//! atmux-transport: concrete transports for atmux channels.
//!
//! Each AT channel needs one bidirectional byte stream to the modem. On
//! real hardware these are muxed tty devices or USB virtual COM ports,
//! both covered by [`SerialTransport`]. In-memory transports for tests
//! live in the `atmux-test-harness` crate.

pub mod serial;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
