//! atmux-test-harness: scriptable mock modem for deterministic tests.
//!
//! [`mock_link`] yields a [`Transport`] for the engine side and a
//! [`MockModem`] for the test side, joined by an in-memory duplex stream.
//! The test plays the device: read the command line the engine wrote,
//! answer with response lines, or drop the modem to simulate a dead tty.
//!
//! ```no_run
//! # use atmux_test_harness::mock_link;
//! # async fn example() {
//! let (transport, mut modem) = mock_link();
//! // hand `transport` to the engine, then script the device side:
//! let cmd = modem.recv_line().await;
//! assert_eq!(cmd, "AT+CSQ");
//! modem.send_line("+CSQ: 15,99").await;
//! modem.send_line("OK").await;
//! # }
//! ```

use atmux_core::transport::{IoTransport, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// Capacity of the in-memory duplex pipe.
const PIPE_CAPACITY: usize = 16 * 1024;

/// Create a connected transport/modem pair.
pub fn mock_link() -> (Box<dyn Transport>, MockModem) {
    let (engine_side, modem_side) = tokio::io::duplex(PIPE_CAPACITY);
    (
        Box::new(IoTransport::new(engine_side)),
        MockModem {
            io: modem_side,
            buf: Vec::new(),
        },
    )
}

/// The device end of a mock link.
///
/// Dropping the modem closes the stream; the engine observes EOF on the
/// channel, exactly like a vanished tty.
pub struct MockModem {
    io: DuplexStream,
    buf: Vec<u8>,
}

impl MockModem {
    /// Read one command line written by the engine.
    ///
    /// Commands end with `\r`; the returned line excludes it.
    ///
    /// # Panics
    ///
    /// Panics if the stream closes before a full line arrives. Tests
    /// script both sides, so a short read is a test bug.
    pub async fn recv_line(&mut self) -> String {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\r') {
                let line = self.buf.drain(..=pos).take(pos).collect::<Vec<u8>>();
                return String::from_utf8(line).expect("command line was not utf-8");
            }
            self.fill().await;
        }
    }

    /// Read exactly `n` raw bytes (e.g. an SMS body plus its Ctrl-Z).
    pub async fn recv_bytes(&mut self, n: usize) -> Vec<u8> {
        while self.buf.len() < n {
            self.fill().await;
        }
        self.buf.drain(..n).collect()
    }

    /// `true` if any engine bytes are already buffered.
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Send one response line, terminated with `\r\n`.
    pub async fn send_line(&mut self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.extend_from_slice(b"\r\n");
        self.send_raw(&bytes).await;
    }

    /// Send raw bytes with no terminator (e.g. the `"> "` SMS prompt).
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.io
            .write_all(bytes)
            .await
            .expect("mock modem write failed");
        self.io.flush().await.expect("mock modem flush failed");
    }

    async fn fill(&mut self) {
        let mut chunk = [0u8; 256];
        let n = self
            .io
            .read(&mut chunk)
            .await
            .expect("mock modem read failed");
        assert!(n > 0, "engine closed the link mid-script");
        self.buf.extend_from_slice(&chunk[..n]);
    }
}
