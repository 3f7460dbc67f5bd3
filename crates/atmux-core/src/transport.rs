//! Transport traits for modem communication.
//!
//! One AT channel owns one bidirectional byte stream to the modem (a muxed
//! tty, a raw serial port, a socket). The engine's reader task owns every
//! channel's read half; command writers share the write halves. [`Transport`]
//! is therefore splittable rather than a single locked object.
//!
//! [`IoTransport`] adapts any `AsyncRead + AsyncWrite` stream, which covers
//! serial ports, sockets, and the in-memory duplex pairs used in tests.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::error::Result;

/// Read half of a channel's byte stream.
#[async_trait]
pub trait TransportRead: Send {
    /// Read available bytes into `buf`.
    ///
    /// Waits until at least one byte is available. `Ok(0)` means the peer
    /// closed the stream; the channel must be treated as lost.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Write half of a channel's byte stream.
#[async_trait]
pub trait TransportWrite: Send {
    /// Write every byte of `data` and flush.
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;
}

/// A bidirectional byte stream that can be split into its two halves.
pub trait Transport: Send {
    /// Consume the transport, yielding independently owned halves.
    fn split(self: Box<Self>) -> (Box<dyn TransportRead>, Box<dyn TransportWrite>);
}

/// Adapter making any async byte stream a [`Transport`].
pub struct IoTransport<T> {
    inner: T,
}

impl<T> IoTransport<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(inner: T) -> Self {
        IoTransport { inner }
    }
}

impl<T> Transport for IoTransport<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    fn split(self: Box<Self>) -> (Box<dyn TransportRead>, Box<dyn TransportWrite>) {
        let (read, write) = tokio::io::split(self.inner);
        (Box::new(IoRead { inner: read }), Box::new(IoWrite { inner: write }))
    }
}

struct IoRead<T> {
    inner: ReadHalf<T>,
}

#[async_trait]
impl<T> TransportRead for IoRead<T>
where
    T: AsyncRead + Send + Unpin + 'static,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf).await?;
        Ok(n)
    }
}

struct IoWrite<T> {
    inner: WriteHalf<T>,
}

#[async_trait]
impl<T> TransportWrite for IoWrite<T>
where
    T: AsyncWrite + Send + Unpin + 'static,
{
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data).await?;
        self.inner.flush().await?;
        Ok(())
    }
}
