//! The single reader task.
//!
//! One task owns the read halves of every channel and waits on all of
//! them at once; whichever produces bytes first is framed into lines and
//! processed inline. Re-opened channels are attached through a control
//! channel, and a cancellation token stops the task.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use atmux_core::error::Result;
use atmux_core::transport::TransportRead;
use atmux_core::types::{ChannelId, ChannelRole};
use futures_util::future::select_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::channel::Channel;
use crate::classify::{classify, Classification};
use crate::dispatch::MuxInner;
use crate::framer::LineFramer;
use crate::router::is_sms_report;

/// Control messages for the reader task.
pub(crate) enum ReaderCtl {
    /// Start reading a re-opened channel.
    Attach {
        channel: ChannelId,
        read: Box<dyn TransportRead>,
    },
}

/// Reader-side state of one channel.
pub(crate) struct ChannelReader {
    channel: Arc<Channel>,
    read: Box<dyn TransportRead>,
    framer: LineFramer,
    /// First line of a two-line SMS report, held until its PDU arrives.
    sms_first: Option<String>,
}

impl ChannelReader {
    pub(crate) fn new(channel: Arc<Channel>, read: Box<dyn TransportRead>) -> Self {
        let framer = LineFramer::new(channel.id());
        ChannelReader {
            channel,
            read,
            framer,
            sms_first: None,
        }
    }
}

enum Wake {
    Cancelled,
    Ctl(Option<ReaderCtl>),
    Read(usize, Result<Vec<u8>>),
}

pub(crate) async fn reader_loop(
    inner: Arc<MuxInner>,
    mut readers: Vec<ChannelReader>,
    mut ctl: mpsc::Receiver<ReaderCtl>,
    cancel: CancellationToken,
) {
    tracing::debug!(channels = readers.len(), "reader task started");
    loop {
        let wake = {
            let mut waits: Vec<Pin<Box<dyn Future<Output = Wake> + Send + '_>>> =
                Vec::with_capacity(readers.len() + 2);
            waits.push(Box::pin(async {
                cancel.cancelled().await;
                Wake::Cancelled
            }));
            waits.push(Box::pin(async { Wake::Ctl(ctl.recv().await) }));
            for (idx, reader) in readers.iter_mut().enumerate() {
                waits.push(Box::pin(async move {
                    let mut buf = [0u8; 1024];
                    match reader.read.read(&mut buf).await {
                        Ok(n) => Wake::Read(idx, Ok(buf[..n].to_vec())),
                        Err(e) => Wake::Read(idx, Err(e)),
                    }
                }));
            }
            let (wake, _, _) = select_all(waits).await;
            wake
        };

        match wake {
            Wake::Cancelled => break,
            Wake::Ctl(None) => break,
            Wake::Ctl(Some(ReaderCtl::Attach { channel, read })) => {
                match inner.channels.get(&channel) {
                    Some(ch) => {
                        tracing::info!(channel = %channel, "reading re-opened channel");
                        readers.push(ChannelReader::new(ch.clone(), read));
                    }
                    None => tracing::warn!(channel = %channel, "attach for unknown channel"),
                }
            }
            Wake::Read(idx, Ok(bytes)) if bytes.is_empty() => {
                let reader = readers.swap_remove(idx);
                tracing::warn!(channel = %reader.channel.id(), "eof");
                inner.handle_channel_loss(&reader.channel).await;
            }
            Wake::Read(idx, Ok(bytes)) => {
                readers[idx].framer.feed(&bytes);
                while let Some(line) = readers[idx].framer.next_line() {
                    process_line(&inner, &mut readers[idx], line).await;
                }
            }
            Wake::Read(idx, Err(e)) => {
                let reader = readers.swap_remove(idx);
                tracing::warn!(channel = %reader.channel.id(), error = %e, "read failed");
                inner.handle_channel_loss(&reader.channel).await;
            }
        }
    }
    tracing::debug!("reader task stopped");
}

/// Process one framed line from a channel.
///
/// Two-line SMS reports bypass classification entirely: the PDU line is
/// raw payload and must never be mistaken for a response.
async fn process_line(inner: &Arc<MuxInner>, reader: &mut ChannelReader, line: String) {
    let channel = &reader.channel;
    tracing::trace!(channel = %channel.id(), line = %line, "recv");

    if let Some(first) = reader.sms_first.take() {
        inner.route_unsolicited(channel.role(), &first, Some(&line));
        return;
    }
    if is_sms_report(&line) {
        reader.sms_first = Some(line);
        return;
    }

    let decision = {
        let st = channel.state.lock().await;
        let view = st.pending_view();
        classify(view.as_ref(), channel.role() == ChannelRole::Data, &line)
    };

    match decision {
        Classification::Unsolicited => inner.route_unsolicited(channel.role(), &line, None),
        Classification::Intermediate => {
            let mut st = channel.state.lock().await;
            if let Some(pending) = st.pending.as_mut() {
                pending.response.intermediates.push(line);
            }
        }
        Classification::Prompt => {
            let body = {
                let mut st = channel.state.lock().await;
                st.pending.as_mut().and_then(|p| p.session.body.take())
            };
            if let Some(body) = body {
                if let Err(e) = channel.write_body(&body).await {
                    tracing::warn!(channel = %channel.id(), error = %e, "body write failed");
                    inner.handle_channel_loss(channel).await;
                }
            }
        }
        Classification::FinalSuccess => inner.complete_pending(channel, line, true).await,
        Classification::FinalError => inner.complete_pending(channel, line, false).await,
    }
}
