//! Per-channel command arbitration.
//!
//! Each [`Channel`] owns one write half and a state block guarding the
//! single-in-flight invariant: at most one command is on the wire per
//! channel, later sessions wait in a FIFO queue. Sessions are identified
//! by per-channel cookies, unique among the channel's live sessions and
//! recycled after completion.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use atmux_core::error::{Error, Result};
use atmux_core::transport::TransportWrite;
use atmux_core::types::{
    AtResponse, ChannelId, ChannelRole, Cookie, Payload, RequestId, ResponseKind,
};
use tokio::sync::{oneshot, Mutex};

use crate::framer::PendingView;

/// Cookies wrap after this many allocations.
pub const MAX_COOKIE: u32 = 9999;

/// SMS body terminator (Ctrl-Z).
const BODY_TERMINATOR: u8 = 0x1a;

/// Delivery slot for a session's outcome.
pub type OutcomeSink = oneshot::Sender<Result<AtResponse>>;

/// Completion callback, run when a session's final response arrives.
///
/// Returns what happens next: deliver an outcome, chain a follow-up
/// command on the same channel, or continue on another channel.
pub type CompletionFn = Box<dyn FnMut(&AtResponse, &SessionMeta) -> CompletionAction + Send>;

/// Decision returned by a completion callback.
pub enum CompletionAction {
    /// The session is finished; deliver this outcome to the submitter.
    Done(Result<AtResponse>),
    /// Send a follow-up command on the same channel without releasing it.
    /// The session keeps its cookie; queued sessions keep waiting.
    Chain(CommandDescriptor),
    /// The session continues on another channel. This channel is released
    /// and the session re-enters arbitration over there.
    MoreChannelWork {
        channel: ChannelId,
        descriptor: CommandDescriptor,
    },
}

/// One AT command and how to handle its response.
pub struct CommandDescriptor {
    /// Command line without the trailing `\r`.
    pub command: String,
    /// Expected response shape.
    pub kind: ResponseKind,
    /// Intermediate line prefix (for `SingleLine`/`MultiLine`).
    pub prefix: String,
    /// Message body to write after the SMS prompt, without the Ctrl-Z.
    pub body: Option<String>,
    /// Completion callback.
    pub on_complete: CompletionFn,
}

impl CommandDescriptor {
    pub fn new(command: impl Into<String>, kind: ResponseKind) -> Self {
        CommandDescriptor {
            command: command.into(),
            kind,
            prefix: String::new(),
            body: None,
            on_complete: crate::callbacks::default_response(),
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn on_complete(mut self, f: CompletionFn) -> Self {
        self.on_complete = f;
        self
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("command", &self.command)
            .field("kind", &self.kind)
            .field("prefix", &self.prefix)
            .field("body", &self.body.is_some())
            .finish()
    }
}

/// Identity of a session, visible to completion callbacks.
#[derive(Debug, Clone)]
pub struct SessionMeta {
    pub cookie: Cookie,
    pub request: RequestId,
    pub channel: ChannelId,
    pub payload: Payload,
}

/// A request bound to a channel, queued or in flight.
pub(crate) struct Session {
    pub meta: SessionMeta,
    pub command: String,
    pub kind: ResponseKind,
    pub prefix: String,
    pub body: Option<String>,
    pub on_complete: CompletionFn,
    pub sink: Option<OutcomeSink>,
}

impl Session {
    pub(crate) fn new(
        request: RequestId,
        payload: Payload,
        descriptor: CommandDescriptor,
        sink: Option<OutcomeSink>,
    ) -> Self {
        Session {
            meta: SessionMeta {
                cookie: Cookie::LOCAL,
                request,
                channel: ChannelId::from_index(0),
                payload,
            },
            command: descriptor.command,
            kind: descriptor.kind,
            prefix: descriptor.prefix,
            body: descriptor.body,
            on_complete: descriptor.on_complete,
            sink,
        }
    }

    /// Replace the command while keeping identity and outcome sink.
    pub(crate) fn absorb(&mut self, descriptor: CommandDescriptor) {
        self.command = descriptor.command;
        self.kind = descriptor.kind;
        self.prefix = descriptor.prefix;
        self.body = descriptor.body;
        self.on_complete = descriptor.on_complete;
    }

    /// Fail the session without a response (flush or rejection).
    pub(crate) fn fail(mut self, err: Error) {
        if let Some(sink) = self.sink.take() {
            let _ = sink.send(Err(err));
        }
    }
}

/// In-flight session plus its accumulating response.
pub(crate) struct Pending {
    pub session: Session,
    pub response: AtResponse,
}

impl Pending {
    pub(crate) fn new(session: Session) -> Self {
        Pending {
            session,
            response: AtResponse::default(),
        }
    }
}

/// Mutable channel state, behind the channel's state lock.
pub(crate) struct ChannelState {
    pub open: bool,
    pub busy: bool,
    pub pending: Option<Pending>,
    pub queue: VecDeque<Session>,
    cookies: HashSet<u32>,
    next_cookie: u32,
}

impl ChannelState {
    fn new() -> Self {
        ChannelState {
            open: false,
            busy: false,
            pending: None,
            queue: VecDeque::new(),
            cookies: HashSet::new(),
            next_cookie: 0,
        }
    }

    /// Allocate a cookie unique among this channel's live sessions.
    pub(crate) fn allocate_cookie(&mut self) -> Cookie {
        loop {
            self.next_cookie = self.next_cookie % MAX_COOKIE + 1;
            if self.cookies.insert(self.next_cookie) {
                return Cookie::new(self.next_cookie);
            }
        }
    }

    /// Release a completed session's cookie for reuse.
    pub(crate) fn release_cookie(&mut self, cookie: Cookie) {
        self.cookies.remove(&cookie.raw());
    }

    /// `true` if a live session on this channel holds `cookie`.
    pub(crate) fn cookie_in_use(&self, cookie: Cookie) -> bool {
        self.cookies.contains(&cookie.raw())
    }

    /// Snapshot of the pending command for the classifier.
    pub(crate) fn pending_view(&self) -> Option<PendingView> {
        self.pending.as_ref().map(|p| PendingView {
            kind: p.session.kind,
            prefix: p.session.prefix.clone(),
            has_intermediate: !p.response.intermediates.is_empty(),
            body_queued: p.session.body.is_some(),
        })
    }
}

/// How [`Channel::admit`] disposed of a session.
pub(crate) enum Admission {
    /// The channel was idle; the caller must now write `command`.
    Sent { cookie: Cookie, command: String },
    /// A command is in flight; the session joined the queue.
    Queued { cookie: Cookie },
    /// The channel is closed; the session is handed back.
    Rejected(Session),
}

/// One logical AT channel.
pub struct Channel {
    id: ChannelId,
    role: ChannelRole,
    pub(crate) state: Mutex<ChannelState>,
    writer: Mutex<Option<Box<dyn TransportWrite>>>,
}

impl Channel {
    #[cfg(test)]
    pub(crate) fn new(id: ChannelId, role: ChannelRole) -> Self {
        Channel {
            id,
            role,
            state: Mutex::new(ChannelState::new()),
            writer: Mutex::new(None),
        }
    }

    /// A channel born open, with its write half attached.
    pub(crate) fn connected(
        id: ChannelId,
        role: ChannelRole,
        writer: Box<dyn TransportWrite>,
    ) -> Self {
        let mut state = ChannelState::new();
        state.open = true;
        Channel {
            id,
            role,
            state: Mutex::new(state),
            writer: Mutex::new(Some(writer)),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    /// Attach a write half and mark the channel open.
    pub(crate) async fn open(&self, writer: Box<dyn TransportWrite>) {
        *self.writer.lock().await = Some(writer);
        let mut st = self.state.lock().await;
        st.open = true;
        st.busy = false;
        st.pending = None;
        st.queue.clear();
    }

    /// Bind a session to this channel: send immediately if idle, queue
    /// otherwise.
    pub(crate) async fn admit(&self, mut session: Session) -> Admission {
        let mut st = self.state.lock().await;
        if !st.open {
            return Admission::Rejected(session);
        }
        let cookie = st.allocate_cookie();
        session.meta.cookie = cookie;
        session.meta.channel = self.id;
        if st.busy {
            tracing::debug!(channel = %self.id, cookie = %cookie, "channel busy, session queued");
            st.queue.push_back(session);
            Admission::Queued { cookie }
        } else {
            st.busy = true;
            let command = session.command.clone();
            st.pending = Some(Pending::new(session));
            Admission::Sent { cookie, command }
        }
    }

    /// Write one command line, appending the `\r` terminator.
    pub(crate) async fn write_line(&self, command: &str) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::ChannelClosed)?;
        tracing::debug!(channel = %self.id, command = %command, "send");
        let mut bytes = command.as_bytes().to_vec();
        bytes.push(b'\r');
        writer.write_all(&bytes).await
    }

    /// Write a message body, appending the Ctrl-Z terminator.
    pub(crate) async fn write_body(&self, body: &str) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::ChannelClosed)?;
        tracing::debug!(channel = %self.id, len = body.len(), "send body");
        let mut bytes = body.as_bytes().to_vec();
        bytes.push(BODY_TERMINATOR);
        writer.write_all(&bytes).await
    }

    /// Close the channel, detaching the writer and draining every live
    /// session. Returns `None` if the channel was already closed, so the
    /// loss path runs exactly once.
    pub(crate) async fn close(&self) -> Option<Vec<Session>> {
        let sessions = {
            let mut st = self.state.lock().await;
            if !st.open {
                return None;
            }
            st.open = false;
            st.busy = false;
            st.cookies.clear();
            let mut sessions = Vec::with_capacity(st.queue.len() + 1);
            if let Some(pending) = st.pending.take() {
                sessions.push(pending.session);
            }
            sessions.extend(st.queue.drain(..));
            sessions
        };
        *self.writer.lock().await = None;
        Some(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmux_core::types::ResponseKind;

    fn session(cmd: &str) -> Session {
        Session::new(
            RequestId::new(1),
            Payload::Null,
            CommandDescriptor::new(cmd, ResponseKind::NoResult),
            None,
        )
    }

    fn sunk_session(cmd: &str) -> (Session, oneshot::Receiver<Result<AtResponse>>) {
        let (tx, rx) = oneshot::channel();
        let s = Session::new(
            RequestId::new(1),
            Payload::Null,
            CommandDescriptor::new(cmd, ResponseKind::NoResult),
            Some(tx),
        );
        (s, rx)
    }

    #[test]
    fn cookies_skip_live_values_and_wrap() {
        let mut st = ChannelState::new();
        st.next_cookie = MAX_COOKIE - 1;
        let a = st.allocate_cookie();
        assert_eq!(a.raw(), MAX_COOKIE);
        let b = st.allocate_cookie();
        assert_eq!(b.raw(), 1);
        // 1 is still live, so the next allocation skips it
        st.next_cookie = 0;
        let c = st.allocate_cookie();
        assert_eq!(c.raw(), 2);
        st.release_cookie(b);
        assert!(!st.cookie_in_use(b));
        assert!(st.cookie_in_use(c));
    }

    #[tokio::test]
    async fn admit_rejects_on_closed_channel() {
        let ch = Channel::new(ChannelId::from_index(0), ChannelRole::Command);
        match ch.admit(session("AT")).await {
            Admission::Rejected(_) => {}
            _ => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn admit_sends_when_idle_and_queues_when_busy() {
        let ch = Channel::new(ChannelId::from_index(0), ChannelRole::Command);
        {
            let mut st = ch.state.lock().await;
            st.open = true;
        }
        match ch.admit(session("AT+CSQ")).await {
            Admission::Sent { command, .. } => assert_eq!(command, "AT+CSQ"),
            _ => panic!("expected immediate send"),
        }
        match ch.admit(session("AT+CREG?")).await {
            Admission::Queued { .. } => {}
            _ => panic!("expected queueing"),
        }
        let st = ch.state.lock().await;
        assert_eq!(st.queue.len(), 1);
        assert!(st.busy);
    }

    #[tokio::test]
    async fn close_drains_pending_and_queue_once() {
        let ch = Channel::new(ChannelId::from_index(0), ChannelRole::Command);
        {
            let mut st = ch.state.lock().await;
            st.open = true;
        }
        let (s1, mut rx1) = sunk_session("ATD555;");
        let (s2, mut rx2) = sunk_session("AT+CSQ");
        ch.admit(s1).await;
        ch.admit(s2).await;

        let drained = ch.close().await.expect("first close drains");
        assert_eq!(drained.len(), 2);
        for s in drained {
            s.fail(Error::GenericFailure);
        }
        assert!(matches!(rx1.try_recv(), Ok(Err(Error::GenericFailure))));
        assert!(matches!(rx2.try_recv(), Ok(Err(Error::GenericFailure))));

        // second close is a no-op
        assert!(ch.close().await.is_none());
    }

    #[tokio::test]
    async fn pending_view_tracks_intermediates_and_body() {
        let ch = Channel::new(ChannelId::from_index(0), ChannelRole::Command);
        {
            let mut st = ch.state.lock().await;
            st.open = true;
        }
        let desc = CommandDescriptor::new("AT+CMGS=6", ResponseKind::SingleLine)
            .prefix("+CMGS:")
            .body("1A2B3C");
        let s = Session::new(RequestId::new(2), Payload::Null, desc, None);
        ch.admit(s).await;

        let mut st = ch.state.lock().await;
        let view = st.pending_view().expect("pending command");
        assert_eq!(view.kind, ResponseKind::SingleLine);
        assert_eq!(view.prefix, "+CMGS:");
        assert!(view.body_queued);
        assert!(!view.has_intermediate);

        st.pending
            .as_mut()
            .expect("pending command")
            .response
            .intermediates
            .push("+CMGS: 1".into());
        assert!(st.pending_view().expect("pending command").has_intermediate);
    }
}
