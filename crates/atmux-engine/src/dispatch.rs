//! Request dispatch and lifecycle.
//!
//! [`Mux`] is the public face of the engine. Requests enter through
//! [`Mux::submit`] (outcome by handle) or [`Mux::query`] (await with a
//! deadline), are gated on radio availability, routed to a channel by a
//! per-request route table, and arbitrated by the channel's queue.
//! Completion runs on the reader task: the session's callback decides
//! whether to deliver, chain a follow-up command, or continue on another
//! channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use atmux_core::error::{Error, Result};
use atmux_core::events::LinkEvent;
use atmux_core::transport::Transport;
use atmux_core::types::{
    AtResponse, ChannelId, ChannelRole, Cookie, Payload, RadioState, RequestId, ServiceKind,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::channel::{Admission, Channel, CompletionAction, Pending, Session};
use crate::radio::RadioStateMachine;
use crate::reader::{self, ChannelReader, ReaderCtl};
use crate::router::{default_prefix_table, UnsolRouter};
use crate::service::Service;

/// Default deadline for [`Mux::query`].
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the [`LinkEvent`] broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Radio availability gate applied before a request touches a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatePolicy {
    /// Dispatch regardless of radio state.
    AnyState,
    /// Reject while the radio is unavailable or off.
    RequiresRadioOn,
    /// Power control: allowed while off, rejected only when unavailable.
    PowerControl,
    /// While the radio is unavailable or off, answer locally through
    /// [`Service::offline_response`] instead of touching a channel.
    LocalWhenOffline,
}

/// Where and under what gate a request runs.
#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub service: ServiceKind,
    pub channel: ChannelId,
    pub policy: StatePolicy,
}

impl Route {
    pub fn new(service: ServiceKind, channel: ChannelId, policy: StatePolicy) -> Self {
        Route {
            service,
            channel,
            policy,
        }
    }
}

/// Identity and role of one channel in the multiplex.
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    pub id: ChannelId,
    pub role: ChannelRole,
}

impl ChannelConfig {
    pub fn new(id: ChannelId, role: ChannelRole) -> Self {
        ChannelConfig { id, role }
    }
}

/// Handle to an accepted submission.
pub struct SubmittedRequest {
    /// The session cookie, or [`Cookie::LOCAL`] for locally answered
    /// requests.
    pub cookie: Cookie,
    /// The channel the session was bound to, if any.
    pub channel: Option<ChannelId>,
    outcome: oneshot::Receiver<Result<AtResponse>>,
}

impl SubmittedRequest {
    /// Await the session's outcome. Delivered exactly once: either the
    /// completion callback's verdict or the failure it was flushed with.
    pub async fn outcome(self) -> Result<AtResponse> {
        self.outcome.await.map_err(|_| Error::ChannelClosed)?
    }
}

/// Builder for [`Mux`].
pub struct MuxBuilder {
    channels: Vec<(ChannelConfig, Box<dyn Transport>)>,
    services: HashMap<ServiceKind, Arc<dyn Service>>,
    routes: HashMap<RequestId, Route>,
    prefix_table: Vec<(&'static str, ServiceKind)>,
    query_timeout: Duration,
}

impl MuxBuilder {
    pub fn new() -> Self {
        MuxBuilder {
            channels: Vec::new(),
            services: HashMap::new(),
            routes: HashMap::new(),
            prefix_table: default_prefix_table(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Add a channel over its transport.
    pub fn channel(mut self, config: ChannelConfig, transport: Box<dyn Transport>) -> Self {
        self.channels.push((config, transport));
        self
    }

    /// Register the handler for a service.
    pub fn service(mut self, kind: ServiceKind, service: Arc<dyn Service>) -> Self {
        self.services.insert(kind, service);
        self
    }

    /// Register the route for a request.
    pub fn route(mut self, request: RequestId, route: Route) -> Self {
        self.routes.insert(request, route);
        self
    }

    /// Replace the unsolicited prefix table.
    pub fn prefix_table(mut self, table: Vec<(&'static str, ServiceKind)>) -> Self {
        self.prefix_table = table;
        self
    }

    /// Deadline applied by [`Mux::query`].
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Split the transports, spawn the reader task, and power the radio
    /// state machine up into `Off`.
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> Mux {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let radio = Arc::new(RadioStateMachine::new(events.clone()));
        let router = UnsolRouter::new(self.prefix_table, self.services.clone());
        let (ctl_tx, ctl_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let mut channels = HashMap::new();
        let mut readers = Vec::with_capacity(self.channels.len());
        for (config, transport) in self.channels {
            let (read, write) = transport.split();
            let channel = Arc::new(Channel::connected(config.id, config.role, write));
            readers.push(ChannelReader::new(channel.clone(), read));
            channels.insert(config.id, channel);
        }

        let inner = Arc::new(MuxInner {
            channels,
            services: self.services,
            routes: self.routes,
            router,
            radio,
            events,
            reader_ctl: ctl_tx,
            cancel: cancel.clone(),
            query_timeout: self.query_timeout,
        });

        tokio::spawn(reader::reader_loop(inner.clone(), readers, ctl_rx, cancel));
        inner.radio.on_channels_reopened();
        Mux { inner }
    }
}

impl Default for MuxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The AT channel multiplexer.
#[derive(Clone)]
pub struct Mux {
    inner: Arc<MuxInner>,
}

pub(crate) struct MuxInner {
    pub(crate) channels: HashMap<ChannelId, Arc<Channel>>,
    services: HashMap<ServiceKind, Arc<dyn Service>>,
    routes: HashMap<RequestId, Route>,
    router: UnsolRouter,
    pub(crate) radio: Arc<RadioStateMachine>,
    events: broadcast::Sender<LinkEvent>,
    reader_ctl: mpsc::Sender<ReaderCtl>,
    cancel: CancellationToken,
    query_timeout: Duration,
}

impl Mux {
    /// Start building a multiplexer.
    pub fn builder() -> MuxBuilder {
        MuxBuilder::new()
    }

    /// Submit a request; the outcome arrives through the returned handle.
    ///
    /// Gating, preparation, and channel binding happen before this
    /// returns, so callers observe rejection (unknown request, radio
    /// gate, closed channel) immediately.
    pub async fn submit(&self, request: RequestId, payload: Payload) -> Result<SubmittedRequest> {
        let inner = &self.inner;
        let route = *inner
            .routes
            .get(&request)
            .ok_or(Error::Unsupported(request))?;
        let service = inner
            .services
            .get(&route.service)
            .ok_or(Error::Unsupported(request))?;

        let state = inner.radio.state();
        match route.policy {
            StatePolicy::AnyState => {}
            StatePolicy::PowerControl => {
                if state == RadioState::Unavailable {
                    return Err(Error::RadioNotAvailable);
                }
            }
            StatePolicy::RequiresRadioOn => {
                if matches!(state, RadioState::Unavailable | RadioState::Off) {
                    tracing::debug!(%request, %state, "rejected by radio gate");
                    return Err(Error::RadioNotAvailable);
                }
            }
            StatePolicy::LocalWhenOffline => {
                if matches!(state, RadioState::Unavailable | RadioState::Off) {
                    let response = service.offline_response(request, &payload, state)?;
                    tracing::debug!(%request, %state, "answered locally");
                    let (tx, rx) = oneshot::channel();
                    let _ = tx.send(Ok(response));
                    return Ok(SubmittedRequest {
                        cookie: Cookie::LOCAL,
                        channel: None,
                        outcome: rx,
                    });
                }
            }
        }

        let descriptor = service.prepare(request, &payload)?;
        let channel = inner
            .channels
            .get(&route.channel)
            .ok_or(Error::ChannelClosed)?;
        let (tx, rx) = oneshot::channel();
        let session = Session::new(request, payload, descriptor, Some(tx));

        match channel.admit(session).await {
            Admission::Sent { cookie, command } => {
                if let Err(e) = channel.write_line(&command).await {
                    inner.handle_channel_loss(channel).await;
                    return Err(e);
                }
                Ok(SubmittedRequest {
                    cookie,
                    channel: Some(route.channel),
                    outcome: rx,
                })
            }
            Admission::Queued { cookie } => Ok(SubmittedRequest {
                cookie,
                channel: Some(route.channel),
                outcome: rx,
            }),
            Admission::Rejected(_) => Err(Error::ChannelClosed),
        }
    }

    /// Submit and await the outcome under the configured deadline.
    ///
    /// A deadline miss means the modem stopped answering; the session's
    /// channel is failed exactly as if its transport had died.
    pub async fn query(&self, request: RequestId, payload: Payload) -> Result<AtResponse> {
        let submitted = self.submit(request, payload).await?;
        let channel = submitted.channel;
        match tokio::time::timeout(self.inner.query_timeout, submitted.outcome()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(%request, "no final response within deadline");
                if let Some(id) = channel {
                    self.fail_channel(id).await;
                }
                Err(Error::Timeout)
            }
        }
    }

    /// Force-close a channel, flushing every live session with a failure.
    pub async fn fail_channel(&self, id: ChannelId) {
        if let Some(channel) = self.inner.channels.get(&id) {
            self.inner.handle_channel_loss(channel).await;
        }
    }

    /// Re-open a lost channel over a fresh transport.
    pub async fn reopen_channel(&self, id: ChannelId, transport: Box<dyn Transport>) -> Result<()> {
        let channel = self
            .inner
            .channels
            .get(&id)
            .ok_or_else(|| Error::Transport(format!("unknown channel {id}")))?;
        let (read, write) = transport.split();
        channel.open(write).await;
        self.inner
            .reader_ctl
            .send(ReaderCtl::Attach { channel: id, read })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        let _ = self.inner.events.send(LinkEvent::ChannelOpened { channel: id });
        self.inner.radio.on_channels_reopened();
        tracing::info!(channel = %id, "channel re-opened");
        Ok(())
    }

    /// Subscribe to link events.
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.inner.events.subscribe()
    }

    /// The shared radio state machine.
    pub fn radio(&self) -> Arc<RadioStateMachine> {
        self.inner.radio.clone()
    }

    /// Stop the reader task. Channels are not flushed; use
    /// [`fail_channel`](Mux::fail_channel) first if outcomes matter.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

impl MuxInner {
    /// Handle the final response of a channel's in-flight command.
    ///
    /// Runs on the reader task. The completion callback runs under the
    /// channel state lock; any follow-up writes happen after it drops.
    pub(crate) async fn complete_pending(
        &self,
        channel: &Arc<Channel>,
        final_line: String,
        success: bool,
    ) {
        let (follow_up, moved) = {
            let mut st = channel.state.lock().await;
            let Some(mut pending) = st.pending.take() else {
                // lost a race with a flush; the session already failed
                tracing::debug!(channel = %channel.id(), line = %final_line, "final response after flush");
                return;
            };
            pending.response.success = success;
            pending.response.final_response = final_line;
            let mut session = pending.session;
            let meta = session.meta.clone();
            tracing::debug!(
                channel = %channel.id(),
                cookie = %meta.cookie,
                final_response = %pending.response.final_response,
                "command complete"
            );
            debug_assert!(st.cookie_in_use(meta.cookie));

            match (session.on_complete)(&pending.response, &meta) {
                CompletionAction::Done(outcome) => {
                    if let Some(sink) = session.sink.take() {
                        let _ = sink.send(outcome);
                    }
                    st.release_cookie(meta.cookie);
                    (Self::next_command(&mut st), None)
                }
                CompletionAction::Chain(descriptor) => {
                    session.absorb(descriptor);
                    let command = session.command.clone();
                    st.pending = Some(Pending::new(session));
                    (Some(command), None)
                }
                CompletionAction::MoreChannelWork {
                    channel: target,
                    descriptor,
                } => {
                    session.absorb(descriptor);
                    st.release_cookie(meta.cookie);
                    (Self::next_command(&mut st), Some((target, session)))
                }
            }
        };

        if let Some(command) = follow_up {
            if let Err(e) = channel.write_line(&command).await {
                tracing::warn!(channel = %channel.id(), error = %e, "write failed");
                self.handle_channel_loss(channel).await;
            }
        }
        if let Some((target, session)) = moved {
            self.dispatch_to(target, session).await;
        }
    }

    /// Pop the next queued session into the pending slot, or go idle.
    fn next_command(st: &mut crate::channel::ChannelState) -> Option<String> {
        match st.queue.pop_front() {
            Some(next) => {
                let command = next.command.clone();
                st.pending = Some(Pending::new(next));
                Some(command)
            }
            None => {
                st.busy = false;
                None
            }
        }
    }

    /// Bind a continued session to another channel.
    async fn dispatch_to(&self, id: ChannelId, session: Session) {
        let Some(channel) = self.channels.get(&id) else {
            tracing::warn!(channel = %id, "continuation names unknown channel");
            session.fail(Error::ChannelClosed);
            return;
        };
        match channel.admit(session).await {
            Admission::Sent { command, .. } => {
                if let Err(e) = channel.write_line(&command).await {
                    tracing::warn!(channel = %id, error = %e, "write failed");
                    self.handle_channel_loss(channel).await;
                }
            }
            Admission::Queued { .. } => {}
            Admission::Rejected(session) => session.fail(Error::ChannelClosed),
        }
    }

    /// Channel loss path: close, flush every live session with a failure,
    /// then make the loss observable. Idempotent per closure.
    pub(crate) async fn handle_channel_loss(&self, channel: &Arc<Channel>) {
        let Some(sessions) = channel.close().await else {
            return;
        };
        tracing::warn!(channel = %channel.id(), flushed = sessions.len(), "channel lost");
        for session in sessions {
            session.fail(Error::GenericFailure);
        }
        self.radio.on_channel_lost();
        let _ = self.events.send(LinkEvent::ChannelClosed {
            channel: channel.id(),
        });
    }

    /// Route one unsolicited line, unless the radio is unavailable.
    pub(crate) fn route_unsolicited(&self, role: ChannelRole, line: &str, pdu: Option<&str>) {
        if self.radio.state() == RadioState::Unavailable {
            tracing::trace!(line = %line, "unsolicited ignored while unavailable");
            return;
        }
        self.router.route(role, line, pdu);
    }
}
