//! Core types used throughout atmux.
//!
//! These types describe the AT protocol surface in a service-agnostic way:
//! channel identities and roles, command response shapes, request and
//! session identifiers, radio availability, and the accumulated response
//! returned to callers.

use std::fmt;

/// Opaque request payload handed through to the owning service.
///
/// The engine routes and arbitrates requests but never inspects their
/// arguments; services decode the payload when building the command line.
pub type Payload = serde_json::Value;

/// Identifier of one logical AT channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Create a `ChannelId` from a raw index.
    pub const fn from_index(index: u8) -> Self {
        ChannelId(index)
    }

    /// Return the raw numeric index of this channel.
    pub fn index(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel-{}", self.0)
    }
}

/// Role a channel plays in the multiplex.
///
/// The role changes two protocol decisions: `CONNECT` is a final success
/// only on the data channel, and non-call unsolicited lines are honored
/// only on the dedicated unsolicited channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    /// General command/response traffic.
    Command,
    /// Data-call channel; `CONNECT` terminates a dial command here.
    Data,
    /// Dedicated unsolicited-report channel.
    Unsolicited,
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelRole::Command => "command",
            ChannelRole::Data => "data",
            ChannelRole::Unsolicited => "unsolicited",
        };
        write!(f, "{s}")
    }
}

/// Expected response shape of an AT command.
///
/// Determines which lines between the command and its final response are
/// captured as intermediates and which are routed as unsolicited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// Only a final response is expected; every other line is unsolicited.
    NoResult,
    /// One bare numeric line (e.g. `AT+CSQ` on some firmwares).
    Numeric,
    /// One prefixed line (e.g. `+CSQ:` for `AT+CSQ`).
    SingleLine,
    /// Zero or more prefixed lines (e.g. `+CLCC:` per active call).
    MultiLine,
}

/// Identifier of a request kind, assigned by the embedding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u32);

impl RequestId {
    pub const fn new(raw: u32) -> Self {
        RequestId(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "REQ-{}", self.0)
    }
}

/// Per-channel session identifier.
///
/// Allocated when a request is accepted onto a channel, unique among that
/// channel's live sessions, and recycled after the session completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cookie(u32);

impl Cookie {
    /// Marker for requests completed locally, never dispatched to a channel.
    pub const LOCAL: Cookie = Cookie(0);

    pub const fn new(raw: u32) -> Self {
        Cookie(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Functional service a request or unsolicited report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// Voice call control (dial, hangup, call list).
    Call,
    /// Device and power control (radio power, baseband info).
    Device,
    /// Network registration and signal quality.
    Network,
    /// SMS and cell broadcast.
    Messaging,
    /// Packet data contexts.
    PacketData,
    /// SIM card access.
    Sim,
    /// Supplementary services (call waiting, forwarding, USSD).
    Supplementary,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceKind::Call => "call",
            ServiceKind::Device => "device",
            ServiceKind::Network => "network",
            ServiceKind::Messaging => "messaging",
            ServiceKind::PacketData => "packet-data",
            ServiceKind::Sim => "sim",
            ServiceKind::Supplementary => "supplementary",
        };
        write!(f, "{s}")
    }
}

/// Availability of the radio stack.
///
/// Ordering of the SIM-derived states mirrors modem bring-up: locked or
/// absent, then present but initializing, then ready, then registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadioState {
    /// Channel lost or modem unresponsive; sticky until channels re-open.
    Unavailable,
    /// Radio powered off.
    Off,
    /// SIM absent, PIN/PUK locked, or network-personalization locked.
    SimLockedOrAbsent,
    /// SIM present but not yet initialized.
    SimNotReady,
    /// SIM initialized and usable.
    SimReady,
    /// Radio fully on.
    On,
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RadioState::Unavailable => "unavailable",
            RadioState::Off => "off",
            RadioState::SimLockedOrAbsent => "sim-locked-or-absent",
            RadioState::SimNotReady => "sim-not-ready",
            RadioState::SimReady => "sim-ready",
            RadioState::On => "on",
        };
        write!(f, "{s}")
    }
}

/// SIM card status as reported by the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimStatus {
    Absent,
    NotReady,
    Ready,
    PinLocked,
    PukLocked,
    NetworkPersonalization,
}

impl From<SimStatus> for RadioState {
    fn from(status: SimStatus) -> Self {
        match status {
            SimStatus::Absent
            | SimStatus::PinLocked
            | SimStatus::PukLocked
            | SimStatus::NetworkPersonalization => RadioState::SimLockedOrAbsent,
            SimStatus::NotReady => RadioState::SimNotReady,
            SimStatus::Ready => RadioState::SimReady,
        }
    }
}

/// Well-known `+CME ERROR` code: SIM not inserted.
pub const CME_SIM_NOT_INSERTED: i64 = 10;

/// Accumulated response to one AT command.
///
/// Intermediate lines appear in arrival order. The final response line is
/// the verbatim marker the modem sent (`OK`, `ERROR`, `+CME ERROR: 10`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtResponse {
    /// `true` when the final response was a success marker.
    pub success: bool,
    /// The final response line, verbatim.
    pub final_response: String,
    /// Intermediate lines in the order they arrived.
    pub intermediates: Vec<String>,
}

impl AtResponse {
    /// A synthesized success response with no intermediates.
    pub fn ok() -> Self {
        AtResponse {
            success: true,
            final_response: "OK".to_string(),
            intermediates: Vec::new(),
        }
    }

    /// Extract the numeric code from a `+CME ERROR: <n>` final response.
    ///
    /// Returns `None` when the command succeeded or failed with a different
    /// marker, or when the code does not parse.
    pub fn cme_error(&self) -> Option<i64> {
        if self.success {
            return None;
        }
        let rest = self.final_response.strip_prefix("+CME ERROR:")?;
        rest.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_display() {
        assert_eq!(ChannelId::from_index(2).to_string(), "channel-2");
        assert_eq!(ChannelId::from_index(2).index(), 2);
    }

    #[test]
    fn request_id_display() {
        assert_eq!(RequestId::new(7).to_string(), "REQ-7");
    }

    #[test]
    fn cookie_display_and_local() {
        assert_eq!(Cookie::new(42).to_string(), "#42");
        assert_eq!(Cookie::LOCAL.raw(), 0);
    }

    #[test]
    fn sim_status_maps_to_radio_state() {
        assert_eq!(
            RadioState::from(SimStatus::Absent),
            RadioState::SimLockedOrAbsent
        );
        assert_eq!(
            RadioState::from(SimStatus::PinLocked),
            RadioState::SimLockedOrAbsent
        );
        assert_eq!(RadioState::from(SimStatus::NotReady), RadioState::SimNotReady);
        assert_eq!(RadioState::from(SimStatus::Ready), RadioState::SimReady);
    }

    #[test]
    fn cme_error_extracts_code() {
        let r = AtResponse {
            success: false,
            final_response: "+CME ERROR: 10".into(),
            intermediates: vec![],
        };
        assert_eq!(r.cme_error(), Some(CME_SIM_NOT_INSERTED));
    }

    #[test]
    fn cme_error_none_for_success_or_other_markers() {
        assert_eq!(AtResponse::ok().cme_error(), None);
        let r = AtResponse {
            success: false,
            final_response: "ERROR".into(),
            intermediates: vec![],
        };
        assert_eq!(r.cme_error(), None);
    }

    #[test]
    fn cme_error_none_for_garbage_code() {
        let r = AtResponse {
            success: false,
            final_response: "+CME ERROR: banana".into(),
            intermediates: vec![],
        };
        assert_eq!(r.cme_error(), None);
    }
}
