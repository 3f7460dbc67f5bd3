//! Radio availability state machine.
//!
//! Tracks whether the radio stack can be talked to at all. Channel loss
//! forces [`RadioState::Unavailable`] and makes it sticky: no state store
//! can leave Unavailable until the channels have been re-opened. Every
//! real transition is broadcast exactly once.

use std::sync::Mutex;

use atmux_core::events::LinkEvent;
use atmux_core::types::{RadioState, SimStatus};
use tokio::sync::broadcast;

/// Last observed network registration, kept so registration queries can
/// be answered without a round-trip. Flushed whenever the radio powers
/// off; stale cells must not leak into the next power-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationCache {
    pub status: Option<i64>,
    pub lac: Option<i64>,
    pub cell_id: Option<i64>,
    pub operator: Option<String>,
}

impl RegistrationCache {
    fn reset(&mut self) {
        *self = RegistrationCache::default();
    }
}

struct RadioInner {
    state: RadioState,
    /// Set on channel loss, cleared on re-open. While set, every state
    /// store collapses to Unavailable.
    link_down: bool,
    registration: RegistrationCache,
}

/// Shared radio availability state.
pub struct RadioStateMachine {
    inner: Mutex<RadioInner>,
    events: broadcast::Sender<LinkEvent>,
}

impl RadioStateMachine {
    fn locked(&self) -> std::sync::MutexGuard<'_, RadioInner> {
        self.inner.lock().expect("radio state lock poisoned")
    }

    pub(crate) fn new(events: broadcast::Sender<LinkEvent>) -> Self {
        RadioStateMachine {
            inner: Mutex::new(RadioInner {
                state: RadioState::Unavailable,
                link_down: false,
                registration: RegistrationCache::default(),
            }),
            events,
        }
    }

    /// Current availability.
    pub fn state(&self) -> RadioState {
        self.locked().state
    }

    /// Store a new state.
    ///
    /// While the link is down the stored state is forced to Unavailable
    /// regardless of what the caller asked for. Same-state stores emit
    /// nothing.
    pub fn set_state(&self, new: RadioState) {
        let (old, new) = {
            let mut inner = self.locked();
            let effective = if inner.link_down {
                RadioState::Unavailable
            } else {
                new
            };
            let old = inner.state;
            if old == effective {
                return;
            }
            inner.state = effective;
            (old, effective)
        };
        tracing::info!(%old, %new, "radio state changed");
        let _ = self.events.send(LinkEvent::RadioStateChanged { old, new });
    }

    /// Derive and store the state implied by a SIM status report.
    pub fn on_sim_status(&self, status: SimStatus) {
        self.set_state(status.into());
    }

    /// Radio power-off: flush the registration cache, then go Off.
    pub fn power_off(&self) {
        self.locked().registration.reset();
        self.set_state(RadioState::Off);
    }

    /// A channel died; availability is lost until re-open.
    pub(crate) fn on_channel_lost(&self) {
        self.locked().link_down = true;
        self.set_state(RadioState::Unavailable);
    }

    /// Channels re-opened; the radio starts over powered off.
    pub(crate) fn on_channels_reopened(&self) {
        self.locked().link_down = false;
        self.set_state(RadioState::Off);
    }

    /// Snapshot of the cached registration.
    pub fn registration(&self) -> RegistrationCache {
        self.locked().registration.clone()
    }

    /// Update the cached registration from an unsolicited or polled report.
    pub fn update_registration<F>(&self, f: F)
    where
        F: FnOnce(&mut RegistrationCache),
    {
        f(&mut self.locked().registration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> (RadioStateMachine, broadcast::Receiver<LinkEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (RadioStateMachine::new(tx), rx)
    }

    #[test]
    fn starts_unavailable() {
        let (radio, _rx) = machine();
        assert_eq!(radio.state(), RadioState::Unavailable);
    }

    #[test]
    fn transition_broadcasts_exactly_once() {
        let (radio, mut rx) = machine();
        radio.set_state(RadioState::Off);
        radio.set_state(RadioState::Off);
        match rx.try_recv() {
            Ok(LinkEvent::RadioStateChanged { old, new }) => {
                assert_eq!(old, RadioState::Unavailable);
                assert_eq!(new, RadioState::Off);
            }
            other => panic!("expected one state change, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unavailable_is_sticky_while_link_down() {
        let (radio, _rx) = machine();
        radio.on_channels_reopened();
        radio.set_state(RadioState::On);
        assert_eq!(radio.state(), RadioState::On);

        radio.on_channel_lost();
        assert_eq!(radio.state(), RadioState::Unavailable);
        radio.set_state(RadioState::On);
        assert_eq!(radio.state(), RadioState::Unavailable);

        radio.on_channels_reopened();
        assert_eq!(radio.state(), RadioState::Off);
        radio.set_state(RadioState::On);
        assert_eq!(radio.state(), RadioState::On);
    }

    #[test]
    fn sim_status_drives_state() {
        let (radio, _rx) = machine();
        radio.on_channels_reopened();
        radio.on_sim_status(SimStatus::Absent);
        assert_eq!(radio.state(), RadioState::SimLockedOrAbsent);
        radio.on_sim_status(SimStatus::NotReady);
        assert_eq!(radio.state(), RadioState::SimNotReady);
        radio.on_sim_status(SimStatus::Ready);
        assert_eq!(radio.state(), RadioState::SimReady);
    }

    #[test]
    fn power_off_flushes_registration_cache() {
        let (radio, _rx) = machine();
        radio.on_channels_reopened();
        radio.set_state(RadioState::On);
        radio.update_registration(|reg| {
            reg.status = Some(1);
            reg.lac = Some(0xd509);
            reg.cell_id = Some(0x80d4);
            reg.operator = Some("26201".into());
        });
        assert_eq!(radio.registration().status, Some(1));

        radio.power_off();
        assert_eq!(radio.state(), RadioState::Off);
        assert_eq!(radio.registration(), RegistrationCache::default());
    }
}
