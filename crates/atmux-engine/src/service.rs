//! The seam between the engine and domain logic.
//!
//! The engine arbitrates channels and classifies lines; it never knows
//! what `+CREG` means. Each [`ServiceKind`] is backed by one [`Service`]
//! implementation that builds command lines from requests and consumes
//! the unsolicited reports routed to it.

use atmux_core::error::{Error, Result};
use atmux_core::types::{AtResponse, Payload, RadioState, RequestId};

use crate::channel::CommandDescriptor;

/// Domain handler for one service.
pub trait Service: Send + Sync {
    /// Build the command for a request.
    ///
    /// Called once per accepted submission, after radio gating. Errors
    /// are delivered to the submitter without touching any channel.
    fn prepare(&self, request: RequestId, payload: &Payload) -> Result<CommandDescriptor>;

    /// Consume an unsolicited report routed to this service.
    ///
    /// `pdu` carries the second line of a two-line SMS report. Called on
    /// the reader task; implementations must not block.
    fn on_unsolicited(&self, line: &str, pdu: Option<&str>);

    /// Answer a request locally while the radio is off or unavailable.
    ///
    /// Only consulted for routes with the `LocalWhenOffline` policy, so
    /// state queries can be answered from cached knowledge (e.g. a
    /// synthesized absent-SIM card status) without a live modem.
    fn offline_response(
        &self,
        request: RequestId,
        payload: &Payload,
        state: RadioState,
    ) -> Result<AtResponse> {
        let _ = (request, payload, state);
        Err(Error::RadioNotAvailable)
    }
}
