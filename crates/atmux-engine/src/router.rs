//! Unsolicited report routing.
//!
//! Every line classified unsolicited is matched against an ordered prefix
//! table; the first match names the owning service. Lines arriving on a
//! channel other than the dedicated unsolicited channel are honored only
//! when call-session related, since those must surface within the call's
//! own channel context. Everything else there is duplicate noise from a
//! modem that mirrors reports across channels.

use std::collections::HashMap;
use std::sync::Arc;

use atmux_core::types::{ChannelRole, ServiceKind};

use crate::service::Service;

/// First lines of two-line SMS reports; the PDU follows unterminated by
/// any prefix of its own.
const SMS_TWO_LINE: &[&str] = &["+CMT:", "+CDS:", "+CBM:"];

/// Reports that belong to the session context of the channel they arrive
/// on, honored regardless of channel role.
const CALL_SESSION: &[&str] = &[
    "+CRING:",
    "RING",
    "NO CARRIER",
    "+CCWA",
    "+CSSI:",
    "+CSSU:",
    "+CUSD:",
    "+CGEV:",
    "CONNECT",
];

/// `true` if `line` opens a two-line SMS report.
pub(crate) fn is_sms_report(line: &str) -> bool {
    SMS_TWO_LINE.iter().any(|p| line.starts_with(p))
}

fn is_call_session(line: &str) -> bool {
    CALL_SESSION.iter().any(|p| line.starts_with(p))
}

/// The stock prefix table, first match wins.
pub fn default_prefix_table() -> Vec<(&'static str, ServiceKind)> {
    vec![
        ("+CSQ:", ServiceKind::Network),
        ("+CREG:", ServiceKind::Network),
        ("+CGREG:", ServiceKind::Network),
        ("+NITZ:", ServiceKind::Network),
        ("+MSRI:", ServiceKind::Network),
        ("+CRING:", ServiceKind::Call),
        ("RING", ServiceKind::Call),
        ("NO CARRIER", ServiceKind::Call),
        ("CONNECT", ServiceKind::Call),
        ("+CCWA", ServiceKind::Call),
        ("+CCCM:", ServiceKind::Call),
        ("+CLCC:", ServiceKind::Call),
        ("+CGEV:", ServiceKind::PacketData),
        ("+CMT:", ServiceKind::Messaging),
        ("+CMTI:", ServiceKind::Messaging),
        ("+CDS:", ServiceKind::Messaging),
        ("+MMSG:", ServiceKind::Messaging),
        ("+CBM:", ServiceKind::Messaging),
        ("+CPIN:", ServiceKind::Sim),
        ("+MPBK:", ServiceKind::Sim),
        ("+MSTK:", ServiceKind::Sim),
        ("+CSSI:", ServiceKind::Supplementary),
        ("+CSSU:", ServiceKind::Supplementary),
        ("+CUSD:", ServiceKind::Supplementary),
    ]
}

/// Routes unsolicited lines to their owning service.
pub(crate) struct UnsolRouter {
    table: Vec<(&'static str, ServiceKind)>,
    services: HashMap<ServiceKind, Arc<dyn Service>>,
}

impl UnsolRouter {
    pub(crate) fn new(
        table: Vec<(&'static str, ServiceKind)>,
        services: HashMap<ServiceKind, Arc<dyn Service>>,
    ) -> Self {
        UnsolRouter { table, services }
    }

    /// Route one unsolicited line (with its PDU for two-line reports).
    pub(crate) fn route(&self, role: ChannelRole, line: &str, pdu: Option<&str>) {
        if role != ChannelRole::Unsolicited && !is_call_session(line) {
            tracing::trace!(%role, line = %line, "unsolicited outside its channel, dropped");
            return;
        }
        let Some((_, kind)) = self.table.iter().find(|(p, _)| line.starts_with(p)) else {
            tracing::debug!(line = %line, "unmatched unsolicited line dropped");
            return;
        };
        match self.services.get(kind) {
            Some(service) => service.on_unsolicited(line, pdu),
            None => {
                tracing::warn!(service = %kind, line = %line, "no handler registered for service")
            }
        }
    }
}
