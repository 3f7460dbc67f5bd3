//! Pure classification of framed response lines.
//!
//! Every line a channel produces is exactly one of: a final response
//! terminating the in-flight command, an intermediate belonging to it,
//! the SMS body prompt, or an unsolicited report. [`classify`] makes that
//! decision from the line text and a snapshot of the pending command; it
//! touches no state, so the rules are pinned by plain unit tests.

use atmux_core::types::ResponseKind;

use crate::framer::{PendingView, SMS_PROMPT};

/// Final response markers indicating success.
const FINAL_SUCCESS: &[&str] = &["OK", "CONNECT"];

/// Final response markers indicating failure.
const FINAL_ERROR: &[&str] = &[
    "ERROR",
    "+CMS ERROR:",
    "+CME ERROR:",
    "NO ANSWER",
    "NO DIALTONE",
];

/// What a framed line is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Final response; the command succeeded.
    FinalSuccess,
    /// Final response; the command failed.
    FinalError,
    /// Intermediate line of the in-flight command.
    Intermediate,
    /// The SMS body prompt; the queued body must be written now.
    Prompt,
    /// Unsolicited report, to be routed by prefix.
    Unsolicited,
}

/// Classify one line.
///
/// `pending` is `None` when the channel has no in-flight command, in which
/// case every line is unsolicited. `data_channel` gates the `CONNECT`
/// marker: on any other channel `CONNECT` announces an incoming data call
/// rather than terminating a dial command.
///
/// `NO CARRIER` is classified unsolicited unconditionally, even while a
/// command is in flight. Modems drop lingering calls asynchronously and
/// the marker must reach call handling no matter what else is pending.
pub fn classify(pending: Option<&PendingView>, data_channel: bool, line: &str) -> Classification {
    if line.starts_with("NO CARRIER") {
        return Classification::Unsolicited;
    }
    let Some(p) = pending else {
        return Classification::Unsolicited;
    };

    if is_final_success(line) {
        if line.starts_with("CONNECT") && !data_channel {
            return Classification::Unsolicited;
        }
        return Classification::FinalSuccess;
    }
    if is_final_error(line) {
        return Classification::FinalError;
    }
    if p.body_queued && line == SMS_PROMPT {
        return Classification::Prompt;
    }

    match p.kind {
        ResponseKind::NoResult => Classification::Unsolicited,
        ResponseKind::Numeric => {
            if !p.has_intermediate && line.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                Classification::Intermediate
            } else {
                Classification::Unsolicited
            }
        }
        ResponseKind::SingleLine => {
            if !p.has_intermediate && line.starts_with(p.prefix.as_str()) {
                Classification::Intermediate
            } else {
                Classification::Unsolicited
            }
        }
        ResponseKind::MultiLine => {
            if line.starts_with(p.prefix.as_str()) {
                Classification::Intermediate
            } else {
                Classification::Unsolicited
            }
        }
    }
}

fn is_final_success(line: &str) -> bool {
    FINAL_SUCCESS.iter().any(|m| line.starts_with(m))
}

fn is_final_error(line: &str) -> bool {
    FINAL_ERROR.iter().any(|m| line.starts_with(m))
}
