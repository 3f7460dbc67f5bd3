//! Stock completion callbacks.
//!
//! Most requests need no bespoke completion handling: success hands the
//! accumulated response to the submitter, failure becomes a generic
//! error. The shape-checking variants additionally validate the single
//! intermediate line before delivering, so malformed modem output fails
//! the request instead of reaching the caller.

use atmux_core::error::Error;
use atmux_core::tok::AtTokenizer;

use crate::channel::{CompletionAction, CompletionFn};

/// Deliver the response on success, a generic failure otherwise.
pub fn default_response() -> CompletionFn {
    Box::new(|response, meta| {
        if response.success {
            CompletionAction::Done(Ok(response.clone()))
        } else {
            tracing::debug!(
                request = %meta.request,
                cookie = %meta.cookie,
                final_response = %response.final_response,
                "command failed"
            );
            CompletionAction::Done(Err(Error::GenericFailure))
        }
    })
}

/// Like [`default_response`], but requires exactly one intermediate line
/// whose first value parses as an integer.
pub fn return_one_int() -> CompletionFn {
    Box::new(|response, meta| {
        if !response.success {
            return CompletionAction::Done(Err(Error::GenericFailure));
        }
        let parsed = single_line(&response.intermediates).and_then(|line| {
            let mut tok = match AtTokenizer::new(line) {
                Ok(tok) => tok,
                Err(_) => AtTokenizer::bare(line),
            };
            tok.next_int().ok()
        });
        match parsed {
            Some(_) => CompletionAction::Done(Ok(response.clone())),
            None => {
                tracing::warn!(request = %meta.request, "expected one integer line");
                CompletionAction::Done(Err(Error::GenericFailure))
            }
        }
    })
}

/// Like [`default_response`], but requires exactly one intermediate line.
pub fn return_one_string() -> CompletionFn {
    Box::new(|response, meta| {
        if !response.success {
            return CompletionAction::Done(Err(Error::GenericFailure));
        }
        match single_line(&response.intermediates) {
            Some(_) => CompletionAction::Done(Ok(response.clone())),
            None => {
                tracing::warn!(request = %meta.request, "expected one response line");
                CompletionAction::Done(Err(Error::GenericFailure))
            }
        }
    })
}

fn single_line(intermediates: &[String]) -> Option<&String> {
    match intermediates {
        [line] => Some(line),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmux_core::types::{AtResponse, ChannelId, Cookie, Payload, RequestId};

    use crate::channel::SessionMeta;

    fn meta() -> SessionMeta {
        SessionMeta {
            cookie: Cookie::new(1),
            request: RequestId::new(1),
            channel: ChannelId::from_index(0),
            payload: Payload::Null,
        }
    }

    fn response(success: bool, intermediates: &[&str]) -> AtResponse {
        AtResponse {
            success,
            final_response: if success { "OK".into() } else { "ERROR".into() },
            intermediates: intermediates.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn default_response_passes_success_through() {
        let mut cb = default_response();
        let r = response(true, &["+CSQ: 15,99"]);
        match cb(&r, &meta()) {
            CompletionAction::Done(Ok(out)) => assert_eq!(out, r),
            _ => panic!("expected delivered response"),
        }
    }

    #[test]
    fn default_response_maps_failure() {
        let mut cb = default_response();
        match cb(&response(false, &[]), &meta()) {
            CompletionAction::Done(Err(Error::GenericFailure)) => {}
            _ => panic!("expected generic failure"),
        }
    }

    #[test]
    fn return_one_int_accepts_prefixed_line() {
        let mut cb = return_one_int();
        match cb(&response(true, &["+CSQ: 15,99"]), &meta()) {
            CompletionAction::Done(Ok(_)) => {}
            _ => panic!("expected success"),
        }
    }

    #[test]
    fn return_one_int_accepts_bare_numeric_line() {
        let mut cb = return_one_int();
        match cb(&response(true, &["3"]), &meta()) {
            CompletionAction::Done(Ok(_)) => {}
            _ => panic!("expected success"),
        }
    }

    #[test]
    fn return_one_int_rejects_wrong_shape() {
        let mut cb = return_one_int();
        for r in [
            response(true, &[]),
            response(true, &["+CSQ: 15,99", "+CSQ: 16,99"]),
            response(true, &["+CPIN: READY"]),
        ] {
            match cb(&r, &meta()) {
                CompletionAction::Done(Err(Error::GenericFailure)) => {}
                _ => panic!("expected generic failure for {r:?}"),
            }
        }
    }

    #[test]
    fn return_one_string_requires_exactly_one_line() {
        let mut cb = return_one_string();
        match cb(&response(true, &["+CGMR: SW1.0"]), &meta()) {
            CompletionAction::Done(Ok(_)) => {}
            _ => panic!("expected success"),
        }
        match cb(&response(true, &[]), &meta()) {
            CompletionAction::Done(Err(Error::GenericFailure)) => {}
            _ => panic!("expected generic failure"),
        }
    }
}
