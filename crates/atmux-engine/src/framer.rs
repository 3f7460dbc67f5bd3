//! Byte-to-line framing for one AT channel.
//!
//! Modem output is a stream of lines separated by CR/LF runs, with one
//! exception: the two-byte `"> "` SMS prompt arrives with no terminator.
//! [`LineFramer`] accumulates raw reads and yields complete lines, carrying
//! partial lines across reads and discarding the buffer if it fills without
//! a terminator.

use atmux_core::types::{ChannelId, ResponseKind};

/// Upper bound on buffered bytes awaiting a line terminator.
pub const MAX_LINE_BUFFER: usize = 4096;

/// The SMS body prompt, as framed. Never line-terminated on the wire.
pub const SMS_PROMPT: &str = "> ";

/// Accumulates raw modem bytes and yields complete lines.
#[derive(Debug)]
pub struct LineFramer {
    channel: ChannelId,
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new(channel: ChannelId) -> Self {
        LineFramer {
            channel,
            buf: Vec::new(),
        }
    }

    /// Append one raw read.
    ///
    /// If the buffer reaches [`MAX_LINE_BUFFER`] without containing a
    /// terminator, its contents are unframeable garbage and are dropped
    /// so the channel can recover.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() >= MAX_LINE_BUFFER && !self.has_terminator() {
            tracing::warn!(
                channel = %self.channel,
                dropped = self.buf.len(),
                "line buffer overflow, discarding"
            );
            self.buf.clear();
        }
    }

    fn has_terminator(&self) -> bool {
        self.buf.iter().any(|&b| b == b'\r' || b == b'\n')
    }

    /// Pop the next complete line, without its terminator.
    ///
    /// Leading CR/LF separator bytes are skipped first. The `"> "` prompt
    /// is yielded as a line even though no terminator follows it.
    pub fn next_line(&mut self) -> Option<String> {
        let lead = self
            .buf
            .iter()
            .take_while(|&&b| b == b'\r' || b == b'\n')
            .count();
        if lead > 0 {
            self.buf.drain(..lead);
        }

        if self.buf == SMS_PROMPT.as_bytes() {
            self.buf.clear();
            return Some(SMS_PROMPT.to_string());
        }

        let end = self.buf.iter().position(|&b| b == b'\r' || b == b'\n')?;
        let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.buf.drain(..=end);
        Some(line)
    }
}

/// The pending-command facts the classifier needs, snapshot under the
/// channel state lock.
#[derive(Debug, Clone)]
pub struct PendingView {
    /// Expected response shape of the in-flight command.
    pub kind: ResponseKind,
    /// Intermediate line prefix (empty for `NoResult`/`Numeric`).
    pub prefix: String,
    /// An intermediate line has already been captured.
    pub has_intermediate: bool,
    /// A message body is queued awaiting the SMS prompt.
    pub body_queued: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framer() -> LineFramer {
        LineFramer::new(ChannelId::from_index(0))
    }

    #[test]
    fn yields_complete_line() {
        let mut f = framer();
        f.feed(b"\r\nOK\r\n");
        assert_eq!(f.next_line().as_deref(), Some("OK"));
        assert_eq!(f.next_line(), None);
    }

    #[test]
    fn carries_partial_line_across_reads() {
        let mut f = framer();
        f.feed(b"+CS");
        assert_eq!(f.next_line(), None);
        f.feed(b"Q: 15,99\r\n");
        assert_eq!(f.next_line().as_deref(), Some("+CSQ: 15,99"));
    }

    #[test]
    fn yields_multiple_lines_from_one_read() {
        let mut f = framer();
        f.feed(b"+CLCC: 1,0,0,0,0\r\n+CLCC: 2,1,0,0,0\r\nOK\r\n");
        assert_eq!(f.next_line().as_deref(), Some("+CLCC: 1,0,0,0,0"));
        assert_eq!(f.next_line().as_deref(), Some("+CLCC: 2,1,0,0,0"));
        assert_eq!(f.next_line().as_deref(), Some("OK"));
        assert_eq!(f.next_line(), None);
    }

    #[test]
    fn prompt_has_no_terminator() {
        let mut f = framer();
        f.feed(b"\r\n> ");
        assert_eq!(f.next_line().as_deref(), Some("> "));
        assert_eq!(f.next_line(), None);
    }

    #[test]
    fn prompt_prefix_of_longer_line_is_not_a_prompt() {
        let mut f = framer();
        f.feed(b"> extra\r\n");
        assert_eq!(f.next_line().as_deref(), Some("> extra"));
    }

    #[test]
    fn skips_separator_runs() {
        let mut f = framer();
        f.feed(b"\r\n\r\n\r\nRING\r\n\r\n");
        assert_eq!(f.next_line().as_deref(), Some("RING"));
        assert_eq!(f.next_line(), None);
    }

    #[test]
    fn bare_lf_terminates() {
        let mut f = framer();
        f.feed(b"OK\n");
        assert_eq!(f.next_line().as_deref(), Some("OK"));
    }

    #[test]
    fn overflow_discards_buffer() {
        let mut f = framer();
        f.feed(&vec![b'x'; MAX_LINE_BUFFER]);
        assert_eq!(f.next_line(), None);
        // the channel recovers once terminated data arrives
        f.feed(b"OK\r\n");
        assert_eq!(f.next_line().as_deref(), Some("OK"));
    }

    #[test]
    fn overflow_with_terminator_present_is_kept() {
        let mut f = framer();
        let mut data = b"OK\r\n".to_vec();
        data.extend(vec![b'x'; MAX_LINE_BUFFER]);
        f.feed(&data);
        assert_eq!(f.next_line().as_deref(), Some("OK"));
    }
}
