//! Comma tokenizer for AT response lines.
//!
//! Response lines look like `+CREG: 1,"D509","80D413D2"`: a prefix ending
//! in a colon, then comma-separated values where strings may be quoted.
//! [`AtTokenizer`] walks one line, yielding values left to right.

use crate::error::{Error, Result};

/// Cursor over the comma-separated values of one response line.
#[derive(Debug)]
pub struct AtTokenizer<'a> {
    rest: Option<&'a str>,
}

impl<'a> AtTokenizer<'a> {
    /// Start tokenizing after the line's `:`-terminated prefix.
    pub fn new(line: &'a str) -> Result<Self> {
        match line.split_once(':') {
            Some((_, rest)) => Ok(AtTokenizer { rest: Some(rest) }),
            None => Err(Error::Protocol(format!("missing prefix in line: {line}"))),
        }
    }

    /// Tokenize a bare line with no prefix (e.g. a numeric response).
    pub fn bare(line: &'a str) -> Self {
        AtTokenizer { rest: Some(line) }
    }

    /// `true` while values remain.
    pub fn has_more(&self) -> bool {
        self.rest.is_some()
    }

    /// Next value as a string, with surrounding quotes removed.
    pub fn next_str(&mut self) -> Result<&'a str> {
        let rest = self
            .rest
            .ok_or_else(|| Error::Protocol("line exhausted".into()))?;
        let trimmed = rest.trim_start();
        if let Some(after_quote) = trimmed.strip_prefix('"') {
            let close = after_quote
                .find('"')
                .ok_or_else(|| Error::Protocol(format!("unterminated quote: {rest}")))?;
            let token = &after_quote[..close];
            let tail = &after_quote[close + 1..];
            self.rest = tail.split_once(',').map(|(_, r)| r);
            Ok(token)
        } else {
            match trimmed.split_once(',') {
                Some((token, tail)) => {
                    self.rest = Some(tail);
                    Ok(token.trim())
                }
                None => {
                    self.rest = None;
                    Ok(trimmed.trim_end())
                }
            }
        }
    }

    /// Next value parsed as a decimal integer.
    pub fn next_int(&mut self) -> Result<i64> {
        let token = self.next_str()?;
        token
            .parse()
            .map_err(|_| Error::Protocol(format!("expected integer, got {token:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_prefixed_line() {
        let mut tok = AtTokenizer::new("+CSQ: 15,99").unwrap();
        assert_eq!(tok.next_int().unwrap(), 15);
        assert_eq!(tok.next_int().unwrap(), 99);
        assert!(!tok.has_more());
    }

    #[test]
    fn strips_quotes() {
        let mut tok = AtTokenizer::new("+CREG: 1,\"D509\",\"80D413D2\"").unwrap();
        assert_eq!(tok.next_int().unwrap(), 1);
        assert_eq!(tok.next_str().unwrap(), "D509");
        assert_eq!(tok.next_str().unwrap(), "80D413D2");
        assert!(!tok.has_more());
    }

    #[test]
    fn quoted_value_may_contain_comma() {
        let mut tok = AtTokenizer::new("+COPS: 0,0,\"Vodafone, DE\"").unwrap();
        assert_eq!(tok.next_int().unwrap(), 0);
        assert_eq!(tok.next_int().unwrap(), 0);
        assert_eq!(tok.next_str().unwrap(), "Vodafone, DE");
    }

    #[test]
    fn bare_numeric_line() {
        let mut tok = AtTokenizer::bare("0");
        assert_eq!(tok.next_int().unwrap(), 0);
        assert!(!tok.has_more());
    }

    #[test]
    fn missing_prefix_is_protocol_error() {
        assert!(matches!(
            AtTokenizer::new("OK"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn exhausted_line_is_protocol_error() {
        let mut tok = AtTokenizer::new("+CSQ: 15").unwrap();
        tok.next_int().unwrap();
        assert!(matches!(tok.next_int(), Err(Error::Protocol(_))));
    }

    #[test]
    fn empty_token_between_commas() {
        let mut tok = AtTokenizer::new("+CLCC: 1,,0").unwrap();
        assert_eq!(tok.next_int().unwrap(), 1);
        assert_eq!(tok.next_str().unwrap(), "");
        assert_eq!(tok.next_int().unwrap(), 0);
    }

    #[test]
    fn negative_integer() {
        let mut tok = AtTokenizer::new("+XCIEV: -3").unwrap();
        assert_eq!(tok.next_int().unwrap(), -3);
    }
}
