//! Record framing for byte-stream adapters
//!
//! Serial devices emit newline-terminated records; socket feeds wrap each
//! record in `<` `>`. Partial records are buffered across reads.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::FramingError;

/// Default upper bound on a single record
pub const DEFAULT_MAX_RECORD_LEN: usize = 64 * 1024;

/// Record boundary convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// `\n` or `\r\n` terminated; blank lines are skipped
    Lines,
    /// `<record>`; bytes outside delimiters are discarded
    AngleBrackets,
}

/// Incremental splitter yielding one result per record
#[derive(Debug)]
pub struct RecordFramer {
    mode: FramingMode,
    buf: BytesMut,
    max_len: usize,
    /// AngleBrackets: inside `<...`; Lines: discarding an oversize line
    in_record: bool,
}

impl RecordFramer {
    pub fn new(mode: FramingMode) -> Self {
        Self::with_max_len(mode, DEFAULT_MAX_RECORD_LEN)
    }

    pub fn with_max_len(mode: FramingMode, max_len: usize) -> Self {
        Self {
            mode,
            buf: BytesMut::with_capacity(1024),
            max_len: max_len.max(1),
            in_record: false,
        }
    }

    /// Feed one read; returns every record completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Bytes, FramingError>> {
        self.buf.extend_from_slice(chunk);
        match self.mode {
            FramingMode::Lines => self.split_lines(),
            FramingMode::AngleBrackets => self.split_brackets(),
        }
    }

    /// Flush a trailing unterminated line at end of stream
    pub fn finish(&mut self) -> Option<Result<Bytes, FramingError>> {
        let rest = self.buf.split().freeze();
        let discarding = std::mem::replace(&mut self.in_record, false);
        match self.mode {
            FramingMode::Lines if !discarding => finish_record(rest, true, self.max_len),
            FramingMode::AngleBrackets if discarding && !rest.is_empty() => {
                Some(Err(FramingError::Truncated))
            }
            _ => None,
        }
    }

    fn split_lines(&mut self) -> Vec<Result<Bytes, FramingError>> {
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(pos + 1).freeze();
            if std::mem::replace(&mut self.in_record, false) {
                // tail of an oversize line already reported
                continue;
            }
            if let Some(record) = finish_record(line, true, self.max_len) {
                out.push(record);
            }
        }

        if self.buf.len() > self.max_len {
            if !self.in_record {
                out.push(Err(FramingError::Oversize {
                    len: self.buf.len(),
                    max: self.max_len,
                }));
            }
            self.buf.clear();
            self.in_record = true;
        }
        out
    }

    fn split_brackets(&mut self) -> Vec<Result<Bytes, FramingError>> {
        let mut out = Vec::new();
        loop {
            if !self.in_record {
                match self.buf.iter().position(|b| *b == b'<') {
                    Some(start) => {
                        self.buf.advance(start + 1);
                        self.in_record = true;
                    }
                    None => {
                        self.buf.clear();
                        break;
                    }
                }
            }

            match self.buf.iter().position(|b| *b == b'>') {
                Some(end) => {
                    let mut record = self.buf.split_to(end).freeze();
                    self.buf.advance(1);
                    self.in_record = false;

                    if let Some(restart) = record.iter().rposition(|b| *b == b'<') {
                        out.push(Err(FramingError::Truncated));
                        record = record.slice(restart + 1..);
                    }
                    if let Some(result) = finish_record(record, false, self.max_len) {
                        out.push(result);
                    }
                }
                None => {
                    if self.buf.len() > self.max_len {
                        out.push(Err(FramingError::Oversize {
                            len: self.buf.len(),
                            max: self.max_len,
                        }));
                        self.buf.clear();
                        self.in_record = false;
                    }
                    break;
                }
            }
        }
        out
    }
}

/// Trim and validate one record. `skip_blank` drops whitespace-only input silently.
fn finish_record(
    raw: Bytes,
    skip_blank: bool,
    max_len: usize,
) -> Option<Result<Bytes, FramingError>> {
    let start = raw.iter().position(|b| !b.is_ascii_whitespace());
    let Some(start) = start else {
        return (!skip_blank).then_some(Err(FramingError::Empty));
    };
    let end = raw
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(raw.len(), |i| i + 1);
    let record = raw.slice(start..end);

    if record.len() > max_len {
        return Some(Err(FramingError::Oversize {
            len: record.len(),
            max: max_len,
        }));
    }
    if std::str::from_utf8(&record).is_err() {
        return Some(Err(FramingError::InvalidUtf8));
    }
    Some(Ok(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(s: &str) -> Result<Bytes, FramingError> {
        Ok(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[test]
    fn test_lines_across_chunks() {
        let mut framer = RecordFramer::new(FramingMode::Lines);
        assert_eq!(framer.push(b"{\"a\":1}\r\n{\"b\""), vec![ok("{\"a\":1}")]);
        assert_eq!(framer.push(b":2}\n\n"), vec![ok("{\"b\":2}")]);
        assert!(framer.finish().is_none());
    }

    #[test]
    fn test_lines_finish_flushes_tail() {
        let mut framer = RecordFramer::new(FramingMode::Lines);
        assert!(framer.push(b"tail").is_empty());
        assert_eq!(framer.finish(), Some(ok("tail")));
    }

    #[test]
    fn test_lines_invalid_utf8() {
        let mut framer = RecordFramer::new(FramingMode::Lines);
        let out = framer.push(b"\xff\xfe\nok\n");
        assert_eq!(out, vec![Err(FramingError::InvalidUtf8), ok("ok")]);
    }

    #[test]
    fn test_lines_oversize_discarded_until_newline() {
        let mut framer = RecordFramer::with_max_len(FramingMode::Lines, 4);
        let out = framer.push(b"abcdefgh");
        assert_eq!(out, vec![Err(FramingError::Oversize { len: 8, max: 4 })]);
        assert!(framer.push(b"ijkl").is_empty());
        assert_eq!(framer.push(b"mn\nok\n"), vec![ok("ok")]);
    }

    #[test]
    fn test_lines_oversize_in_single_read() {
        let mut framer = RecordFramer::with_max_len(FramingMode::Lines, 4);
        let out = framer.push(b"abcdefgh\nabcd\n");
        assert_eq!(
            out,
            vec![Err(FramingError::Oversize { len: 8, max: 4 }), ok("abcd")]
        );
        assert!(framer.finish().is_none());
    }

    #[test]
    fn test_brackets_oversize_in_single_read() {
        let mut framer = RecordFramer::with_max_len(FramingMode::AngleBrackets, 4);
        let out = framer.push(b"<abcdefgh><abcd>");
        assert_eq!(
            out,
            vec![Err(FramingError::Oversize { len: 8, max: 4 }), ok("abcd")]
        );
    }

    #[test]
    fn test_brackets_basic() {
        let mut framer = RecordFramer::new(FramingMode::AngleBrackets);
        let out = framer.push(b"noise<{\"a\":1}>junk< {\"b\":2} >");
        assert_eq!(out, vec![ok("{\"a\":1}"), ok("{\"b\":2}")]);
    }

    #[test]
    fn test_brackets_split_across_reads() {
        let mut framer = RecordFramer::new(FramingMode::AngleBrackets);
        assert!(framer.push(b"<{\"val").is_empty());
        assert_eq!(framer.push(b"ue\":3}>"), vec![ok("{\"value\":3}")]);
    }

    #[test]
    fn test_brackets_empty_and_truncated() {
        let mut framer = RecordFramer::new(FramingMode::AngleBrackets);
        let out = framer.push(b"<><partial<full>");
        assert_eq!(
            out,
            vec![
                Err(FramingError::Empty),
                Err(FramingError::Truncated),
                ok("full")
            ]
        );
    }

    #[test]
    fn test_brackets_oversize() {
        let mut framer = RecordFramer::with_max_len(FramingMode::AngleBrackets, 3);
        let out = framer.push(b"<abcdef");
        assert_eq!(out, vec![Err(FramingError::Oversize { len: 6, max: 3 })]);
        assert_eq!(framer.push(b"<ok>"), vec![ok("ok")]);
    }
}
