//! MBOX archive: every message of one file, fetched back by byte offset.
//!
//! Reads line-by-line through a large buffer and never loads the whole file:
//! the scan keeps one header block at a time and only counts body bytes.
//! Tolerant of:
//!
//! - Mixed `\n` and `\r\n` line endings
//! - `From ` lines not preceded by a blank line (logs a warning)
//! - Truncated messages at EOF
//! - UTF-8 BOM at the start of the file

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::ArchiveConfig;
use crate::deadline::Deadline;
use crate::error::{InboxError, Result};
use crate::parser::raw::RawMessage;

use super::{foreign_locator, EntrySink, Locator, RawSource};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Byte range of one message inside the MBOX file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    offset: u64,
    length: u64,
}

/// Reads a single MBOX file.
pub struct MboxSource {
    path: PathBuf,
    max_message_size: u64,
}

impl MboxSource {
    pub fn new(path: impl AsRef<Path>, config: &ArchiveConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(InboxError::InvalidPath(path.display().to_string()));
        }
        Ok(Self {
            path,
            max_message_size: config.max_message_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Walk the file, calling `on_message(span, header_bytes)` for every
    /// message. Body lines are read to find the next separator but are not
    /// kept.
    fn split_headers(
        &self,
        deadline: &Deadline,
        on_message: &mut dyn FnMut(Span, &[u8]) -> Result<()>,
    ) -> Result<()> {
        let file = File::open(&self.path).map_err(|e| InboxError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut offset: u64 = 0;
        let mut start: u64 = 0;
        let mut header_buf: Vec<u8> = Vec::with_capacity(16 * 1024);
        let mut line: Vec<u8> = Vec::with_capacity(4096);
        let mut in_headers = true;
        let mut prev_blank = true;

        let mut emit = |start: u64, end: u64, headers: &[u8]| -> Result<()> {
            deadline.check()?;
            let span = Span {
                offset: start,
                length: end - start,
            };
            if span.length > self.max_message_size {
                warn!(
                    offset = span.offset,
                    length = span.length,
                    "Message exceeds maximum size, reads will be truncated"
                );
            }
            on_message(span, headers)
        };

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| InboxError::io(&self.path, e))? as u64;
            if n == 0 {
                break;
            }

            if is_mbox_separator(&line) {
                if !prev_blank && offset > 0 {
                    warn!(offset, "Found 'From ' separator without preceding blank line");
                }
                if offset > start {
                    emit(start, offset, &header_buf)?;
                }
                start = offset;
                header_buf.clear();
                in_headers = true;
            }

            if in_headers {
                // Same rule as `RawMessage::parse`: only an empty line ends headers.
                if matches!(line.as_slice(), b"\n" | b"\r\n") {
                    in_headers = false;
                } else if (header_buf.len() + line.len()) as u64 <= self.max_message_size {
                    header_buf.extend_from_slice(&line);
                }
            }

            prev_blank = is_blank_line(&line);
            offset += n;
        }

        if offset > start {
            emit(start, offset, &header_buf)?;
        }
        Ok(())
    }

    /// Read a single message at the given span.
    fn read_span(&self, span: Span) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path).map_err(|e| InboxError::io(&self.path, e))?;
        file.seek(SeekFrom::Start(span.offset))
            .map_err(|e| InboxError::io(&self.path, e))?;
        let length = span.length.min(self.max_message_size) as usize;
        let mut buffer = vec![0u8; length];
        file.read_exact(&mut buffer)
            .map_err(|e| InboxError::io(&self.path, e))?;
        Ok(buffer)
    }
}

impl RawSource for MboxSource {
    fn enumerate(&self, deadline: &Deadline, on_entry: &mut EntrySink<'_>) -> Result<()> {
        info!(path = %self.path.display(), "Scanning MBOX file");

        let mut count = 0usize;
        self.split_headers(deadline, &mut |span, header_bytes| {
            count += 1;
            on_entry(
                RawMessage::parse_headers(header_bytes),
                Locator::Span {
                    offset: span.offset,
                    length: span.length,
                },
            )
        })?;

        debug!(count, "MBOX scan finished");
        Ok(())
    }

    fn fetch(&self, locator: &Locator) -> Result<RawMessage> {
        let Locator::Span { offset, length } = *locator else {
            return Err(foreign_locator(locator));
        };
        debug!(offset, length, "Reading message from MBOX");
        Ok(RawMessage::parse(&self.read_span(Span { offset, length })?))
    }
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

#[cfg(test)]
mod tests {
    use super::*;

    const MBOX: &str = "From a@ex.com Thu Jan 01 00:00:00 2024\n\
Message-Id: <one@ex.com>\n\
Subject: first\n\
\n\
>From the start\n\
\n\
From b@ex.com Thu Jan 01 00:00:00 2024\n\
Message-Id: <two@ex.com>\n\
Subject: second\n\
\n\
second body\n";

    fn mbox_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(b"From user@example.com Thu Jan 01 00:00:00 2024\n"));
        assert!(!is_mbox_separator(b"from user@example.com\n"));
        assert!(!is_mbox_separator(b">From user@example.com\n"));
        let mut bom = vec![0xEF, 0xBB, 0xBF];
        bom.extend_from_slice(b"From x\n");
        assert!(is_mbox_separator(&bom));
    }

    #[test]
    fn test_is_blank_line() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    fn scan(source: &MboxSource) -> Vec<(RawMessage, Locator)> {
        let mut out = Vec::new();
        source
            .enumerate(&Deadline::none(), &mut |raw, loc| {
                out.push((raw, loc));
                Ok(())
            })
            .unwrap();
        out
    }

    #[test]
    fn test_enumerate_and_fetch() {
        let file = mbox_file(MBOX);
        let source = MboxSource::new(file.path(), &ArchiveConfig::default()).unwrap();
        let all = scan(&source);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0.header("subject"), Some("first"));
        assert_eq!(all[0].0.body(), "");
        assert_eq!(
            all[0].1,
            Locator::Span {
                offset: 0,
                length: 97
            }
        );

        let second = source.fetch(&all[1].1).unwrap();
        assert_eq!(second.header("subject"), Some("second"));
        assert_eq!(second.body(), "second body\n");

        let first = source.fetch(&all[0].1).unwrap();
        assert_eq!(first.body(), ">From the start\n\n");

        assert!(matches!(
            source.fetch(&Locator::Slot(0)),
            Err(InboxError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_keep_their_own_spans() {
        let file = mbox_file(
            "From a Thu Jan 01 00:00:00 2024\nMessage-Id: <d@ex.com>\n\none\n\n\
             From b Thu Jan 01 00:00:00 2024\nMessage-Id: <d@ex.com>\n\ntwo\n",
        );
        let source = MboxSource::new(file.path(), &ArchiveConfig::default()).unwrap();
        let all = scan(&source);
        assert_eq!(all.len(), 2);
        assert_eq!(source.fetch(&all[0].1).unwrap().body(), "one\n\n");
        assert_eq!(source.fetch(&all[1].1).unwrap().body(), "two\n");
    }

    #[test]
    fn test_scan_keeps_headers_only() {
        // A body line that looks like a header must not leak into the block.
        let file = mbox_file(
            "From a Thu Jan 01 00:00:00 2024\nMessage-Id: <h@ex.com>\n\nSubject: not a header\n",
        );
        let source = MboxSource::new(file.path(), &ArchiveConfig::default()).unwrap();
        let all = scan(&source);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0.header("subject"), None);
        assert_eq!(all[0].0.message_id(), "h@ex.com");
    }

    #[test]
    fn test_empty_file() {
        let file = mbox_file("");
        let source = MboxSource::new(file.path(), &ArchiveConfig::default()).unwrap();
        assert!(scan(&source).is_empty());
    }
}
