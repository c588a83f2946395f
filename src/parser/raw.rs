//! Raw message splitting: header fields and body text from message bytes.
//!
//! This layer does no validation. It only turns bytes into unfolded
//! `(name, value)` pairs plus a body string for the extractors above it.

use mail_parser::MessageParser;
use tracing::debug;

use crate::parser::header::normalize_id;

/// One raw message as handed out by a [`crate::source::RawSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// `(lowercase_name, unfolded_value)` in header order.
    headers: Vec<(String, String)>,
    /// Body text after transfer decoding.
    body: String,
}

impl RawMessage {
    /// Split message bytes into headers and body.
    ///
    /// A leading MBOX `From ` line is skipped. Messages without a blank line
    /// are treated as all headers and an empty body.
    pub fn parse(data: &[u8]) -> Self {
        let data = skip_from_line(data);
        let (header_bytes, body_bytes) = split_header_block(data);

        let headers = unfold_headers(&decode_header_bytes(header_bytes));
        let body = decode_body(&headers, data, body_bytes);

        Self { headers, body }
    }

    /// Decode only the header block. The body is left empty and never
    /// goes through MIME decoding; bytes after the blank line are ignored.
    pub fn parse_headers(data: &[u8]) -> Self {
        let (header_bytes, _) = split_header_block(skip_from_line(data));
        Self {
            headers: unfold_headers(&decode_header_bytes(header_bytes)),
            body: String::new(),
        }
    }

    /// Build a message from already-split parts.
    pub fn from_parts<N, V>(headers: impl IntoIterator<Item = (N, V)>, body: impl Into<String>) -> Self
    where
        N: AsRef<str>,
        V: Into<String>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|(n, v)| (n.as_ref().to_lowercase(), v.into()))
                .collect(),
            body: body.into(),
        }
    }

    /// First value of a header (case-insensitive), if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Normalized `Message-ID`, empty if missing or malformed.
    pub fn message_id(&self) -> String {
        normalize_id(self.header("message-id").unwrap_or_default())
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Skip the `From ` separator line at the start of MBOX messages.
pub(crate) fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Split at the blank line; without one everything is header.
fn split_header_block(data: &[u8]) -> (&[u8], &[u8]) {
    match find_header_end(data) {
        Some((end, body_start)) => (&data[..end], &data[body_start..]),
        None => (data, &data[data.len()..]),
    }
}

/// Locate the blank line ending the headers.
///
/// Returns `(header_end, body_start)`.
fn find_header_end(data: &[u8]) -> Option<(usize, usize)> {
    if data.starts_with(b"\n") {
        return Some((0, 1));
    }
    if data.starts_with(b"\r\n") {
        return Some((0, 2));
    }
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some((i, i + 2));
        }
        if data[i..].starts_with(b"\r\n\r\n") {
            return Some((i, i + 4));
        }
    }
    None
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
    }

    result
}

/// Produce the body text, running MIME decoding only when the message needs it.
fn decode_body(headers: &[(String, String)], whole: &[u8], body: &[u8]) -> String {
    if needs_mime_decoding(headers) {
        if let Some(text) = MessageParser::default()
            .parse(whole)
            .and_then(|msg| msg.body_text(0).map(|t| t.into_owned()))
        {
            return text;
        }
        debug!("MIME decoding failed, using raw body");
    }
    String::from_utf8_lossy(body).into_owned()
}

fn needs_mime_decoding(headers: &[(String, String)]) -> bool {
    let value = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_lowercase())
    };

    let encoded = value("content-transfer-encoding")
        .map(|enc| matches!(enc.trim(), "base64" | "quoted-printable"))
        .unwrap_or(false);

    let content_type = value("content-type").unwrap_or_default();
    let multipart = content_type.starts_with("multipart/");
    let foreign_charset = content_type
        .split(';')
        .filter_map(|p| p.trim().strip_prefix("charset="))
        .map(|c| c.trim_matches('"'))
        .any(|c| !matches!(c, "utf-8" | "utf8" | "us-ascii"));

    encoded || multipart || foreign_charset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        let plain = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(plain), plain);
    }

    #[test]
    fn test_find_header_end() {
        let data = b"From: a@b.com\nSubject: Hi\n\nBody\n";
        assert_eq!(find_header_end(data), Some((25, 27)));
        let crlf = b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n";
        assert_eq!(find_header_end(crlf), Some((26, 30)));
    }

    #[test]
    fn test_unfold_headers() {
        let text = "Subject: This is a long\n\tsubject line\nFrom: user@example.com\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "subject");
        assert_eq!(headers[0].1, "This is a long subject line");
    }

    #[test]
    fn test_parse_plain_message() {
        let raw = RawMessage::parse(
            b"Message-Id: <a@ex.com>\nSubject: Hi\nCC: Bob <b@ex.com>\n\nline one\n> quoted\n",
        );
        assert_eq!(raw.message_id(), "a@ex.com");
        assert_eq!(raw.header("Subject"), Some("Hi"));
        assert_eq!(raw.header("cc"), Some("Bob <b@ex.com>"));
        assert_eq!(raw.body(), "line one\n> quoted\n");
    }

    #[test]
    fn test_parse_without_body() {
        let raw = RawMessage::parse(b"Subject: Only headers\n");
        assert_eq!(raw.header("subject"), Some("Only headers"));
        assert_eq!(raw.body(), "");
        assert_eq!(raw.message_id(), "");
    }

    #[test]
    fn test_parse_quoted_printable_body() {
        let raw = RawMessage::parse(
            b"Subject: QP\nContent-Type: text/plain; charset=utf-8\n\
              Content-Transfer-Encoding: quoted-printable\n\ncaf=C3=A9\n",
        );
        assert!(raw.body().starts_with("caf\u{e9}"), "got {:?}", raw.body());
    }

    #[test]
    fn test_parse_headers_skips_body() {
        let data = b"From x@ex.com Thu Jan 01 00:00:00 2024\nMessage-Id: <h@ex.com>\n\
                     Content-Transfer-Encoding: base64\n\naGVsbG8K\n";
        let raw = RawMessage::parse_headers(data);
        assert_eq!(raw.message_id(), "h@ex.com");
        assert_eq!(raw.header("content-transfer-encoding"), Some("base64"));
        assert_eq!(raw.body(), "");
        assert_eq!(raw.headers, RawMessage::parse(data).headers);
    }

    #[test]
    fn test_latin1_header_bytes() {
        let raw = RawMessage::parse(b"Subject: caf\xe9\n\nbody\n");
        assert_eq!(raw.header("subject"), Some("caf\u{e9}"));
    }
}
