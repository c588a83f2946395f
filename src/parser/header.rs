//! Header extraction: Message-ID normalization, addresses, encoded-words and dates.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mail_parser::MessageParser;
use tracing::warn;

use crate::error::{InboxError, Result};
use crate::model::address::EmailAddress;
use crate::model::message::MessageHeader;
use crate::parser::raw::RawMessage;

/// Build a [`MessageHeader`] from the header fields of a raw message.
///
/// `Date` and `From` are mandatory; a bad `To` is fatal, a bad `Cc` is
/// logged and dropped.
pub fn extract_header(raw: &RawMessage) -> Result<MessageHeader> {
    let id = raw.message_id();

    let date_str = raw.header("date").unwrap_or_default();
    let date = parse_date(date_str)
        .ok_or_else(|| InboxError::parse(&id, format!("invalid Date '{date_str}'")))?;

    let from_raw = raw.header("from").unwrap_or_default();
    let author = EmailAddress::parse(from_raw)
        .map(decode_name)
        .map_err(|e| InboxError::parse(&id, format!("invalid From: {e}")))?;

    let to = match raw.header("to").filter(|v| !v.is_empty()) {
        Some(to_raw) => EmailAddress::parse_list(to_raw)
            .map(|list| join_names(&list))
            .map_err(|e| InboxError::parse(&id, format!("invalid To: {e}")))?,
        None => String::new(),
    };

    let cc = match raw.header("cc").filter(|v| !v.is_empty()) {
        Some(cc_raw) => match EmailAddress::parse_list(cc_raw) {
            Ok(list) => join_names(&list),
            Err(e) => {
                warn!(id = %id, cc = cc_raw, error = %e, "Ignoring malformed Cc");
                String::new()
            }
        },
        None => String::new(),
    };

    let reply_to = raw
        .header("in-reply-to")
        .map(normalize_id)
        .filter(|r| !r.is_empty());

    let title = decode_encoded_words(raw.header("subject").unwrap_or_default());

    Ok(MessageHeader {
        id,
        reply_to,
        title,
        author,
        date,
        to,
        cc,
    })
}

/// Strip the angle brackets around a Message-ID.
///
/// Only `<...>` values longer than three bytes are accepted; anything else
/// yields an empty string.
pub fn normalize_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() > 3 && raw.starts_with('<') && raw.ends_with('>') {
        raw[1..raw.len() - 1].to_string()
    } else {
        String::new()
    }
}

/// Display names joined with `", "`, using the bare address for unnamed entries.
fn join_names(list: &[EmailAddress]) -> String {
    list.iter()
        .map(|a| decode_encoded_words(a.label()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode_name(mut addr: EmailAddress) -> EmailAddress {
    addr.display_name = decode_encoded_words(&addr.display_name);
    addr
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Values without encoded-words are returned unchanged. If decoding fails,
/// the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    if !input.contains("=?") {
        return input.to_string();
    }

    // Wrap the value in a minimal message so mail-parser can decode it
    let fake_msg = format!("Subject: {input}\n\n");
    MessageParser::default()
        .parse(fake_msg.as_bytes())
        .and_then(|msg| msg.subject().map(str::to_string))
        .unwrap_or_else(|| input.to_string())
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and many broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);
    let no_comment = strip_trailing_comment(&no_dow);

    const FORMATS: [&str; 6] = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];

    for candidate in [no_comment.clone(), replace_named_tz(&no_comment)] {
        for fmt in &FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
                return Some(Utc.from_utc_datetime(&ndt));
            }
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Last resort: let `mail-parser` interpret the date.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            if rest.starts_with(',') || rest.starts_with(' ') {
                return rest.trim_start_matches(',').trim().to_string();
            }
        }
    }
    s.to_string()
}

/// Drop a trailing `(PDT)`-style comment that follows a numeric offset.
fn strip_trailing_comment(s: &str) -> String {
    match s.rfind('(') {
        Some(pos) if s.ends_with(')') => s[..pos].trim_end().to_string(),
        _ => s.to_string(),
    }
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    const TZS: [(&str, &str); 13] = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    for (name, offset) in TZS {
        if let Some(head) = s.strip_suffix(name).filter(|h| h.ends_with(' ')) {
            return format!("{head}{offset}");
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &[(&str, &str)]) -> RawMessage {
        RawMessage::from_parts(headers.iter().copied(), "")
    }

    fn base_headers() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Message-Id", "<msg001@example.com>"),
            ("Subject", "[PATCH] fix things"),
            ("From", "Jane Doe <jane@example.com>"),
            ("Date", "Thu, 04 Jan 2024 10:00:00 +0000"),
        ]
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("<msg001@example.com>"), "msg001@example.com");
        assert_eq!(normalize_id("  <msg@ex.com>  "), "msg@ex.com");
        assert_eq!(normalize_id("msg001@example.com"), "");
        assert_eq!(normalize_id("<a>"), "");
        assert_eq!(normalize_id("<ab>"), "ab");
        assert_eq!(normalize_id(""), "");
    }

    #[test]
    fn test_extract_minimal_header() {
        let h = extract_header(&raw(&base_headers())).unwrap();
        assert_eq!(h.id, "msg001@example.com");
        assert_eq!(h.title, "[PATCH] fix things");
        assert_eq!(h.author.display_name, "Jane Doe");
        assert_eq!(h.author.address, "jane@example.com");
        assert_eq!(h.date.format("%Y-%m-%d %H:%M").to_string(), "2024-01-04 10:00");
        assert_eq!(h.reply_to, None);
        assert_eq!(h.to, "");
        assert_eq!(h.cc, "");
    }

    #[test]
    fn test_extract_recipients_and_reply() {
        let mut headers = base_headers();
        headers.push(("To", "Alice <alice@ex.com>, bob@ex.com"));
        headers.push(("Cc", "\"Lists, Kernel\" <list@ex.com>"));
        headers.push(("In-Reply-To", "<parent@ex.com>"));
        let h = extract_header(&raw(&headers)).unwrap();
        assert_eq!(h.to, "Alice, bob@ex.com");
        assert_eq!(h.cc, "Lists, Kernel");
        assert_eq!(h.reply_to.as_deref(), Some("parent@ex.com"));
    }

    #[test]
    fn test_group_and_quoted_pair_addresses() {
        let mut headers = base_headers();
        headers[2] = ("From", r#""O\"Brien" <ob@ex.com>"#);
        headers.push(("To", "undisclosed-recipients:;"));
        headers.push(("Cc", "maint: \"Doe, J\" <j@ex.com>, k@ex.com;"));
        let h = extract_header(&raw(&headers)).unwrap();
        assert_eq!(h.author.display_name, "O\"Brien");
        assert_eq!(h.author.address, "ob@ex.com");
        assert_eq!(h.to, "");
        assert_eq!(h.cc, "Doe, J, k@ex.com");
    }

    #[test]
    fn test_malformed_reply_to_is_root() {
        let mut headers = base_headers();
        headers.push(("In-Reply-To", "parent@ex.com"));
        let h = extract_header(&raw(&headers)).unwrap();
        assert_eq!(h.reply_to, None);
    }

    #[test]
    fn test_bad_cc_is_not_fatal() {
        let mut headers = base_headers();
        headers.push(("Cc", "Broken <cc@ex.com, ,"));
        let h = extract_header(&raw(&headers)).unwrap();
        assert_eq!(h.cc, "");
    }

    #[test]
    fn test_bad_to_is_fatal() {
        let mut headers = base_headers();
        headers.push(("To", "not an address"));
        let err = extract_header(&raw(&headers)).unwrap_err();
        assert!(matches!(err, InboxError::Parse { ref id, .. } if id == "msg001@example.com"));
    }

    #[test]
    fn test_bad_from_and_date_are_fatal() {
        let mut headers = base_headers();
        headers[2] = ("From", "");
        assert!(extract_header(&raw(&headers)).is_err());

        let mut headers = base_headers();
        headers[3] = ("Date", "yesterday-ish");
        assert!(extract_header(&raw(&headers)).is_err());

        let headers: Vec<_> = base_headers().into_iter().filter(|(k, _)| *k != "Date").collect();
        assert!(extract_header(&raw(&headers)).is_err());
    }

    #[test]
    fn test_decode_encoded_subject_and_name() {
        let mut headers = base_headers();
        headers[1] = ("Subject", "=?UTF-8?B?SG9sYSBtdW5kbw==?=");
        headers[2] = ("From", "=?ISO-8859-1?Q?Jos=E9?= <jose@ex.com>");
        let h = extract_header(&raw(&headers)).unwrap();
        assert_eq!(h.title, "Hola mundo");
        assert_eq!(h.author.display_name, "Jos\u{e9}");
    }

    #[test]
    fn test_decode_plain_passthrough() {
        assert_eq!(decode_encoded_words("Re: plain subject"), "Re: plain subject");
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
    }

    #[test]
    fn test_parse_date_variants() {
        assert!(parse_date("04 Jan 2024 10:00:00 +0000").is_some());
        assert!(parse_date("Thu, 04 Jan 2024 10:00:00 EST").is_some());
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
        assert!(parse_date("Thu, 4 Jan 2024 10:00:00 -0700 (PDT)").is_some());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_parse_date_named_tz_offset() {
        let dt = parse_date("04 Jan 2024 10:00:00 EST").unwrap();
        assert_eq!(dt.format("%H").to_string(), "15");
    }
}
