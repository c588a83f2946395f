//! Email address parsing (RFC 5322 §3.4).
//!
//! Parsing is strict: an address that cannot be understood is an error, so
//! the caller can decide whether that is fatal (From, To) or not (Cc).
//! Quoted strings may contain `\` quoted-pairs, and lists may contain
//! `name: member, member;` groups.

use thiserror::Error;

/// A parsed email address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
/// - `"user@example.com (Some User)"` → `display_name = "Some User"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

/// Why an address failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("empty address")]
    Empty,
    #[error("unbalanced quotes in '{0}'")]
    UnbalancedQuotes(String),
    #[error("unbalanced angle brackets in '{0}'")]
    UnbalancedAngle(String),
    #[error("unexpected text after address in '{0}'")]
    TrailingText(String),
    #[error("invalid addr-spec '{0}'")]
    InvalidAddrSpec(String),
    #[error("empty member in address list '{0}'")]
    EmptyListMember(String),
    #[error("group without closing ';' in '{0}'")]
    UnterminatedGroup(String),
}

impl EmailAddress {
    /// Parse a single email address from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    /// - `"\"O\\\"Brien\" <user@domain.com>"` (quoted-pair in the name)
    /// - `"user@domain.com (Display Name)"`
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        if !quotes_balanced(trimmed) {
            return Err(AddressError::UnbalancedQuotes(trimmed.to_string()));
        }

        if let Some(angle_start) = find_unquoted(trimmed, '<') {
            let rest = &trimmed[angle_start + 1..];
            let angle_end = rest
                .find('>')
                .ok_or_else(|| AddressError::UnbalancedAngle(trimmed.to_string()))?;
            if !rest[angle_end + 1..].trim().is_empty() {
                return Err(AddressError::TrailingText(trimmed.to_string()));
            }
            let address = validate_addr_spec(rest[..angle_end].trim())?;
            let display_name = strip_quotes(&trimmed[..angle_start]);
            return Ok(Self {
                display_name,
                address,
            });
        }

        if find_unquoted(trimmed, '>').is_some() {
            return Err(AddressError::UnbalancedAngle(trimmed.to_string()));
        }

        // Bare address, optionally followed by a "(comment)" used as the name
        let (spec, display_name) = match trimmed.find('(') {
            Some(open) if trimmed.ends_with(')') => (
                trimmed[..open].trim(),
                trimmed[open + 1..trimmed.len() - 1].trim().to_string(),
            ),
            Some(_) => return Err(AddressError::TrailingText(trimmed.to_string())),
            None => (trimmed, String::new()),
        };

        Ok(Self {
            display_name,
            address: validate_addr_spec(spec)?,
        })
    }

    /// Parse a comma-separated list of addresses.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`.
    /// A group (`team: a@b.com, c@d.com;`) contributes its members and drops
    /// its name; an empty group such as `undisclosed-recipients:;` adds
    /// nothing. Any member that fails to parse fails the whole list.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, AddressError> {
        if raw.trim().is_empty() {
            return Err(AddressError::Empty);
        }

        let mut results = Vec::new();
        let mut current = String::new();
        let mut quotes = QuoteScanner::default();
        let mut in_angle = false;
        let mut in_group = false;
        // Members may be empty inside a group and right after its ';'.
        let mut allow_empty = false;

        for ch in raw.chars() {
            if quotes.quoted(ch) {
                current.push(ch);
                continue;
            }
            match ch {
                '<' => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' => {
                    in_angle = false;
                    current.push(ch);
                }
                ':' if !in_angle && !in_group => {
                    current.clear();
                    in_group = true;
                    allow_empty = true;
                }
                ';' if !in_angle && in_group => {
                    push_member(&mut results, &current, raw, true)?;
                    current.clear();
                    in_group = false;
                }
                ',' if !in_angle => {
                    push_member(&mut results, &current, raw, allow_empty)?;
                    current.clear();
                    allow_empty = in_group;
                }
                _ => current.push(ch),
            }
        }

        if quotes.is_open() {
            return Err(AddressError::UnbalancedQuotes(raw.trim().to_string()));
        }
        if in_group {
            return Err(AddressError::UnterminatedGroup(raw.trim().to_string()));
        }
        push_member(&mut results, &current, raw, allow_empty)?;
        Ok(results)
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }

    /// The display name, or the bare address when there is no name.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.address
        } else {
            &self.display_name
        }
    }
}

fn push_member(
    results: &mut Vec<EmailAddress>,
    member: &str,
    whole: &str,
    allow_empty: bool,
) -> Result<(), AddressError> {
    if member.trim().is_empty() {
        if allow_empty {
            return Ok(());
        }
        return Err(AddressError::EmptyListMember(whole.trim().to_string()));
    }
    results.push(EmailAddress::parse(member)?);
    Ok(())
}

/// Follows double-quoted strings through a header value, one char at a time.
///
/// Inside quotes a `\` escapes the next character.
#[derive(Debug, Default)]
struct QuoteScanner {
    inside: bool,
    escaped: bool,
}

impl QuoteScanner {
    /// Feed the next character. Returns true when it belongs to a quoted
    /// string, the quote marks included.
    fn quoted(&mut self, ch: char) -> bool {
        if self.escaped {
            self.escaped = false;
            return true;
        }
        match ch {
            '\\' if self.inside => {
                self.escaped = true;
                true
            }
            '"' => {
                self.inside = !self.inside;
                true
            }
            _ => self.inside,
        }
    }

    fn is_open(&self) -> bool {
        self.inside || self.escaped
    }
}

fn quotes_balanced(s: &str) -> bool {
    let mut quotes = QuoteScanner::default();
    for ch in s.chars() {
        quotes.quoted(ch);
    }
    !quotes.is_open()
}

/// Find the first occurrence of `needle` outside double quotes.
fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut quotes = QuoteScanner::default();
    s.char_indices()
        .find(|&(_, ch)| !quotes.quoted(ch) && ch == needle)
        .map(|(i, _)| i)
}

/// Check `local@domain` shape and return it owned.
fn validate_addr_spec(spec: &str) -> Result<String, AddressError> {
    let invalid = || AddressError::InvalidAddrSpec(spec.to_string());

    if spec.chars().any(|c| c.is_whitespace() || matches!(c, '<' | '>' | ',')) {
        return Err(invalid());
    }
    let (local, domain) = spec.rsplit_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    Ok(spec.to_string())
}

/// Strip surrounding double-quotes, resolve quoted-pairs and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
    {
        Some(inner) => unescape(inner).trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// `\x` becomes `x`.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.extend(chars.next()),
            _ => out.push(ch),
        }
    }
    out
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
