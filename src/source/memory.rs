//! In-memory source, for tests and embedding.

use crate::deadline::Deadline;
use crate::error::Result;
use crate::parser::raw::RawMessage;

use super::{foreign_locator, EntrySink, Locator, RawSource};

/// A fixed list of complete messages (headers, blank line, body) held as bytes.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    messages: Vec<Vec<u8>>,
}

impl MemorySource {
    pub fn from_bytes<B: AsRef<[u8]>>(items: impl IntoIterator<Item = B>) -> Self {
        Self {
            messages: items.into_iter().map(|b| b.as_ref().to_vec()).collect(),
        }
    }

    pub fn push(&mut self, message: impl Into<Vec<u8>>) {
        self.messages.push(message.into());
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl RawSource for MemorySource {
    fn enumerate(&self, deadline: &Deadline, on_entry: &mut EntrySink<'_>) -> Result<()> {
        deadline.check()?;
        for (slot, bytes) in self.messages.iter().enumerate() {
            deadline.check()?;
            on_entry(RawMessage::parse_headers(bytes), Locator::Slot(slot))?;
        }
        Ok(())
    }

    fn fetch(&self, locator: &Locator) -> Result<RawMessage> {
        match locator {
            Locator::Slot(slot) => self
                .messages
                .get(*slot)
                .map(|bytes| RawMessage::parse(bytes))
                .ok_or_else(|| foreign_locator(locator)),
            _ => Err(foreign_locator(locator)),
        }
    }
}
