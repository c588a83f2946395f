//! In-memory store: a [`ThreadIndex`] plus the source it was built from.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::deadline::Deadline;
use crate::error::{InboxError, Result};
use crate::index::ThreadIndex;
use crate::model::message::{Message, MessageHeader};
use crate::model::thread::ThreadNode;
use crate::parser::{self, header};
use crate::source::{Locator, RawSource};

use super::ThreadStore;

/// Thread store that keeps only headers and the reply graph in memory.
///
/// Bodies are fetched and parsed again on every [`ThreadStore::get`] and
/// [`ThreadStore::thread`] call. The store is `Send + Sync` when `S` is.
pub struct MemStore<S> {
    source: S,
    index: ThreadIndex,
    /// Where the indexed copy of each Message-ID lives.
    locators: HashMap<String, Locator>,
}

impl<S: RawSource> MemStore<S> {
    /// Scan `source` once and build the thread index.
    ///
    /// Messages whose headers cannot be parsed are skipped and logged; a
    /// later copy of the same Message-ID can still take their place.
    /// I/O errors, cancellation and an expired deadline abort the build.
    pub fn open(source: S, deadline: &Deadline, max_depth: usize) -> Result<Self> {
        let mut headers = Vec::new();
        let mut locators = HashMap::new();
        let mut skipped = 0usize;

        source.enumerate(deadline, &mut |raw, locator| {
            match header::extract_header(&raw) {
                Ok(h) if h.id.is_empty() => {
                    debug!(title = %h.title, ?locator, "Skipping message without Message-ID");
                }
                Ok(h) => {
                    // Same first-wins rule as the index, over parsed headers only.
                    locators.entry(h.id.clone()).or_insert(locator);
                    headers.push(h);
                }
                Err(e) if e.is_per_message() => {
                    warn!(error = %e, ?locator, "Skipping unparseable message");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
            Ok(())
        })?;
        if skipped > 0 {
            info!(skipped, "Some messages were left out of the index");
        }

        let index = ThreadIndex::build(headers, max_depth);
        Ok(Self {
            source,
            index,
            locators,
        })
    }

    pub fn index(&self) -> &ThreadIndex {
        &self.index
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn hydrate(&self, id: &str, deadline: &Deadline) -> Result<Message> {
        deadline.check()?;
        let locator = self
            .locators
            .get(id)
            .ok_or_else(|| InboxError::NotFound(id.to_string()))?;
        let raw = self.source.fetch(locator)?;
        parser::parse_message(&raw)
    }
}

impl<S: RawSource> ThreadStore for MemStore<S> {
    fn list(&self) -> Vec<&MessageHeader> {
        self.index.roots()
    }

    fn header(&self, id: &str) -> Option<&MessageHeader> {
        self.index.header(id)
    }

    fn get(&self, id: &str, deadline: &Deadline) -> Result<Message> {
        if !self.index.contains(id) {
            return Err(InboxError::NotFound(id.to_string()));
        }
        self.hydrate(id, deadline)
    }

    fn thread_count(&self, id: &str) -> Result<usize> {
        self.index.thread_count(id)
    }

    fn thread(&self, id: &str, deadline: &Deadline) -> Result<ThreadNode> {
        let head = self.index.thread_head(id)?;

        // Pre-order walk recording each node's parent slot, then assemble
        // bottom-up so deep chains do not recurse.
        let mut slots: Vec<(Option<ThreadNode>, Option<usize>)> = Vec::new();
        let mut stack: Vec<(&str, usize, Option<usize>)> = vec![(head.id.as_str(), 0, None)];
        while let Some((node_id, level, parent)) = stack.pop() {
            let message = self.hydrate(node_id, deadline)?;
            let slot = slots.len();
            slots.push((
                Some(ThreadNode {
                    message,
                    children: Vec::new(),
                    level,
                }),
                parent,
            ));
            if let Some(node) = self.index.node(node_id) {
                stack.extend(
                    node.children
                        .iter()
                        .rev()
                        .map(|c| (c.as_str(), level + 1, Some(slot))),
                );
            }
        }

        // Children are pushed in reverse; flip each list once it is complete.
        for i in (1..slots.len()).rev() {
            let (node, parent) = &mut slots[i];
            let (Some(mut node), Some(parent)) = (node.take(), *parent) else {
                continue;
            };
            node.children.reverse();
            if let Some(p) = slots[parent].0.as_mut() {
                p.children.push(node);
            }
        }

        let mut root = slots
            .first_mut()
            .and_then(|(node, _)| node.take())
            .ok_or_else(|| InboxError::NotFound(id.to_string()))?;
        root.children.reverse();
        debug!(id, head = %root.message.id(), size = root.message_count(), "Hydrated thread");
        Ok(root)
    }
}
