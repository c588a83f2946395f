//! Thread index: headers by Message-ID, the reply graph, and the root list.
//!
//! Built once from a full scan and read-only afterwards.

pub mod graph;

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::message::MessageHeader;

pub use self::graph::{GraphNode, ReplyGraph};

/// Number of roots returned by [`ThreadIndex::roots`].
pub const ROOT_PAGE_SIZE: usize = 20;

/// Default bound for walking up a reply chain.
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

/// Read-only index over every successfully parsed header.
#[derive(Debug)]
pub struct ThreadIndex {
    headers: HashMap<String, MessageHeader>,
    graph: ReplyGraph,
    /// All root ids, newest first.
    roots: Vec<String>,
    max_depth: usize,
}

impl ThreadIndex {
    /// Build the index from headers in enumeration order.
    ///
    /// When two headers share an id the first one is kept.
    pub fn build(headers: impl IntoIterator<Item = MessageHeader>, max_depth: usize) -> Self {
        let mut map: HashMap<String, MessageHeader> = HashMap::new();
        let mut duplicates = 0usize;
        for header in headers {
            if map.contains_key(&header.id) {
                warn!(id = %header.id, "Duplicate Message-ID, keeping first occurrence");
                duplicates += 1;
                continue;
            }
            map.insert(header.id.clone(), header);
        }

        let graph = ReplyGraph::build(&map);

        let mut roots: Vec<&MessageHeader> = graph.root_ids().map(|id| &map[id]).collect();
        roots.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        let roots: Vec<String> = roots.into_iter().map(|h| h.id.clone()).collect();

        let unreachable = graph.unreachable_count();
        if unreachable > 0 {
            warn!(count = unreachable, "Messages caught in reply cycles, not reachable from any thread root");
        }

        info!(
            messages = map.len(),
            threads = roots.len(),
            duplicates,
            "Thread index built"
        );

        Self {
            headers: map,
            graph,
            roots,
            max_depth,
        }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.headers.contains_key(id)
    }

    pub fn header(&self, id: &str) -> Option<&MessageHeader> {
        self.headers.get(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.graph.node(id)
    }

    /// The newest [`ROOT_PAGE_SIZE`] thread roots.
    pub fn roots(&self) -> Vec<&MessageHeader> {
        self.roots
            .iter()
            .take(ROOT_PAGE_SIZE)
            .filter_map(|id| self.headers.get(id))
            .collect()
    }

    /// Total number of threads, including those past the first page.
    pub fn thread_total(&self) -> usize {
        self.roots.len()
    }

    /// Root of the thread containing `id`.
    pub fn thread_head(&self, id: &str) -> Result<&GraphNode> {
        self.graph.thread_head(id, self.max_depth)
    }

    /// Ids of every message in the thread containing `id`, in listing order.
    pub fn thread_ids(&self, id: &str) -> Result<Vec<&str>> {
        let head = self.thread_head(id)?;
        let ids = self.graph.subtree(&head.id);
        debug!(id, head = %head.id, count = ids.len(), "Resolved thread");
        Ok(ids)
    }

    pub fn thread_count(&self, id: &str) -> Result<usize> {
        Ok(self.thread_ids(id)?.len())
    }
}
