//! Reply graph over indexed headers.
//!
//! Parent links come from `In-Reply-To` only. A reply whose parent is not in
//! the archive starts its own thread.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::error::{InboxError, Result};
use crate::model::message::MessageHeader;

/// One message in the reply graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    /// Parent `Message-ID`, set only when the parent is indexed.
    pub parent: Option<String>,
    /// Direct replies, oldest first.
    pub children: Vec<String>,
}

/// Parent/children links for every indexed message.
#[derive(Debug, Default)]
pub struct ReplyGraph {
    nodes: HashMap<String, GraphNode>,
}

impl ReplyGraph {
    /// Link every header to its parent and sort each child list.
    pub fn build(headers: &HashMap<String, MessageHeader>) -> Self {
        // Pass 1: one node per header, parent only if it resolves.
        let mut nodes: HashMap<String, GraphNode> = headers
            .values()
            .map(|h| {
                let parent = h
                    .reply_to
                    .as_ref()
                    .filter(|p| headers.contains_key(p.as_str()))
                    .cloned();
                let node = GraphNode {
                    id: h.id.clone(),
                    parent,
                    children: Vec::new(),
                };
                (h.id.clone(), node)
            })
            .collect();

        // Pass 2: attach children to parents.
        let links: Vec<(String, String)> = nodes
            .values()
            .filter_map(|n| n.parent.clone().map(|p| (p, n.id.clone())))
            .collect();
        for (parent, child) in links {
            if let Some(node) = nodes.get_mut(&parent) {
                node.children.push(child);
            }
        }

        for node in nodes.values_mut() {
            node.children
                .sort_by(|a, b| oldest_first(&headers[a], &headers[b]));
        }

        Self { nodes }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of nodes without a parent, in no particular order.
    pub fn root_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .values()
            .filter(|n| n.parent.is_none())
            .map(|n| n.id.as_str())
    }

    /// Walk parent links from `id` up to the thread root.
    ///
    /// Gives up after `max_depth` steps, or as soon as a node repeats.
    pub fn thread_head(&self, id: &str, max_depth: usize) -> Result<&GraphNode> {
        let mut current = self
            .nodes
            .get(id)
            .ok_or_else(|| InboxError::NotFound(id.to_string()))?;
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(current.id.as_str());

        let mut depth = 0;
        while let Some(parent_id) = current.parent.as_deref() {
            if !visited.insert(parent_id) {
                return Err(InboxError::CycleDetected(parent_id.to_string()));
            }
            depth += 1;
            if depth > max_depth {
                return Err(InboxError::MaxDepthExceeded {
                    id: id.to_string(),
                    depth: max_depth,
                });
            }
            current = self
                .nodes
                .get(parent_id)
                .ok_or_else(|| InboxError::NotFound(parent_id.to_string()))?;
        }
        Ok(current)
    }

    /// Ids of `root` and everything below it, parents before children,
    /// siblings oldest first.
    pub fn subtree(&self, root: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            out.push(node.id.as_str());
            stack.extend(node.children.iter().rev().map(String::as_str));
        }
        out
    }

    /// Number of nodes not reachable from any root.
    ///
    /// Only members of reply cycles (and their descendants) end up here.
    pub fn unreachable_count(&self) -> usize {
        let reachable: usize = self.root_ids().map(|r| self.subtree(r).len()).sum();
        self.nodes.len() - reachable
    }
}

/// Children order: date ascending, ties broken by id.
fn oldest_first(a: &MessageHeader, b: &MessageHeader) -> Ordering {
    a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id))
}
