//! Hydrated reply trees.

use serde::Serialize;

use super::message::Message;

/// One message in a materialized thread, with its replies.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadNode {
    #[serde(flatten)]
    pub message: Message,
    /// Direct replies, oldest first.
    pub children: Vec<ThreadNode>,
    /// Depth from the thread root (root = 0).
    pub level: usize,
}

impl ThreadNode {
    /// Flatten the tree parent-before-children, children oldest first.
    ///
    /// This is the only traversal order used for thread listings.
    pub fn flatten(&self) -> Vec<&ThreadNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Number of messages in this subtree, the node itself included.
    pub fn message_count(&self) -> usize {
        self.flatten().len()
    }
}
