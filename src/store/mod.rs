//! Query API over an indexed archive.

pub mod memory;

use crate::deadline::Deadline;
use crate::error::Result;
use crate::model::message::{Message, MessageHeader};
use crate::model::thread::ThreadNode;

pub use self::memory::MemStore;

/// Read-only queries over threads.
///
/// Header lookups are answered from the index. Anything that needs a body
/// re-reads the raw message from its source on every call.
pub trait ThreadStore {
    /// Up to [`crate::index::ROOT_PAGE_SIZE`] thread roots, newest first.
    fn list(&self) -> Vec<&MessageHeader>;

    /// Indexed header of one message, without touching the source.
    fn header(&self, id: &str) -> Option<&MessageHeader>;

    /// One fully parsed message.
    fn get(&self, id: &str, deadline: &Deadline) -> Result<Message>;

    /// Number of messages in the thread containing `id`.
    fn thread_count(&self, id: &str) -> Result<usize>;

    /// The whole thread containing `id`, starting from its root.
    fn thread(&self, id: &str, deadline: &Deadline) -> Result<ThreadNode>;
}
