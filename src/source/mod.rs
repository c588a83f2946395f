//! Raw message sources: where message bytes come from.
//!
//! A source is scanned once when the store is built. The scan hands out only
//! header blocks, each with a [`Locator`]; the store keeps the locator of the
//! copy it indexed and asks for that exact message whenever a body has to be
//! hydrated.

pub mod dir;
pub mod mbox;
pub mod memory;

use std::path::{Path, PathBuf};

use crate::config::ArchiveConfig;
use crate::deadline::Deadline;
use crate::error::{InboxError, Result};
use crate::parser::raw::RawMessage;

pub use self::dir::DirSource;
pub use self::mbox::MboxSource;
pub use self::memory::MemorySource;

/// Where one message lives inside its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A whole file of a directory archive.
    File(PathBuf),
    /// Byte range of an MBOX file, `From ` line included.
    Span { offset: u64, length: u64 },
    /// Position in an in-memory list.
    Slot(usize),
}

/// Callback receiving one header-only message and its locator.
pub type EntrySink<'a> = dyn FnMut(RawMessage, Locator) -> Result<()> + 'a;

/// Backend that hands out raw messages.
pub trait RawSource {
    /// Scan every message in the archive, in a stable order.
    ///
    /// `on_entry` receives each message with its headers only (see
    /// [`RawMessage::parse_headers`]) and where to find it again. An error
    /// returned by `on_entry` stops the scan and is passed through.
    fn enumerate(&self, deadline: &Deadline, on_entry: &mut EntrySink<'_>) -> Result<()>;

    /// Read and decode the full message at `locator`.
    ///
    /// Fails with [`InboxError::NotFound`] when the locator does not belong
    /// to this source.
    fn fetch(&self, locator: &Locator) -> Result<RawMessage>;
}

impl<S: RawSource + ?Sized> RawSource for Box<S> {
    fn enumerate(&self, deadline: &Deadline, on_entry: &mut EntrySink<'_>) -> Result<()> {
        (**self).enumerate(deadline, on_entry)
    }

    fn fetch(&self, locator: &Locator) -> Result<RawMessage> {
        (**self).fetch(locator)
    }
}

/// Error for a locator handed to the wrong kind of source.
pub(crate) fn foreign_locator(locator: &Locator) -> InboxError {
    InboxError::NotFound(format!("{locator:?}"))
}

/// A source picked at runtime from an archive path.
pub type BoxedSource = Box<dyn RawSource + Send + Sync>;

/// Open a directory archive or a single MBOX file.
pub fn open_archive(path: &Path, config: &ArchiveConfig) -> Result<BoxedSource> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            InboxError::InvalidPath(path.display().to_string())
        } else {
            InboxError::io(path, e)
        }
    })?;

    if metadata.is_dir() {
        Ok(Box::new(DirSource::new(path, config)?))
    } else {
        Ok(Box::new(MboxSource::new(path, config)?))
    }
}
