//! Directory archive: one message per file, any nesting.
//!
//! The scan reads each file only up to the blank line ending its headers.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ArchiveConfig;
use crate::deadline::Deadline;
use crate::error::{InboxError, Result};
use crate::parser::raw::RawMessage;

use super::{foreign_locator, EntrySink, Locator, RawSource};

/// Reads a directory tree where every regular file is one message,
/// e.g. a checked-out public-inbox git repository.
pub struct DirSource {
    root: PathBuf,
    skip_hidden: bool,
    max_message_size: u64,
}

impl DirSource {
    pub fn new(root: impl AsRef<Path>, config: &ArchiveConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(InboxError::InvalidPath(root.display().to_string()));
        }
        Ok(Self {
            root,
            skip_hidden: config.skip_hidden,
            max_message_size: config.max_message_size,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_file(path: &Path) -> Result<RawMessage> {
        let data = std::fs::read(path).map_err(|e| InboxError::io(path, e))?;
        Ok(RawMessage::parse(&data))
    }

    /// Read a file up to and including the blank line that ends its headers.
    fn read_header_block(path: &Path) -> Result<Vec<u8>> {
        let file = File::open(path).map_err(|e| InboxError::io(path, e))?;
        let mut reader = BufReader::new(file);
        let mut block = Vec::with_capacity(4096);
        loop {
            let start = block.len();
            let n = reader
                .read_until(b'\n', &mut block)
                .map_err(|e| InboxError::io(path, e))?;
            if n == 0 || matches!(&block[start..], b"\n" | b"\r\n") {
                break;
            }
        }
        Ok(block)
    }
}

impl RawSource for DirSource {
    fn enumerate(&self, deadline: &Deadline, on_entry: &mut EntrySink<'_>) -> Result<()> {
        info!(path = %self.root.display(), "Scanning archive directory");

        let skip_hidden = self.skip_hidden;
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| !is_skipped_dir(e, skip_hidden));

        let mut count = 0usize;
        for entry in walker {
            deadline.check()?;

            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone());
                InboxError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let size = entry
                .metadata()
                .map_err(|e| InboxError::io(path, e.into()))?
                .len();
            if size > self.max_message_size {
                warn!(path = %path.display(), size, "Skipping oversized file");
                continue;
            }

            let raw = RawMessage::parse_headers(&Self::read_header_block(path)?);
            on_entry(raw, Locator::File(path.to_path_buf()))?;
            count += 1;
        }

        debug!(count, "Directory scan finished");
        Ok(())
    }

    fn fetch(&self, locator: &Locator) -> Result<RawMessage> {
        let Locator::File(path) = locator else {
            return Err(foreign_locator(locator));
        };
        debug!(path = %path.display(), "Reading message file");
        Self::read_file(path)
    }
}

/// `.git` is always skipped; other dot-directories only with `skip_hidden`.
fn is_skipped_dir(entry: &DirEntry, skip_hidden: bool) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name == ".git" || (skip_hidden && name.starts_with('.'))
}
