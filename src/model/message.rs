//! Message header, body block and hydrated message types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::address::EmailAddress;
use crate::parser::diff::{self, FileDiff};

/// Headers of one message, as kept in the thread index.
///
/// Built once by [`crate::parser::header::extract_header`] and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageHeader {
    /// `Message-ID` without the surrounding angle brackets.
    pub id: String,
    /// Parent `Message-ID` from `In-Reply-To`, if well-formed.
    pub reply_to: Option<String>,
    /// Decoded `Subject`.
    pub title: String,
    /// Sender (`From`).
    pub author: EmailAddress,
    /// Parsed `Date`.
    pub date: DateTime<Utc>,
    /// `To` display names joined with `", "`.
    pub to: String,
    /// `Cc` display names joined with `", "`; empty when missing or malformed.
    pub cc: String,
}

/// Classification of a body block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Plain,
    Quotes,
    Patch,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Quotes => "quotes",
            Self::Patch => "patch",
        }
    }
}

/// A contiguous run of body lines of the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BodyBlock {
    pub kind: BlockKind,
    /// Raw text, every line terminated by `\n`.
    pub body: String,
}

/// How a patch block should be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchView {
    /// The block split cleanly into one diff per file.
    Files(Vec<FileDiff>),
    /// The block could not be split; show it unformatted.
    Raw(String),
}

impl BodyBlock {
    pub fn new(kind: BlockKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }

    /// Split a patch block into per-file diffs, falling back to the raw text
    /// when the diff is malformed. Non-patch blocks are always `Raw`.
    pub fn patch_view(&self) -> PatchView {
        if self.kind != BlockKind::Patch {
            return PatchView::Raw(self.body.clone());
        }
        match diff::split_diffs(&self.body) {
            Ok(units) => PatchView::Files(units.into_iter().map(FileDiff::new).collect()),
            Err(e) => {
                warn!(error = %e, "Malformed patch block, showing raw text");
                PatchView::Raw(self.body.clone())
            }
        }
    }
}

/// A fully hydrated message: headers plus segmented body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    #[serde(flatten)]
    pub header: MessageHeader,
    pub body: Vec<BodyBlock>,
    /// A `Signed-off-by:` trailer was seen outside quotes and patches.
    ///
    /// This is a textual heuristic; the trailer is not matched against the author.
    pub signed_off: bool,
}

impl Message {
    pub fn id(&self) -> &str {
        &self.header.id
    }

    /// Iterate over the patch blocks only.
    pub fn patches(&self) -> impl Iterator<Item = &BodyBlock> {
        self.body.iter().filter(|b| b.kind == BlockKind::Patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_kind_names() {
        assert_eq!(BlockKind::Plain.as_str(), "plain");
        assert_eq!(BlockKind::Quotes.as_str(), "quotes");
        assert_eq!(BlockKind::Patch.as_str(), "patch");
        assert_eq!(serde_json::to_string(&BlockKind::Patch).unwrap(), "\"patch\"");
    }

    #[test]
    fn test_patch_view_splits_files() {
        let block = BodyBlock::new(
            BlockKind::Patch,
            "---\n a | 1 +\ndiff --git a/a b/a\n--- a/a\n+++ b/a\n@@ -0,0 +1 @@\n+x\n",
        );
        match block.patch_view() {
            PatchView::Files(files) => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].new_path.as_deref(), Some("a"));
            }
            PatchView::Raw(_) => panic!("expected split diff"),
        }
    }

    #[test]
    fn test_patch_view_falls_back_to_raw() {
        let text = "diff --git a/a b/a\n@@ -1 +1 @@\nbroken line\n";
        let block = BodyBlock::new(BlockKind::Patch, text);
        assert_eq!(block.patch_view(), PatchView::Raw(text.to_string()));
    }

    #[test]
    fn test_patch_view_of_plain_block_is_raw() {
        let block = BodyBlock::new(BlockKind::Plain, "hello\n");
        assert_eq!(block.patch_view(), PatchView::Raw("hello\n".to_string()));
    }
}
