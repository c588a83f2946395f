//! Body segmentation into plain, quoted and patch blocks.
//!
//! A small line-driven state machine. Once a patch starts it runs to the end
//! of the message: there is no end-of-patch detection, so any text after a
//! diff (signatures, list footers) stays inside the patch block.

use crate::model::message::{BlockKind, BodyBlock};

/// Result of segmenting one message body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentedBody {
    /// Non-empty blocks in body order.
    pub blocks: Vec<BodyBlock>,
    /// A `Signed-off-by:` line was seen in plain text.
    pub signed_off: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Plain,
    InQuotes,
    InPatch,
}

/// Split a message body into typed blocks.
///
/// `Signed-off-by:` lines in plain text set [`SegmentedBody::signed_off`] and
/// are not copied into any block. Empty blocks are dropped, so an empty body
/// yields no blocks.
pub fn segment_body(body: &str) -> SegmentedBody {
    let mut out = SegmentedBody::default();
    let mut state = State::Plain;
    let mut current = BodyBlock::new(BlockKind::Plain, String::new());

    for line in body.lines() {
        let next = match state {
            State::Plain if line.starts_with("Signed-off-by:") => {
                out.signed_off = true;
                continue;
            }
            State::Plain if line.starts_with('>') => Some((BlockKind::Quotes, State::InQuotes)),
            State::Plain if is_patch_break(line) => Some((BlockKind::Patch, State::InPatch)),
            State::Plain => None,
            State::InQuotes if !line.starts_with('>') => Some((BlockKind::Plain, State::Plain)),
            State::InQuotes => None,
            // Absorbing: everything after the first patch break is patch text
            State::InPatch => None,
        };

        if let Some((kind, new_state)) = next {
            let finished = std::mem::replace(&mut current, BodyBlock::new(kind, String::new()));
            push_block(&mut out.blocks, finished);
            state = new_state;
        }

        current.body.push_str(line);
        current.body.push('\n');
    }

    push_block(&mut out.blocks, current);
    out
}

fn push_block(blocks: &mut Vec<BodyBlock>, block: BodyBlock) {
    if !block.body.is_empty() {
        blocks.push(block);
    }
}

/// Does this line start a patch?
///
/// True for `diff -…` and `Index: …` lines, for `--- <filename>` and for a
/// bare `---` separator optionally followed by spaces. Lines shorter than
/// three bytes never start a patch.
pub fn is_patch_break(line: &str) -> bool {
    if line.starts_with("diff -") || line.starts_with("Index: ") {
        return true;
    }

    let bytes = line.as_bytes();
    if bytes.len() < 3 || !line.starts_with("---") {
        return false;
    }

    // "--- <filename>"
    if bytes.get(3) == Some(&b' ') && bytes.get(4).is_some_and(|&b| b != b' ') {
        return true;
    }

    // "---" followed only by spaces
    bytes[3..].iter().all(|&b| b == b' ')
}
