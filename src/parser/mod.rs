//! Email parsing: raw message splitting, header extraction, body segmentation
//! and diff splitting.

pub mod body;
pub mod diff;
pub mod header;
pub mod raw;

use crate::error::Result;
use crate::model::message::Message;

use self::raw::RawMessage;

/// Hydrate a full [`Message`] from a raw message: headers plus segmented body.
pub fn parse_message(raw: &RawMessage) -> Result<Message> {
    let header = header::extract_header(raw)?;
    let segmented = body::segment_body(raw.body());
    Ok(Message {
        header,
        body: segmented.blocks,
        signed_off: segmented.signed_off,
    })
}
