use tca_core::types::ChannelId;

use crate::error::{Result, StorageError};
use crate::model::Cursor;

/// Decodes and validates the per-channel cursor JSON blob.
///
/// Malformed JSON or a JSON value that isn't an object of the expected
/// shape is a deterministic [`StorageError::InvalidCursor`], never a panic.
pub fn decode(channel_id: ChannelId, raw: &str) -> Result<Cursor> {
    serde_json::from_str::<Cursor>(raw).map_err(|e| StorageError::InvalidCursor {
        channel_id: channel_id.as_i64(),
        reason: e.to_string(),
    })
}

pub fn encode(cursor: &Cursor) -> String {
    serde_json::to_string(cursor).expect("Cursor is always representable as JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let cursor = Cursor {
            last_message_id: Some(42),
            next_offset_id: None,
            last_polled_at: None,
        };
        let encoded = encode(&cursor);
        let decoded = decode(ChannelId(1), &encoded).unwrap();
        assert_eq!(decoded.last_message_id, Some(42));
    }

    #[test]
    fn malformed_json_is_a_typed_error_not_a_panic() {
        let err = decode(ChannelId(7), "not json").unwrap_err();
        match err {
            StorageError::InvalidCursor { channel_id, .. } => assert_eq!(channel_id, 7),
            _ => panic!("wrong error variant"),
        }
    }
}
