//! Item value codec.
//!
//! A queue record's value starts with a one-byte tag: inline payloads carry
//! their bytes directly after it, chunked items carry a fixed-width header
//! naming the chunk range `[beg, end)` and the total payload size.

use bytes::Bytes;

pub const TAG_INLINE: u8 = 0;
pub const TAG_HEADER: u8 = 1;

pub const HEADER_LEN: usize = 24;

/// Descriptor of a chunked item: the reserved chunk range and the total
/// payload byte length across it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub beg: u64,
    pub end: u64,
    pub size: u64,
}

impl Header {
    pub fn chunk_count(&self) -> u64 {
        self.end - self.beg
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[..8].copy_from_slice(&self.beg.to_be_bytes());
        buf[8..16].copy_from_slice(&self.end.to_be_bytes());
        buf[16..].copy_from_slice(&self.size.to_be_bytes());
        buf
    }

    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() != HEADER_LEN {
            return None;
        }
        let mut beg = [0u8; 8];
        let mut end = [0u8; 8];
        let mut size = [0u8; 8];
        beg.copy_from_slice(&raw[..8]);
        end.copy_from_slice(&raw[8..16]);
        size.copy_from_slice(&raw[16..]);
        Some(Self {
            beg: u64::from_be_bytes(beg),
            end: u64::from_be_bytes(end),
            size: u64::from_be_bytes(size),
        })
    }
}

/// A decoded queue record value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValue {
    Inline(Bytes),
    Chunked(Header),
}

/// Tag an inline payload for storage.
pub fn inline_value(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + payload.len());
    buf.push(TAG_INLINE);
    buf.extend_from_slice(payload);
    buf
}

/// Tag an encoded header for storage.
pub fn header_value(header: &Header) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + HEADER_LEN);
    buf.push(TAG_HEADER);
    buf.extend_from_slice(&header.encode());
    buf
}

/// Decode a stored queue record value. `None` means the tag is unknown or
/// the header is malformed.
pub fn decode_value(raw: &[u8]) -> Option<ItemValue> {
    match raw.split_first()? {
        (&TAG_INLINE, payload) => Some(ItemValue::Inline(Bytes::copy_from_slice(payload))),
        (&TAG_HEADER, rest) => Header::decode(rest).map(ItemValue::Chunked),
        _ => None,
    }
}

/// Payload size named by a stored value, without copying it out: the inline
/// byte length, or the total size a chunk header carries.
pub fn value_size(raw: &[u8]) -> Option<u64> {
    match raw.split_first()? {
        (&TAG_INLINE, payload) => Some(payload.len() as u64),
        (&TAG_HEADER, rest) => Header::decode(rest).map(|h| h.size),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = Header {
            beg: 3,
            end: 7,
            size: 9001,
        };
        assert_eq!(Header::decode(&header.encode()), Some(header));
        assert_eq!(header.chunk_count(), 4);
    }

    #[test]
    fn header_rejects_wrong_length() {
        assert_eq!(Header::decode(&[0u8; 23]), None);
        assert_eq!(Header::decode(&[0u8; 25]), None);
    }

    #[test]
    fn inline_value_roundtrip() {
        let raw = inline_value(b"payload\0with\0nuls");
        assert_eq!(
            decode_value(&raw),
            Some(ItemValue::Inline(Bytes::from_static(b"payload\0with\0nuls")))
        );
    }

    #[test]
    fn header_value_roundtrip() {
        let header = Header {
            beg: 0,
            end: 3,
            size: 9,
        };
        assert_eq!(
            decode_value(&header_value(&header)),
            Some(ItemValue::Chunked(header))
        );
    }

    #[test]
    fn empty_inline_is_distinct_from_empty_record() {
        assert_eq!(
            decode_value(&inline_value(b"")),
            Some(ItemValue::Inline(Bytes::new()))
        );
        assert_eq!(decode_value(&[]), None);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(decode_value(&[9, 1, 2, 3]), None);
    }

    #[test]
    fn value_size_matches_both_shapes() {
        assert_eq!(value_size(&inline_value(b"hello")), Some(5));
        let header = Header {
            beg: 0,
            end: 2,
            size: 4096,
        };
        assert_eq!(value_size(&header_value(&header)), Some(4096));
        assert_eq!(value_size(&[9, 1, 2]), None);
    }

    #[test]
    fn header_sized_inline_payload_stays_inline() {
        // A payload that happens to be exactly header-sized must not be
        // mistaken for a chunk header.
        let payload = [0xABu8; HEADER_LEN];
        let raw = inline_value(&payload);
        assert_eq!(
            decode_value(&raw),
            Some(ItemValue::Inline(Bytes::copy_from_slice(&payload)))
        );
    }
}
