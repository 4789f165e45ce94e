//! Journal key codec.
//!
//! Every record in the journal is addressed by a fixed-width 9-byte key: a
//! u64 id followed by a one-byte record kind. Ids are stored big-endian and
//! the installed comparator orders keys `(kind asc, id asc)`, so each kind's
//! id-space is contiguous on disk.

use std::cmp::Ordering;

/// Stable name of the journal comparator. A journal created under this name
/// cannot be opened without the same comparator installed.
pub const COMPARATOR_NAME: &str = "hopper.journal.v1";

pub const KEY_LEN: usize = 9;

const KIND_QUEUE: u8 = 1;
const KIND_CHUNK: u8 = 2;

/// Record namespaces within the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// One record per item: an inline payload or a chunk header.
    Queue,
    /// Raw payload fragments addressed by reserved chunk ids.
    Chunk,
}

impl Kind {
    fn discriminant(self) -> u8 {
        match self {
            Kind::Queue => KIND_QUEUE,
            Kind::Chunk => KIND_CHUNK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub kind: Kind,
    pub id: u64,
}

impl Key {
    pub fn queue(id: u64) -> Self {
        Self {
            kind: Kind::Queue,
            id,
        }
    }

    pub fn chunk(id: u64) -> Self {
        Self {
            kind: Kind::Chunk,
            id,
        }
    }

    pub fn encode(&self) -> [u8; KEY_LEN] {
        let mut buf = [0u8; KEY_LEN];
        buf[..8].copy_from_slice(&self.id.to_be_bytes());
        buf[8] = self.kind.discriminant();
        buf
    }

    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() != KEY_LEN {
            return None;
        }
        let mut id_bytes = [0u8; 8];
        id_bytes.copy_from_slice(&raw[..8]);
        let kind = match raw[8] {
            KIND_QUEUE => Kind::Queue,
            KIND_CHUNK => Kind::Chunk,
            _ => return None,
        };
        Some(Self {
            kind,
            id: u64::from_be_bytes(id_bytes),
        })
    }
}

/// Orders raw journal keys `(kind, id)` ascending. Keys that fail to decode
/// fall back to byte order so the comparison stays total.
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    match (Key::decode(a), Key::decode(b)) {
        (Some(ka), Some(kb)) => (ka.kind.discriminant(), ka.id).cmp(&(kb.kind.discriminant(), kb.id)),
        _ => a.cmp(b),
    }
}
