//! RocksDB-backed journal.
//!
//! Owns the database handle and write options. The `(kind, id)` comparator
//! is installed at open; every database created here carries its name, so a
//! journal can only be reopened with the comparator present.

use std::path::Path;

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::queue::keys::{self, Key, Kind, COMPARATOR_NAME};

pub struct Journal {
    db: DB,
    write_opts: WriteOptions,
}

impl Journal {
    pub fn open(path: &Path, config: &QueueConfig) -> Result<Self, QueueError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_comparator(COMPARATOR_NAME, Box::new(keys::compare_keys));

        let db = DB::open(&opts, path)?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(config.sync_writes);

        Ok(Self { db, write_opts })
    }

    pub fn put(&self, key: Key, value: &[u8]) -> Result<(), QueueError> {
        self.db.put_opt(key.encode(), value, &self.write_opts)?;
        Ok(())
    }

    pub fn get(&self, key: Key) -> Result<Option<Vec<u8>>, QueueError> {
        Ok(self.db.get(key.encode())?)
    }

    /// Apply a batch as a single atomic write.
    pub fn write(&self, batch: WriteBatch) -> Result<(), QueueError> {
        self.db.write_opt(batch, &self.write_opts)?;
        Ok(())
    }

    /// Smallest id of the given kind still present, if any.
    pub fn min_id(&self, kind: Kind) -> Result<Option<u64>, QueueError> {
        let from = Key { kind, id: 0 }.encode();
        self.edge_id(kind, IteratorMode::From(&from[..], Direction::Forward))
    }

    /// Largest id of the given kind still present, if any.
    pub fn max_id(&self, kind: Kind) -> Result<Option<u64>, QueueError> {
        let from = Key { kind, id: u64::MAX }.encode();
        self.edge_id(kind, IteratorMode::From(&from[..], Direction::Reverse))
    }

    /// Visit every record of the given kind in id order.
    pub fn for_each(
        &self,
        kind: Kind,
        mut visit: impl FnMut(u64, &[u8]),
    ) -> Result<(), QueueError> {
        let from = Key { kind, id: 0 }.encode();
        for entry in self
            .db
            .iterator(IteratorMode::From(&from[..], Direction::Forward))
        {
            let (raw, value) = entry?;
            match Key::decode(&raw) {
                Some(key) if key.kind == kind => visit(key.id, &value),
                // Ran off the end of this namespace.
                _ => break,
            }
        }
        Ok(())
    }

    fn edge_id(&self, kind: Kind, mode: IteratorMode) -> Result<Option<u64>, QueueError> {
        let mut iter = self.db.iterator(mode);
        match iter.next() {
            Some(entry) => {
                let (raw, _) = entry?;
                match Key::decode(&raw) {
                    Some(key) if key.kind == kind => Ok(Some(key.id)),
                    // First key in range belongs to the other namespace.
                    _ => Ok(None),
                }
            }
            None => Ok(None),
        }
    }
}
