//! Streaming consumer.
//!
//! Checks out the next item on the first `read` and hands its payload back
//! one piece at a time: inline items in a single read, chunked items one
//! chunk per read. The checkout stays open until resolved with `close`; a
//! reader dropped without closing leaves its item checked out until the
//! queue is reopened.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::QueueError;

use super::{OpenItem, Queue};

pub struct QueueReader {
    queue: Arc<Queue>,
    item: Option<OpenItem>,
    pieces_read: u64,
    tell: u64,
}

impl QueueReader {
    pub fn new(queue: Arc<Queue>) -> Self {
        Self {
            queue,
            item: None,
            pieces_read: 0,
            tell: 0,
        }
    }

    /// Read the next piece of the item, opening a checkout on the first
    /// call. Returns `Ok(None)` when the queue is empty or the item is
    /// exhausted.
    pub fn read(&mut self) -> Result<Option<Bytes>, QueueError> {
        if self.item.is_none() {
            match self.queue.pop_open()? {
                Some(item) => self.item = Some(item),
                None => return Ok(None),
            }
        }
        let Some(item) = self.item.as_ref() else {
            return Ok(None);
        };
        let header = item.header;
        let value = item.value.clone();

        match header {
            None => {
                if self.pieces_read > 0 {
                    return Ok(None);
                }
                self.pieces_read = 1;
                self.tell = value.len() as u64;
                Ok(Some(value))
            }
            Some(header) => {
                if self.pieces_read >= header.chunk_count() {
                    return Ok(None);
                }
                let chunk = self.queue.read_chunk(header.beg + self.pieces_read)?;
                self.pieces_read += 1;
                self.tell += chunk.len() as u64;
                Ok(Some(chunk))
            }
        }
    }

    /// Bytes read so far.
    pub fn tell(&self) -> u64 {
        self.tell
    }

    /// Total size in bytes of the open item, or 0 before the first read.
    pub fn size(&self) -> u64 {
        match self.item.as_ref() {
            Some(item) => match item.header {
                Some(header) => header.size,
                None => item.value.len() as u64,
            },
            None => 0,
        }
    }

    /// Id of the open item, once a read has opened one.
    pub fn id(&self) -> Option<u64> {
        self.item.as_ref().map(|item| item.id)
    }

    /// Resolve the checkout: delete the item or return it to the queue. A
    /// returned item goes back whole, regardless of how much was read. The
    /// reader is reset and can open the next item.
    pub fn close(&mut self, remove: bool) -> Result<(), QueueError> {
        let Some(item) = self.item.take() else {
            return Err(QueueError::NotFound);
        };
        self.pieces_read = 0;
        self.tell = 0;
        self.queue.pop_close(remove, item.id, item.header.as_ref())
    }
}
