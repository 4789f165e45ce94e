//! Streaming producer.
//!
//! Splits a payload across a reserved chunk range, one chunk per `write`. A
//! single-chunk writer skips the chunk store and pushes the payload inline.
//! The item only becomes visible to consumers once the final chunk lands and
//! the header is pushed.

use std::sync::Arc;

use crate::error::QueueError;

use super::{Header, Queue};

pub struct QueueWriter {
    queue: Arc<Queue>,
    chunks: u64,
    header: Option<Header>,
    written: u64,
    tell: u64,
    id: Option<u64>,
}

impl QueueWriter {
    /// Start an item that will arrive in `chunks` pieces.
    pub fn new(queue: Arc<Queue>, chunks: u64) -> Self {
        Self {
            queue,
            chunks: chunks.max(1),
            header: None,
            written: 0,
            tell: 0,
            id: None,
        }
    }

    /// Write the next piece. The final piece completes the item and pushes
    /// it onto the queue; any write after that fails.
    pub fn write(&mut self, value: &[u8]) -> Result<(), QueueError> {
        if self.id.is_some() {
            return Err(QueueError::ChunkRangeExhausted);
        }

        if self.chunks == 1 {
            self.id = Some(self.queue.push(value)?);
            self.tell = value.len() as u64;
            return Ok(());
        }

        let mut header = match self.header {
            Some(header) => header,
            None => self.queue.reserve_chunks(self.chunks),
        };

        self.queue.write_chunk(value, header.beg + self.written)?;
        self.written += 1;
        self.tell += value.len() as u64;
        header.size = self.tell;
        self.header = Some(header);

        if self.written == self.chunks {
            self.id = Some(self.queue.push_header(&header)?);
        }
        Ok(())
    }

    /// Abandon an unfinished item, erasing any chunks already written. The
    /// reserved chunk ids are not reused; leftover reservations are garbage
    /// the journal tolerates.
    pub fn cancel(&mut self) -> Result<(), QueueError> {
        if self.id.is_some() {
            return Err(QueueError::AlreadyPushed);
        }
        if let Some(header) = self.header.take() {
            if self.written > 0 {
                self.queue.erase_chunks(&Header {
                    beg: header.beg,
                    end: header.beg + self.written,
                    size: self.tell,
                })?;
            }
        }
        self.written = 0;
        self.tell = 0;
        Ok(())
    }

    /// Bytes written so far.
    pub fn tell(&self) -> u64 {
        self.tell
    }

    /// Id assigned to the item once it has been pushed.
    pub fn id(&self) -> Option<u64> {
        self.id
    }
}
