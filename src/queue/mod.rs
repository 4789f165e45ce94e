//! Durable FIFO queue over an embedded journal.
//!
//! Journal layout of queue records:
//!
//! ```text
//! --- < opened/returned > --- | TAIL | --- < enqueued > --- | HEAD |
//! ```
//!
//! Enqueued items are pushed at head and popped from tail. Opened items sit
//! below the tail while a consumer holds them; returned items were released
//! back without removal and are served again ahead of the tail. Chunk
//! records form a second namespace:
//!
//! ```text
//! --- < stored > --- | HEAD |
//! ```
//!
//! A queue instance exclusively owns its journal. The in-memory cursors, the
//! returned set, and the waiter line are guarded by one mutex; no operation
//! suspends while holding it.

mod header;
mod journal;
mod keys;
mod reader;
mod writer;

pub use header::Header;
pub use reader::QueueReader;
pub use writer::QueueWriter;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt::Write as _;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use rocksdb::WriteBatch;
use tokio::sync::oneshot;
use tracing::{debug, info, trace};

use crate::config::QueueConfig;
use crate::error::QueueError;
use header::ItemValue;
use journal::Journal;
use keys::{Key, Kind};

/// An item handed out by [`Queue::pop_open`]. The id stays checked out until
/// it is resolved with [`Queue::pop_close`].
///
/// Inline items carry their payload in `value`. Chunked items carry their
/// descriptor in `header` and an empty `value`; the payload is fetched with
/// [`Queue::read_chunk`] over `[header.beg, header.end)`.
#[derive(Debug, Clone)]
pub struct OpenItem {
    pub id: u64,
    pub header: Option<Header>,
    pub value: Bytes,
}

/// Point-in-time view of a queue's gauges and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Items currently eligible for pop.
    pub items: u64,
    /// Payload bytes across those items.
    pub bytes: u64,
    /// Consumers parked in the wait line.
    pub waiters: u64,
    /// Items checked out and not yet resolved.
    pub open_transactions: u64,
    /// Items pushed since open.
    pub total_pushed: u64,
    /// Checkouts opened since open.
    pub total_popped: u64,
    /// Waits that expired without an item.
    pub wait_timeouts: u64,
}

struct Waiter {
    token: u64,
    tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct State {
    /// Next free queue id; strictly greater than any queue key in the journal.
    queue_head: u64,
    /// Next enqueued id to check out. Ids below it are opened or returned.
    queue_tail: u64,
    /// Next free chunk id.
    chunks_head: u64,
    /// Payload bytes across items eligible for pop; moves with `count()`.
    queue_bytes: u64,
    /// Ids below the tail currently held by a consumer.
    items_open: u64,
    /// Size of each checked-out item, so a return can restore `queue_bytes`.
    open_bytes: HashMap<u64, u64>,
    /// Ids below the tail released back without removal; served before the
    /// tail, smallest first.
    returned: BTreeSet<u64>,
    waiters: VecDeque<Waiter>,
    next_waiter_token: u64,
    /// Items already promised to woken waiters that have not popped yet.
    /// Keeps newcomers from cutting the line between wake and pop.
    wakes_pending: u64,
}

impl State {
    fn count(&self) -> u64 {
        (self.queue_head - self.queue_tail) + self.returned.len() as u64
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_pushed: AtomicU64,
    total_popped: AtomicU64,
    wait_timeouts: AtomicU64,
}

pub struct Queue {
    journal: Journal,
    config: QueueConfig,
    state: Mutex<State>,
    counters: Counters,
}

impl Queue {
    /// Open or create the queue journal at `path` with default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, QueueError> {
        Self::open_with_config(path, QueueConfig::default())
    }

    /// Open or create the queue journal at `path`.
    ///
    /// Cursors are rebuilt from the journal: every queue record still present
    /// is enqueued again, including items that were checked out when the
    /// process last stopped. Consumers must tolerate redelivery.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: QueueConfig,
    ) -> Result<Self, QueueError> {
        if config.max_chunk_size == 0 {
            return Err(QueueError::InvalidConfig(
                "max_chunk_size must be greater than 0".to_string(),
            ));
        }

        let started = Instant::now();
        let journal = Journal::open(path.as_ref(), &config)?;

        let (queue_tail, queue_head) =
            match (journal.min_id(Kind::Queue)?, journal.max_id(Kind::Queue)?) {
                (Some(min), Some(max)) => (min, max + 1),
                _ => (0, 0),
            };
        let chunks_head = journal.max_id(Kind::Chunk)?.map_or(0, |id| id + 1);

        // Records that fail to decode carry no size here; they surface as
        // corruption when popped.
        let mut queue_bytes = 0u64;
        journal.for_each(Kind::Queue, |_, value| {
            queue_bytes += header::value_size(value).unwrap_or(0);
        })?;

        info!(
            path = %path.as_ref().display(),
            items = queue_head - queue_tail,
            bytes = queue_bytes,
            queue_tail,
            queue_head,
            chunks_head,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "opened queue journal"
        );

        Ok(Self {
            journal,
            config,
            state: Mutex::new(State {
                queue_head,
                queue_tail,
                chunks_head,
                queue_bytes,
                ..State::default()
            }),
            counters: Counters::default(),
        })
    }

    /// Append an inline item. Returns the assigned id.
    pub fn push(&self, value: &[u8]) -> Result<u64, QueueError> {
        let mut state = self.state.lock();
        let id = state.queue_head;
        self.journal.put(Key::queue(id), &header::inline_value(value))?;
        state.queue_head += 1;
        state.queue_bytes += value.len() as u64;
        self.counters.total_pushed.fetch_add(1, Ordering::Relaxed);
        trace!(id, len = value.len(), "pushed inline item");
        self.spin_waiters(&mut state);
        Ok(id)
    }

    /// Append a chunked item. Every chunk in `item_header`'s range must have
    /// been written with [`write_chunk`](Self::write_chunk) beforehand.
    /// Returns the assigned id.
    pub fn push_header(&self, item_header: &Header) -> Result<u64, QueueError> {
        let mut state = self.state.lock();
        let id = state.queue_head;
        self.journal
            .put(Key::queue(id), &header::header_value(item_header))?;
        state.queue_head += 1;
        state.queue_bytes += item_header.size;
        self.counters.total_pushed.fetch_add(1, Ordering::Relaxed);
        trace!(
            id,
            beg = item_header.beg,
            end = item_header.end,
            size = item_header.size,
            "pushed chunked item"
        );
        self.spin_waiters(&mut state);
        Ok(id)
    }

    /// Check out the next item. Returns `None` when nothing is eligible.
    ///
    /// Returned items are served before the tail, smallest id first, so a
    /// released item keeps its place ahead of newer ones. The queue record
    /// stays in the journal until the checkout is resolved with
    /// [`pop_close`](Self::pop_close).
    pub fn pop_open(&self) -> Result<Option<OpenItem>, QueueError> {
        let mut state = self.state.lock();

        let (id, from_returned) = match state.returned.first().copied() {
            Some(id) => (id, true),
            None if state.queue_tail < state.queue_head => (state.queue_tail, false),
            None => return Ok(None),
        };

        let raw = self.journal.get(Key::queue(id))?.ok_or_else(|| {
            QueueError::Corruption(format!("queue record {id} missing from journal"))
        })?;

        let (item_header, value) = match header::decode_value(&raw) {
            Some(ItemValue::Inline(payload)) => (None, payload),
            Some(ItemValue::Chunked(h)) => {
                if h.beg >= h.end || h.end > state.chunks_head {
                    return Err(QueueError::Corruption(format!(
                        "queue record {id} references chunk range {}..{} outside the store",
                        h.beg, h.end
                    )));
                }
                (Some(h), Bytes::new())
            }
            None => {
                return Err(QueueError::Corruption(format!(
                    "queue record {id} has an unrecognized value tag"
                )))
            }
        };

        if from_returned {
            state.returned.remove(&id);
        } else {
            state.queue_tail += 1;
        }
        let size = match item_header {
            Some(h) => h.size,
            None => value.len() as u64,
        };
        state.queue_bytes = state.queue_bytes.saturating_sub(size);
        state.open_bytes.insert(id, size);
        state.items_open += 1;
        state.wakes_pending = state.wakes_pending.saturating_sub(1);
        self.counters.total_popped.fetch_add(1, Ordering::Relaxed);
        trace!(id, chunked = item_header.is_some(), "opened item");

        Ok(Some(OpenItem {
            id,
            header: item_header,
            value,
        }))
    }

    /// Resolve a checkout. With `remove` the item (and its chunks) is deleted
    /// in one atomic write; without it the item returns to the queue ahead of
    /// the tail, immediately visible to waiters.
    pub fn pop_close(
        &self,
        remove: bool,
        id: u64,
        item_header: Option<&Header>,
    ) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        if remove {
            let mut batch = WriteBatch::default();
            batch.delete(Key::queue(id).encode());
            if let Some(h) = item_header {
                for chunk in h.beg..h.end {
                    batch.delete(Key::chunk(chunk).encode());
                }
            }
            self.journal.write(batch)?;
            state.open_bytes.remove(&id);
            state.items_open = state.items_open.saturating_sub(1);
            debug!(id, "removed item");
        } else {
            state.returned.insert(id);
            let size = state.open_bytes.remove(&id).unwrap_or(0);
            state.queue_bytes += size;
            state.items_open = state.items_open.saturating_sub(1);
            debug!(id, "returned item");
            self.spin_waiters(&mut state);
        }
        Ok(())
    }

    /// Reserve `n` chunk ids for a chunked item. The caller writes every
    /// chunk in the returned range, fills in the total size, then completes
    /// the item with [`push_header`](Self::push_header). Nothing is written
    /// to the journal at reservation time.
    pub fn reserve_chunks(&self, n: u64) -> Header {
        let mut state = self.state.lock();
        let beg = state.chunks_head;
        state.chunks_head += n;
        Header {
            beg,
            end: beg + n,
            size: 0,
        }
    }

    /// Write one chunk record. Chunks within a reserved range may land in
    /// any order.
    pub fn write_chunk(&self, value: &[u8], chunk_key: u64) -> Result<(), QueueError> {
        if value.len() > self.config.max_chunk_size {
            return Err(QueueError::ChunkTooLarge {
                got: value.len(),
                cap: self.config.max_chunk_size,
            });
        }
        self.journal.put(Key::chunk(chunk_key), value)
    }

    /// Read one chunk record.
    pub fn read_chunk(&self, chunk_key: u64) -> Result<Bytes, QueueError> {
        let raw = self
            .journal
            .get(Key::chunk(chunk_key))?
            .ok_or(QueueError::NotFound)?;
        Ok(Bytes::from(raw))
    }

    /// Delete every chunk in `item_header`'s range in one atomic write.
    pub fn erase_chunks(&self, item_header: &Header) -> Result<(), QueueError> {
        let mut batch = WriteBatch::default();
        for chunk in item_header.beg..item_header.end {
            batch.delete(Key::chunk(chunk).encode());
        }
        self.journal.write(batch)
    }

    /// Number of items eligible for pop. Checked-out items are not counted
    /// until they are returned.
    pub fn count(&self) -> u64 {
        self.state.lock().count()
    }

    /// Wait up to `wait_ms` milliseconds for an item to become available.
    ///
    /// The waiter takes its place in line when `wait` is called, not when the
    /// returned future is first polled, and waiters are woken strictly in
    /// that order. Resolves `Ok(())` once an item is available and
    /// `Err(Timeout)` when the deadline passes first; each waiter resolves
    /// exactly once. Dropping the future abandons the place in line.
    ///
    /// A successful wait promises the item to this consumer until its next
    /// [`pop_open`](Self::pop_open); follow up with one.
    pub fn wait(&self, wait_ms: u64) -> impl Future<Output = Result<(), QueueError>> + '_ {
        enum Arm {
            Ready,
            Expired,
            Parked(u64, oneshot::Receiver<()>),
        }

        let arm = {
            let mut state = self.state.lock();
            if state.count() > state.wakes_pending {
                Arm::Ready
            } else if wait_ms == 0 {
                Arm::Expired
            } else {
                let token = state.next_waiter_token;
                state.next_waiter_token += 1;
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(Waiter { token, tx });
                trace!(token, wait_ms, "parked waiter");
                Arm::Parked(token, rx)
            }
        };

        async move {
            match arm {
                Arm::Ready => Ok(()),
                Arm::Expired => {
                    self.counters.wait_timeouts.fetch_add(1, Ordering::Relaxed);
                    Err(QueueError::Timeout)
                }
                Arm::Parked(token, rx) => {
                    match tokio::time::timeout(Duration::from_millis(wait_ms), rx).await {
                        Ok(Ok(())) => Ok(()),
                        // The queue went away while we were parked.
                        Ok(Err(_)) => Err(QueueError::Timeout),
                        Err(_) => {
                            let mut state = self.state.lock();
                            match state.waiters.iter().position(|w| w.token == token) {
                                Some(at) => {
                                    let _ = state.waiters.remove(at);
                                    self.counters.wait_timeouts.fetch_add(1, Ordering::Relaxed);
                                    trace!(token, "waiter timed out");
                                    Err(QueueError::Timeout)
                                }
                                // A wake slipped in right at the deadline;
                                // honor it.
                                None => Ok(()),
                            }
                        }
                    }
                }
            }
        }
    }

    /// Snapshot the queue's gauges and counters.
    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            items: state.count(),
            bytes: state.queue_bytes,
            waiters: state.waiters.len() as u64,
            open_transactions: state.items_open,
            total_pushed: self.counters.total_pushed.load(Ordering::Relaxed),
            total_popped: self.counters.total_popped.load(Ordering::Relaxed),
            wait_timeouts: self.counters.wait_timeouts.load(Ordering::Relaxed),
        }
    }

    /// Append this queue's stats as `STAT queue_<name>_<field> <value>`
    /// lines.
    pub fn write_stats(&self, name: &str, out: &mut String) {
        let stats = self.stats();
        let fields = [
            ("items", stats.items),
            ("bytes", stats.bytes),
            ("waiters", stats.waiters),
            ("open_transactions", stats.open_transactions),
            ("total_items", stats.total_pushed),
            ("total_pops", stats.total_popped),
            ("wait_timeouts", stats.wait_timeouts),
        ];
        for (field, value) in fields {
            let _ = writeln!(out, "STAT queue_{name}_{field} {value}");
        }
    }

    /// Hand the newly available item to the oldest waiter still listening.
    /// Every availability event adds exactly one item, so at most one waiter
    /// is woken per call; waiters whose futures were dropped are discarded
    /// along the way.
    fn spin_waiters(&self, state: &mut State) {
        while state.count() > state.wakes_pending {
            let Some(waiter) = state.waiters.pop_front() else {
                break;
            };
            if waiter.tx.send(()).is_ok() {
                state.wakes_pending += 1;
                trace!(token = waiter.token, "woke waiter");
                break;
            }
        }
    }
}
