//! A durable, in-process FIFO message queue.
//!
//! Items live in an embedded RocksDB journal ordered by a custom `(kind, id)`
//! comparator. Small items are stored inline; large items are streamed a
//! chunk at a time through a reserved chunk range. Consumers check items out,
//! then either remove them or return them to the queue, and can park on an
//! evented wait until a producer shows up.
//!
//! ```no_run
//! use hopper::Queue;
//!
//! # async fn demo() -> Result<(), hopper::QueueError> {
//! let queue = Queue::open("./data/jobs")?;
//! queue.push(b"hello")?;
//!
//! queue.wait(1_000).await?;
//! if let Some(item) = queue.pop_open()? {
//!     // ... process item.value ...
//!     queue.pop_close(true, item.id, item.header.as_ref())?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod queue;

pub use config::{load_config, QueueConfig};
pub use error::QueueError;
pub use queue::{Header, OpenItem, Queue, QueueReader, QueueStats, QueueWriter};
