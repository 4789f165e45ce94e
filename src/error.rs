use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("journal error: {0}")]
    Journal(#[from] rocksdb::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for an item")]
    Timeout,

    #[error("no such record")]
    NotFound,

    #[error("journal corruption: {0}")]
    Corruption(String),

    #[error("write past the reserved chunk range")]
    ChunkRangeExhausted,

    #[error("item was already pushed")]
    AlreadyPushed,

    #[error("chunk of {got} bytes exceeds the configured cap of {cap}")]
    ChunkTooLarge { got: usize, cap: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
