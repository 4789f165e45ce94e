use std::sync::Arc;

use hopper::{Queue, QueueConfig, QueueError, QueueReader, QueueWriter};
use tempfile::TempDir;

fn open_queue(dir: &TempDir) -> Arc<Queue> {
    Arc::new(Queue::open(dir.path().join("queue")).unwrap())
}

#[test]
fn single_chunk_roundtrip() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);

    let value: &[u8] = b"I hate when I'm on a flight and I wake up with a water bottle next \
                         to me like oh great now I gotta be responsible for this water bottle";

    let mut writer = QueueWriter::new(Arc::clone(&queue), 1);
    writer.write(value).unwrap();
    assert_eq!(writer.id(), Some(0));

    let mut reader = QueueReader::new(Arc::clone(&queue));
    let piece = reader.read().unwrap().unwrap();
    assert_eq!(&piece[..], value);
    assert_eq!(reader.size(), value.len() as u64);
    assert!(reader.read().unwrap().is_none());
    reader.close(true).unwrap();

    assert_eq!(queue.count(), 0);
}

#[test]
fn read_on_empty_queue_yields_nothing() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);

    let mut reader = QueueReader::new(queue);
    assert!(reader.read().unwrap().is_none());
}

#[test]
fn multi_chunk_item_is_invisible_until_complete() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);

    let value1: &[u8] = b"I don't ever watch dramas on a plane";
    let value2: &[u8] = b"I make awesome decisions in bike stores!!!";

    let mut writer = QueueWriter::new(Arc::clone(&queue), 2);
    writer.write(value1).unwrap();

    // Not ready yet...
    assert_eq!(queue.count(), 0);
    assert_eq!(writer.tell(), value1.len() as u64);

    writer.write(value2).unwrap();
    // ...okay, it's done.
    assert_eq!(queue.count(), 1);
    assert_eq!(writer.tell(), (value1.len() + value2.len()) as u64);
    assert_eq!(queue.stats().bytes, (value1.len() + value2.len()) as u64);

    let mut reader = QueueReader::new(Arc::clone(&queue));
    let first = reader.read().unwrap().unwrap();
    assert_eq!(queue.count(), 0);
    assert_eq!(&first[..], value1);
    assert_eq!(reader.tell(), value1.len() as u64);
    assert_eq!(reader.size(), (value1.len() + value2.len()) as u64);

    let second = reader.read().unwrap().unwrap();
    assert_eq!(&second[..], value2);
    assert_eq!(reader.tell(), (value1.len() + value2.len()) as u64);
    assert!(reader.read().unwrap().is_none());

    reader.close(true).unwrap();

    let mut after = QueueReader::new(queue);
    assert!(after.read().unwrap().is_none());
}

#[test]
fn writing_past_the_reserved_range_fails() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);

    let mut writer = QueueWriter::new(queue, 1);
    writer.write(b"only one").unwrap();

    let err = writer.write(b"one too many").unwrap_err();
    assert!(matches!(err, QueueError::ChunkRangeExhausted));
}

#[test]
fn cancel_erases_written_chunks() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);

    let value: &[u8] = b"I ordered the salmon medium instead of medium well";
    let mut writer = QueueWriter::new(Arc::clone(&queue), 2);
    writer.write(value).unwrap();
    assert_eq!(writer.tell(), value.len() as u64);

    writer.cancel().unwrap();
    assert_eq!(writer.tell(), 0);
    assert_eq!(queue.count(), 0);

    // The first reserved chunk id on a fresh queue is 0; its record is gone.
    assert!(matches!(queue.read_chunk(0), Err(QueueError::NotFound)));
}

#[test]
fn cancel_after_completion_fails() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);

    let mut writer = QueueWriter::new(queue, 1);
    writer.write(b"done").unwrap();

    assert!(matches!(writer.cancel(), Err(QueueError::AlreadyPushed)));
}

#[test]
fn values_with_nul_bytes_roundtrip() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);

    let value = b"I'm sorry Taylor.\0".to_vec();
    let mut writer = QueueWriter::new(Arc::clone(&queue), 1);
    writer.write(&value).unwrap();

    let mut reader = QueueReader::new(queue);
    let piece = reader.read().unwrap().unwrap();
    assert_eq!(&piece[..], &value[..]);
    reader.close(true).unwrap();
}

#[test]
fn chunked_item_end_to_end() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);

    let mut header = queue.reserve_chunks(3);
    assert_eq!((header.beg, header.end), (0, 3));

    queue.write_chunk(b"AAA", 0).unwrap();
    queue.write_chunk(b"BBB", 1).unwrap();
    queue.write_chunk(b"CCC", 2).unwrap();
    header.size = 9;

    assert_eq!(queue.push_header(&header).unwrap(), 0);

    let item = queue.pop_open().unwrap().unwrap();
    assert_eq!(item.id, 0);
    let got = item.header.unwrap();
    assert_eq!(got, header);
    assert!(item.value.is_empty());

    let mut payload = Vec::new();
    for chunk_key in got.beg..got.end {
        payload.extend_from_slice(&queue.read_chunk(chunk_key).unwrap());
    }
    assert_eq!(payload, b"AAABBBCCC");

    queue.pop_close(true, item.id, Some(&got)).unwrap();

    // The chunk range is gone with the item.
    for chunk_key in got.beg..got.end {
        assert!(matches!(
            queue.read_chunk(chunk_key),
            Err(QueueError::NotFound)
        ));
    }
}

#[test]
fn returned_chunked_item_comes_back_whole() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);

    let mut writer = QueueWriter::new(Arc::clone(&queue), 2);
    writer.write(b"left").unwrap();
    writer.write(b"right").unwrap();

    let mut reader = QueueReader::new(Arc::clone(&queue));
    let first = reader.read().unwrap().unwrap();
    assert_eq!(&first[..], b"left");
    reader.close(false).unwrap();

    let mut again = QueueReader::new(queue);
    let mut payload = Vec::new();
    while let Some(piece) = again.read().unwrap() {
        payload.extend_from_slice(&piece);
    }
    assert_eq!(payload, b"leftright");
    again.close(true).unwrap();
}

#[test]
fn oversized_chunks_are_rejected() {
    let dir = TempDir::new().unwrap();
    let config = QueueConfig {
        max_chunk_size: 4,
        ..QueueConfig::default()
    };
    let queue = Queue::open_with_config(dir.path().join("queue"), config).unwrap();

    queue.reserve_chunks(1);
    let err = queue.write_chunk(b"12345", 0).unwrap_err();
    assert!(matches!(err, QueueError::ChunkTooLarge { got: 5, cap: 4 }));
    queue.write_chunk(b"1234", 0).unwrap();
}
