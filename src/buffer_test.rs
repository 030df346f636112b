//! Tests for serialized buffers.

use crate::buffer::BufferWriter;
use crate::config::BufferConfig;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Edge {
  from: u32,
  to: u32,
  label: String,
}

fn edges(n: u32) -> Vec<Edge> {
  (0..n)
    .map(|i| Edge {
      from: i,
      to: i + 1,
      label: format!("e{i}"),
    })
    .collect()
}

#[test]
fn test_in_memory_round_trip_preserves_order() {
  let mut writer = BufferWriter::new(BufferConfig::default());
  for edge in edges(100) {
    writer.append(&edge).unwrap();
  }
  assert_eq!(writer.len(), 100);
  assert!(!writer.is_spilled());

  let sealed = writer.seal().unwrap();
  assert_eq!(sealed.len(), 100);
  assert_eq!(sealed.to_vec().unwrap(), edges(100));
}

#[test]
fn test_empty_buffer() {
  let writer = BufferWriter::<Edge>::new(BufferConfig::default());
  assert!(writer.is_empty());
  let sealed = writer.seal().unwrap();
  assert!(sealed.is_empty());
  assert_eq!(sealed.reader().unwrap().count(), 0);
}

#[test]
fn test_spills_past_threshold() {
  let dir = TempDir::new().unwrap();
  let config = BufferConfig::new(256).with_spill_dir(dir.path());
  let mut writer = BufferWriter::new(config);
  for edge in edges(500) {
    writer.append(&edge).unwrap();
  }
  assert!(writer.is_spilled());
  assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

  let sealed = writer.seal().unwrap();
  assert!(sealed.is_spilled());
  assert_eq!(sealed.to_vec().unwrap(), edges(500));
}

#[test]
fn test_spill_file_removed_after_last_handle() {
  let dir = TempDir::new().unwrap();
  let mut writer = BufferWriter::new(BufferConfig::new(0).with_spill_dir(dir.path()));
  writer.append(&1u64).unwrap();
  let sealed = writer.seal().unwrap();
  let reader = sealed.reader().unwrap();
  drop(sealed);
  assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
  drop(reader);
  assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_readers_are_independent_and_restartable() {
  let mut writer = BufferWriter::new(BufferConfig::new(64));
  for i in 0..50u32 {
    writer.append(&i).unwrap();
  }
  let sealed = writer.seal().unwrap();

  let mut first = sealed.reader().unwrap();
  let mut second = sealed.reader().unwrap();
  assert_eq!(first.next().unwrap().unwrap(), 0);
  assert_eq!(first.next().unwrap().unwrap(), 1);
  assert_eq!(second.next().unwrap().unwrap(), 0);

  let rest: Vec<u32> = first.map(Result::unwrap).collect();
  assert_eq!(rest, (2..50).collect::<Vec<_>>());

  let again: Vec<u32> = sealed.clone().reader().unwrap().map(Result::unwrap).collect();
  assert_eq!(again, (0..50).collect::<Vec<_>>());
}

#[test]
fn test_encoded_len_counts_frame_headers() {
  let mut writer = BufferWriter::new(BufferConfig::default());
  writer.append(&()).unwrap();
  // a unit encodes to one MessagePack byte
  assert_eq!(writer.encoded_len(), 5);
}

#[test]
fn test_appends_after_spill_keep_order() {
  let mut writer = BufferWriter::new(BufferConfig::new(12));
  let mut expected = Vec::new();
  for i in 0..10u64 {
    writer.append(&i).unwrap();
    expected.push(i);
    if i == 3 {
      assert!(writer.is_spilled());
    }
  }
  let sealed = writer.seal().unwrap();
  assert_eq!(sealed.len(), 10);
  assert_eq!(sealed.to_vec().unwrap(), expected);
}
