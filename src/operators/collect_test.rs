//! Tests for the `Collect` sink.

use crate::bag::BagEvent;
use crate::config::BufferConfig;
use crate::error::BagError;
use crate::operator::{Operator, OperatorKind, dispatch, finish};
use crate::operators::Collect;
use crate::round::Round;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Rank {
  vertex: u32,
  score: f64,
}

#[test]
fn test_collects_each_round() {
  let mut op = Collect::new("ranks", BufferConfig::default());
  let collected = op.collected();
  assert_eq!(op.core().kind(), OperatorKind::Sink);

  for r in 0..2u64 {
    dispatch(&mut op, 0, BagEvent::Open(Round(r))).unwrap();
    for vertex in 0..3 {
      let rank = Rank {
        vertex,
        score: r as f64 * 10.0 + f64::from(vertex),
      };
      dispatch(&mut op, 0, BagEvent::Record(rank)).unwrap();
    }
    assert_eq!(collected.len(), r as usize);
    dispatch(&mut op, 0, BagEvent::Close(Round(r))).unwrap();
  }

  assert_eq!(collected.rounds(), vec![Round(0), Round(1)]);
  let second = collected.records(Round(1)).unwrap();
  assert_eq!(second.len(), 3);
  assert_eq!(second[2], Rank { vertex: 2, score: 12.0 });
  assert!(collected.records(Round(7)).unwrap().is_empty());
  assert_eq!(op.core().out().bags_closed(), 0);
  finish(&op).unwrap();
}

#[test]
fn test_large_round_spills() {
  let dir = TempDir::new().unwrap();
  let mut op = Collect::new("big", BufferConfig::new(1024).with_spill_dir(dir.path()));
  let collected = op.collected();

  dispatch(&mut op, 0, BagEvent::Open(Round::FIRST)).unwrap();
  for i in 0..10_000u64 {
    dispatch(&mut op, 0, BagEvent::Record(i)).unwrap();
  }
  dispatch(&mut op, 0, BagEvent::Close(Round::FIRST)).unwrap();

  let sealed = collected.get(Round::FIRST).unwrap();
  assert!(sealed.is_spilled());
  assert_eq!(sealed.to_vec().unwrap(), (0..10_000).collect::<Vec<_>>());
  // restartable
  assert_eq!(sealed.reader().unwrap().count(), 10_000);
}

#[test]
fn test_sink_never_opens_output() {
  let mut op: Collect<u8> = Collect::new("sink", BufferConfig::default());
  assert!(matches!(
    op.open_out_bag(),
    Err(BagError::ProtocolViolation { .. })
  ));
}
