//! Tests for the per-round `Union`.

use crate::bag::BagEvent;
use crate::error::BagError;
use crate::operator::{Operator, dispatch, finish};
use crate::operators::Union;
use crate::output::EventLog;
use crate::port::InputId;
use crate::round::Round;

fn union(inputs: usize) -> (Union<u32>, EventLog<u32>) {
  let mut op = Union::new("union", inputs);
  let log = EventLog::new();
  op.core_mut().out_mut().subscribe(Box::new(log.clone()));
  (op, log)
}

fn send(op: &mut Union<u32>, input: InputId, event: BagEvent<u32>) {
  dispatch(op, input, event).unwrap();
}

fn bag(op: &mut Union<u32>, input: InputId, round: u64, records: &[u32]) {
  send(op, input, BagEvent::Open(Round(round)));
  for &r in records {
    send(op, input, BagEvent::Record(r));
  }
  send(op, input, BagEvent::Close(Round(round)));
}

#[test]
fn test_lockstep_rounds() {
  let (mut op, log) = union(2);
  for r in 0..3 {
    bag(&mut op, 0, r, &[r as u32 * 10]);
    bag(&mut op, 1, r, &[r as u32 * 10 + 1]);
  }
  assert_eq!(
    log.rounds(),
    vec![
      (Round(0), vec![0, 1]),
      (Round(1), vec![10, 11]),
      (Round(2), vec![20, 21]),
    ]
  );
  assert_eq!(log.closes(), 3);
  finish(&op).unwrap();
}

#[test]
fn test_input_running_ahead_is_buffered() {
  let (mut op, log) = union(2);
  // input 0 delivers three whole rounds before input 1 starts
  bag(&mut op, 0, 0, &[1]);
  bag(&mut op, 0, 1, &[2, 3]);
  bag(&mut op, 0, 2, &[]);
  assert_eq!(op.pending_rounds(), vec![Round(1), Round(2)]);
  assert_eq!(log.closes(), 0);

  bag(&mut op, 1, 0, &[100]);
  assert_eq!(log.closes(), 1);
  bag(&mut op, 1, 1, &[200]);
  bag(&mut op, 1, 2, &[300]);

  assert_eq!(
    log.rounds(),
    vec![
      (Round(0), vec![1, 100]),
      (Round(1), vec![2, 3, 200]),
      (Round(2), vec![300]),
    ]
  );
  assert!(op.pending_rounds().is_empty());
  finish(&op).unwrap();
}

#[test]
fn test_output_closes_after_all_records_of_round() {
  let (mut op, log) = union(3);
  send(&mut op, 2, BagEvent::Open(Round(0)));
  send(&mut op, 0, BagEvent::Open(Round(0)));
  send(&mut op, 0, BagEvent::Record(1));
  send(&mut op, 0, BagEvent::Close(Round(0)));
  send(&mut op, 2, BagEvent::Record(3));
  send(&mut op, 1, BagEvent::Open(Round(0)));
  send(&mut op, 2, BagEvent::Close(Round(0)));
  send(&mut op, 1, BagEvent::Record(2));
  assert_eq!(log.closes(), 0);
  send(&mut op, 1, BagEvent::Close(Round(0)));

  let events = log.events();
  assert_eq!(events.last(), Some(&BagEvent::Close(Round(0))));
  let mut records = log.records();
  records.sort();
  assert_eq!(records, vec![1, 2, 3]);
  assert_eq!(log.closes(), 1);
}

#[test]
fn test_ahead_round_open_while_current_still_open() {
  let (mut op, log) = union(2);
  send(&mut op, 0, BagEvent::Open(Round(0)));
  send(&mut op, 1, BagEvent::Open(Round(0)));
  send(&mut op, 1, BagEvent::Close(Round(0)));
  // input 1 moves to round 1 while input 0 is mid round 0
  send(&mut op, 1, BagEvent::Open(Round(1)));
  send(&mut op, 1, BagEvent::Record(11));
  send(&mut op, 0, BagEvent::Record(1));
  send(&mut op, 0, BagEvent::Close(Round(0)));
  // round 1 is now current; its buffered record was flushed
  send(&mut op, 1, BagEvent::Record(12));
  send(&mut op, 0, BagEvent::Open(Round(1)));
  send(&mut op, 0, BagEvent::Close(Round(1)));
  send(&mut op, 1, BagEvent::Close(Round(1)));

  assert_eq!(
    log.rounds(),
    vec![(Round(0), vec![1]), (Round(1), vec![11, 12])]
  );
  assert_eq!(log.opens(), 2);
  assert_eq!(log.closes(), 2);
}

#[test]
fn test_end_with_partial_round_fails_finish() {
  let (mut op, _log) = union(2);
  bag(&mut op, 0, 0, &[1]);
  assert!(matches!(finish(&op), Err(BagError::ProtocolViolation { .. })));
}

#[test]
fn test_duplicate_close_fails() {
  let (mut op, _log) = union(2);
  bag(&mut op, 0, 0, &[]);
  assert!(dispatch(&mut op, 0, BagEvent::Close(Round(0))).is_err());
}
