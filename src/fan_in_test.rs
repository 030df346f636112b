//! Tests for fan-in closure counting.

use crate::error::BagError;
use crate::fan_in::{FanIn, FanInOutcome};
use crate::round::Round;
use std::sync::{Arc, Barrier};
use std::thread;

fn fan_in(n: usize) -> FanIn {
  FanIn::new(&Arc::from("join"), n)
}

/// All orderings of `0..n`.
fn permutations(n: usize) -> Vec<Vec<usize>> {
  if n == 0 {
    return vec![Vec::new()];
  }
  let mut out = Vec::new();
  for rest in permutations(n - 1) {
    for pos in 0..=rest.len() {
      let mut p = rest.clone();
      p.insert(pos, n - 1);
      out.push(p);
    }
  }
  out
}

#[test]
fn test_single_input_completes_immediately() {
  let fan_in = fan_in(1);
  assert_eq!(
    fan_in.record_close(0, Round::FIRST).unwrap(),
    FanInOutcome::Complete { round: Round::FIRST }
  );
}

#[test]
fn test_completes_once_under_every_order() {
  for order in permutations(4) {
    let fan_in = fan_in(4);
    let mut completions = 0;
    for (i, &input) in order.iter().enumerate() {
      match fan_in.record_close(input, Round::FIRST).unwrap() {
        FanInOutcome::Complete { round } => {
          assert_eq!(round, Round::FIRST);
          assert_eq!(i, 3, "completed early for order {order:?}");
          completions += 1;
        }
        FanInOutcome::Pending { remaining, .. } => assert_eq!(remaining, 3 - i),
      }
    }
    assert_eq!(completions, 1);
  }
}

#[test]
fn test_rounds_are_tracked_separately() {
  let fan_in = fan_in(2);
  assert!(fan_in.record_close(0, Round(0)).unwrap().completed().is_none());
  assert!(fan_in.record_close(0, Round(1)).unwrap().completed().is_none());
  assert_eq!(fan_in.in_flight(), Some(Round(0)));
  assert_eq!(fan_in.remaining(Round(1)), 1);

  assert_eq!(fan_in.record_close(1, Round(0)).unwrap().completed(), Some(Round(0)));
  assert_eq!(fan_in.remaining(Round(0)), 0);
  assert_eq!(fan_in.record_close(1, Round(1)).unwrap().completed(), Some(Round(1)));
  assert_eq!(fan_in.in_flight(), None);
  assert_eq!(fan_in.remaining(Round(2)), 2);
}

#[test]
fn test_duplicate_close_is_protocol_violation() {
  let fan_in = fan_in(2);
  fan_in.record_close(0, Round::FIRST).unwrap();
  assert!(matches!(
    fan_in.record_close(0, Round::FIRST),
    Err(BagError::ProtocolViolation { .. })
  ));
}

#[test]
fn test_skipped_round_is_protocol_violation() {
  let fan_in = fan_in(2);
  assert!(fan_in.record_close(1, Round(1)).is_err());
}

#[test]
fn test_unknown_input_is_protocol_violation() {
  let fan_in = fan_in(2);
  assert!(matches!(
    fan_in.record_close(2, Round::FIRST),
    Err(BagError::ProtocolViolation { .. })
  ));
}

#[test]
fn test_concurrent_closes_complete_exactly_once() {
  const INPUTS: usize = 8;
  const ROUNDS: u64 = 50;
  for _ in 0..20 {
    let fan_in = Arc::new(fan_in(INPUTS));
    let barrier = Arc::new(Barrier::new(INPUTS));
    let handles: Vec<_> = (0..INPUTS)
      .map(|input| {
        let fan_in = Arc::clone(&fan_in);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
          barrier.wait();
          let mut completed = Vec::new();
          for r in 0..ROUNDS {
            if let Some(round) = fan_in.record_close(input, Round(r)).unwrap().completed() {
              completed.push(round);
            }
          }
          completed
        })
      })
      .collect();

    let mut all: Vec<Round> = handles
      .into_iter()
      .flat_map(|h| h.join().unwrap())
      .collect();
    all.sort();
    assert_eq!(all, (0..ROUNDS).map(Round).collect::<Vec<_>>());
  }
}
