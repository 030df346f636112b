//! Tests for the `FromNothing` singleton.

use crate::bag::{BagEvent, BagState};
use crate::error::BagError;
use crate::operator::{Operator, OperatorKind, dispatch, finish};
use crate::operators::FromNothing;
use crate::output::EventLog;
use crate::round::Round;

fn from_nothing() -> (FromNothing<String>, EventLog<String>) {
  let mut op = FromNothing::new("nothing");
  let log = EventLog::new();
  op.core_mut().out_mut().subscribe(Box::new(log.clone()));
  (op, log)
}

#[test]
fn test_one_input_by_construction() {
  let (op, _log) = from_nothing();
  assert_eq!(op.core().inputs().len(), 1);
  assert_eq!(op.core().kind(), OperatorKind::Singleton);
}

#[test]
fn test_mirrors_input_bag_with_empty_output() {
  let (mut op, log) = from_nothing();
  dispatch(&mut op, 0, BagEvent::Open(Round::FIRST)).unwrap();
  assert_eq!(op.core().out().state(), BagState::Open);
  dispatch(&mut op, 0, BagEvent::Record(())).unwrap();
  dispatch(&mut op, 0, BagEvent::Close(Round::FIRST)).unwrap();

  assert_eq!(
    log.events(),
    vec![BagEvent::Open(Round::FIRST), BagEvent::Close(Round::FIRST)]
  );
  assert_eq!(op.core().out().bags_closed(), 1);
  finish(&op).unwrap();
}

#[test]
fn test_second_input_bag_rejected() {
  let (mut op, log) = from_nothing();
  dispatch(&mut op, 0, BagEvent::Open(Round::FIRST)).unwrap();
  dispatch(&mut op, 0, BagEvent::Close(Round::FIRST)).unwrap();
  assert!(matches!(
    dispatch(&mut op, 0, BagEvent::Open(Round(1))),
    Err(BagError::InvalidState { .. })
  ));
  assert_eq!(log.closes(), 1);
}

#[test]
fn test_second_input_port_does_not_exist() {
  let (mut op, _log) = from_nothing();
  assert!(matches!(
    dispatch(&mut op, 1, BagEvent::Open(Round::FIRST)),
    Err(BagError::ProtocolViolation { .. })
  ));
}
