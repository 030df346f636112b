//! Tests for round numbers.

use crate::round::Round;

#[test]
fn test_first_and_next() {
  assert_eq!(Round::FIRST, Round::new(0));
  assert_eq!(Round::FIRST.next(), Round(1));
  assert_eq!(Round(41).next().as_u64(), 42);
}

#[test]
fn test_following() {
  assert_eq!(Round::following(None), Round::FIRST);
  assert_eq!(Round::following(Some(Round(3))), Round(4));
}

#[test]
fn test_ordering_and_display() {
  assert!(Round(1) < Round(2));
  assert_eq!(Round::from(7).to_string(), "r7");
  let mut rounds = vec![Round(3), Round(0), Round(2)];
  rounds.sort();
  assert_eq!(rounds, vec![Round(0), Round(2), Round(3)]);
}
