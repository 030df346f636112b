//! # Fan-in Closure
//!
//! Tracks, per round, which input ports have closed their bag, and reports the
//! moment the last one does. This is how termination propagates through a graph
//! without a barrier: an operator closes its output bag for round `r` only after
//! every input closed round `r`, and its downstream operators do the same.
//!
//! [`FanIn`] takes `&self` and keeps its tally behind one mutex, so ports
//! delivered from different threads may report closes concurrently. Exactly one
//! caller observes [`FanInOutcome::Complete`] for each round, whatever the
//! interleaving.

use crate::bag::PortRef;
use crate::error::BagError;
use crate::port::InputId;
use crate::round::Round;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

/// Result of recording one close.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FanInOutcome {
  /// Other inputs still have round `round` open or unopened.
  Pending {
    /// The round the close belonged to.
    round: Round,
    /// Inputs that have not closed this round yet.
    remaining: usize,
  },
  /// This close was the last one for `round`.
  Complete {
    /// The completed round.
    round: Round,
  },
}

impl FanInOutcome {
  /// Returns the round if this outcome completed it.
  pub fn completed(self) -> Option<Round> {
    match self {
      FanInOutcome::Complete { round } => Some(round),
      FanInOutcome::Pending { .. } => None,
    }
  }
}

#[derive(Debug)]
struct Tally {
  // inputs that closed each in-flight round
  rounds: BTreeMap<Round, Vec<bool>>,
  last_closed: Vec<Option<Round>>,
}

/// Per-round countdown over an operator's input ports.
#[derive(Debug)]
pub struct FanIn {
  operator: Arc<str>,
  inputs: usize,
  tally: Mutex<Tally>,
}

impl FanIn {
  /// Creates a tracker for `inputs` ports.
  pub fn new(operator: &Arc<str>, inputs: usize) -> Self {
    Self {
      operator: Arc::clone(operator),
      inputs,
      tally: Mutex::new(Tally {
        rounds: BTreeMap::new(),
        last_closed: vec![None; inputs],
      }),
    }
  }

  /// Number of tracked inputs.
  pub fn inputs(&self) -> usize {
    self.inputs
  }

  /// Records that `input` closed its bag for `round`.
  ///
  /// Each input must close its rounds in order, once each; anything else is a
  /// protocol violation.
  pub fn record_close(&self, input: InputId, round: Round) -> Result<FanInOutcome, BagError> {
    let port = Some(PortRef::Input(input));
    if input >= self.inputs {
      return Err(BagError::protocol(
        &self.operator,
        port,
        format!("close from unknown input (operator has {})", self.inputs),
      ));
    }

    let mut tally = self.tally.lock().unwrap_or_else(PoisonError::into_inner);
    let expected = Round::following(tally.last_closed[input]);
    if round != expected {
      return Err(BagError::protocol(
        &self.operator,
        port,
        format!("close for {round}, expected {expected}"),
      ));
    }
    tally.last_closed[input] = Some(round);

    let closed = tally
      .rounds
      .entry(round)
      .or_insert_with(|| vec![false; self.inputs]);
    closed[input] = true;
    let remaining = closed.iter().filter(|c| !**c).count();

    if remaining == 0 {
      tally.rounds.remove(&round);
      trace!(operator = %self.operator, input, round = %round, "fan-in complete");
      Ok(FanInOutcome::Complete { round })
    } else {
      trace!(operator = %self.operator, input, round = %round, remaining, "fan-in pending");
      Ok(FanInOutcome::Pending { round, remaining })
    }
  }

  /// Lowest round that some, but not all, inputs have closed.
  pub fn in_flight(&self) -> Option<Round> {
    let tally = self.tally.lock().unwrap_or_else(PoisonError::into_inner);
    tally.rounds.keys().next().copied()
  }

  /// Inputs that have not yet closed `round`.
  pub fn remaining(&self, round: Round) -> usize {
    let tally = self.tally.lock().unwrap_or_else(PoisonError::into_inner);
    match tally.rounds.get(&round) {
      Some(closed) => closed.iter().filter(|c| !**c).count(),
      None => {
        let done = tally
          .last_closed
          .iter()
          .all(|last| last.is_some_and(|r| r >= round));
        if done { 0 } else { self.inputs }
      }
    }
  }
}
