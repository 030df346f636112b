//! N-input per-round union.
//!
//! Inputs are delivered independently, so one input may already be sending
//! round `r + 1` while another is still in round `r`. Records of the round the
//! output is currently assembling go straight out; records of later rounds wait
//! in a streamed [`Bag`] per round and are flushed when that round becomes
//! current. The output bag for a round closes only once every input closed it.

use crate::bag::{Bag, PortRef};
use crate::error::BagError;
use crate::fan_in::FanInOutcome;
use crate::operator::{Operator, OperatorCore};
use crate::output::RoundPolicy;
use crate::port::{InputId, PortSpec};
use crate::round::Round;
use std::collections::BTreeMap;
use tracing::debug;

/// Merges the bags of all inputs round by round.
pub struct Union<T> {
  core: OperatorCore<T>,
  current: Round,
  pending: BTreeMap<Round, Bag<T>>,
}

impl<T: Clone + Send + 'static> Union<T> {
  /// Creates a union over `inputs` ports.
  pub fn new(name: &str, inputs: usize) -> Self {
    Self {
      core: OperatorCore::new(
        name,
        vec![PortSpec::multi(); inputs],
        RoundPolicy::PerRound,
      ),
      current: Round::FIRST,
      pending: BTreeMap::new(),
    }
  }

  /// Rounds with records waiting for their turn.
  pub fn pending_rounds(&self) -> Vec<Round> {
    self.pending.keys().copied().collect()
  }

  fn open_current(&mut self) -> Result<(), BagError> {
    let opened = self.core.out_mut().open_bag()?;
    if opened != self.current {
      return Err(BagError::protocol(
        self.core.name(),
        Some(PortRef::Output),
        format!("output opened {opened} while assembling {}", self.current),
      ));
    }
    Ok(())
  }

  fn advance(&mut self) -> Result<(), BagError> {
    self.current = self.current.next();
    let Some(mut bag) = self.pending.remove(&self.current) else {
      return Ok(());
    };
    self.open_current()?;
    debug!(
      operator = %self.core.name(),
      round = %self.current,
      records = bag.len(),
      "flushing buffered round"
    );
    for record in bag.drain() {
      self.core.out_mut().append(record)?;
    }
    Ok(())
  }
}

impl<T: Clone + Send + 'static> Operator for Union<T> {
  type In = T;
  type Out = T;

  fn core(&self) -> &OperatorCore<T> {
    &self.core
  }

  fn core_mut(&mut self) -> &mut OperatorCore<T> {
    &mut self.core
  }

  fn open_in_bag(&mut self, input: InputId, round: Round) -> Result<(), BagError> {
    self.core.open_in(input, round)?;
    if round == self.current {
      if self.core.out().round() != Some(round) {
        self.open_current()?;
      }
    } else if round > self.current {
      if !self.pending.contains_key(&round) {
        let mut bag = Bag::new(self.core.name(), PortRef::Input(input)).starting_at(round);
        bag.open(round)?;
        self.pending.insert(round, bag);
      }
    } else {
      return Err(BagError::protocol(
        self.core.name(),
        Some(PortRef::Input(input)),
        format!("{round} opened after it completed"),
      ));
    }
    Ok(())
  }

  fn push_in_element(&mut self, input: InputId, record: T) -> Result<(), BagError> {
    let round = self.core.inputs().get(input)?.round().unwrap_or(Round::FIRST);
    if round == self.current {
      return self.core.out_mut().append(record);
    }
    match self.pending.get_mut(&round) {
      Some(bag) => bag.append(record),
      None => Err(BagError::protocol(
        self.core.name(),
        Some(PortRef::Input(input)),
        format!("record for {round} has nowhere to go"),
      )),
    }
  }

  fn close_in_bag(&mut self, input: InputId) -> Result<(), BagError> {
    if let FanInOutcome::Complete { round } = self.core.close_in(input)? {
      if round != self.current {
        return Err(BagError::protocol(
          self.core.name(),
          Some(PortRef::Input(input)),
          format!("{round} completed while assembling {}", self.current),
        ));
      }
      self.core.out_mut().close_bag()?;
      self.advance()?;
    }
    Ok(())
  }
}
