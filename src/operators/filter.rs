//! Per-round predicate filter.

use crate::error::BagError;
use crate::operator::{Operator, OperatorCore};
use crate::output::RoundPolicy;
use crate::port::{InputId, PortSpec};
use crate::round::Round;

/// Forwards the records for which `predicate` holds. Empty rounds still produce
/// an (empty) output bag.
pub struct Filter<T, F> {
  core: OperatorCore<T>,
  predicate: F,
}

impl<T, F> Filter<T, F>
where
  T: Clone + Send + 'static,
  F: FnMut(&T) -> bool + Send + 'static,
{
  /// Creates the operator.
  pub fn new(name: &str, predicate: F) -> Self {
    Self {
      core: OperatorCore::new(name, vec![PortSpec::multi()], RoundPolicy::PerRound),
      predicate,
    }
  }
}

impl<T, F> Operator for Filter<T, F>
where
  T: Clone + Send + 'static,
  F: FnMut(&T) -> bool + Send + 'static,
{
  type In = T;
  type Out = T;

  fn core(&self) -> &OperatorCore<T> {
    &self.core
  }

  fn core_mut(&mut self) -> &mut OperatorCore<T> {
    &mut self.core
  }

  fn open_in_bag(&mut self, input: InputId, round: Round) -> Result<(), BagError> {
    self.core.forward_open(input, round)
  }

  fn push_in_element(&mut self, _input: InputId, record: T) -> Result<(), BagError> {
    if (self.predicate)(&record) {
      self.core.out_mut().append(record)?;
    }
    Ok(())
  }
}
