//! Per-round one-to-one transformation.

use crate::error::BagError;
use crate::operator::{Operator, OperatorCore};
use crate::output::RoundPolicy;
use crate::port::{InputId, PortSpec};
use crate::round::Round;
use std::marker::PhantomData;

/// Applies `f` to every record; each input bag yields one output bag of the same round.
pub struct Map<I, O, F> {
  core: OperatorCore<O>,
  f: F,
  _marker: PhantomData<fn(I)>,
}

impl<I, O, F> Map<I, O, F>
where
  I: Send + 'static,
  O: Clone + Send + 'static,
  F: FnMut(I) -> O + Send + 'static,
{
  /// Creates the operator.
  pub fn new(name: &str, f: F) -> Self {
    Self {
      core: OperatorCore::new(name, vec![PortSpec::multi()], RoundPolicy::PerRound),
      f,
      _marker: PhantomData,
    }
  }
}

impl<I, O, F> Operator for Map<I, O, F>
where
  I: Send + 'static,
  O: Clone + Send + 'static,
  F: FnMut(I) -> O + Send + 'static,
{
  type In = I;
  type Out = O;

  fn core(&self) -> &OperatorCore<O> {
    &self.core
  }

  fn core_mut(&mut self) -> &mut OperatorCore<O> {
    &mut self.core
  }

  fn open_in_bag(&mut self, input: InputId, round: Round) -> Result<(), BagError> {
    self.core.forward_open(input, round)
  }

  fn push_in_element(&mut self, _input: InputId, record: I) -> Result<(), BagError> {
    let mapped = (self.f)(record);
    self.core.out_mut().append(mapped)
  }
}
