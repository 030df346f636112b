//! Per-round one-to-many transformation.

use crate::error::BagError;
use crate::operator::{Operator, OperatorCore};
use crate::output::RoundPolicy;
use crate::port::{InputId, PortSpec};
use crate::round::Round;
use std::marker::PhantomData;

/// Expands every record into zero or more output records of the same round.
pub struct FlatMap<I, O, F> {
  core: OperatorCore<O>,
  f: F,
  _marker: PhantomData<fn(I)>,
}

impl<I, O, It, F> FlatMap<I, O, F>
where
  I: Send + 'static,
  O: Clone + Send + 'static,
  It: IntoIterator<Item = O>,
  F: FnMut(I) -> It + Send + 'static,
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

impl<I, O, It, F> Operator for FlatMap<I, O, F>
where
  I: Send + 'static,
  O: Clone + Send + 'static,
  It: IntoIterator<Item = O>,
  F: FnMut(I) -> It + Send + 'static,
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
    for item in (self.f)(record) {
      self.core.out_mut().append(item)?;
    }
    Ok(())
  }
}
