//! Singleton operator that turns one upstream bag into one empty output bag.

use crate::error::BagError;
use crate::operator::{Operator, OperatorCore};
use crate::output::RoundPolicy;
use crate::port::{InputId, PortSpec};
use crate::round::Round;
use std::marker::PhantomData;
use tracing::trace;

/// Opens its single output bag when its one input opens, closes it when the
/// input closes, and emits nothing in between.
///
/// The operator has exactly one single-bag input of `()`; there is no way to
/// build it with more, so its close always completes the fan-in.
pub struct FromNothing<T> {
  core: OperatorCore<T>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + 'static> FromNothing<T> {
  /// Creates the operator.
  pub fn new(name: &str) -> Self {
    Self {
      core: OperatorCore::new(name, vec![PortSpec::single()], RoundPolicy::Singleton),
      _marker: PhantomData,
    }
  }
}

impl<T: Clone + Send + 'static> Operator for FromNothing<T> {
  type In = ();
  type Out = T;

  fn core(&self) -> &OperatorCore<T> {
    &self.core
  }

  fn core_mut(&mut self) -> &mut OperatorCore<T> {
    &mut self.core
  }

  fn open_in_bag(&mut self, input: InputId, round: Round) -> Result<(), BagError> {
    self.core.open_in(input, round)?;
    self.open_out_bag()?;
    Ok(())
  }

  fn push_in_element(&mut self, input: InputId, _record: ()) -> Result<(), BagError> {
    trace!(operator = %self.core.name(), input, "ignoring unit record");
    Ok(())
  }
}
