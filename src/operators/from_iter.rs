//! Zero-input source over an iterator.

use crate::error::BagError;
use crate::operator::{Operator, OperatorCore, Step};
use crate::output::RoundPolicy;
use crate::port::InputId;
use std::convert::Infallible;
use tracing::debug;

/// Source that emits every item of an iterator into one output bag.
///
/// `start` opens the bag, each [`step`](Operator::step) appends one item, and
/// exhaustion closes it. An unbounded iterator only ends through
/// cancellation, which the driver checks between steps.
pub struct FromIter<I: Iterator> {
  core: OperatorCore<I::Item>,
  iter: I,
}

impl<I> FromIter<I>
where
  I: Iterator + Send + 'static,
  I::Item: Clone + Send + 'static,
{
  /// Creates a source over `iter`.
  pub fn new(name: &str, iter: impl IntoIterator<IntoIter = I>) -> Self {
    Self {
      core: OperatorCore::new(name, Vec::new(), RoundPolicy::Singleton),
      iter: iter.into_iter(),
    }
  }
}

impl<I> Operator for FromIter<I>
where
  I: Iterator + Send + 'static,
  I::Item: Clone + Send + 'static,
{
  type In = Infallible;
  type Out = I::Item;

  fn core(&self) -> &OperatorCore<I::Item> {
    &self.core
  }

  fn core_mut(&mut self) -> &mut OperatorCore<I::Item> {
    &mut self.core
  }

  fn start(&mut self) -> Result<(), BagError> {
    self.open_out_bag()?;
    Ok(())
  }

  fn push_in_element(&mut self, _input: InputId, record: Infallible) -> Result<(), BagError> {
    match record {}
  }

  fn step(&mut self) -> Result<Step, BagError> {
    match self.iter.next() {
      Some(item) => {
        self.core.out_mut().append(item)?;
        Ok(Step::Continue)
      }
      None => {
        self.core.out_mut().close_bag()?;
        debug!(
          operator = %self.core.name(),
          records = self.core.out().records_emitted(),
          "source exhausted"
        );
        Ok(Step::Exhausted)
      }
    }
  }
}
