//! Sink that materializes every input round into a sealed buffer.

use crate::bag::{Bag, PortRef};
use crate::buffer::{BufferWriter, SealedBuffer};
use crate::config::BufferConfig;
use crate::error::{BagError, BufferError};
use crate::operator::{Operator, OperatorCore};
use crate::output::RoundPolicy;
use crate::port::{InputId, PortSpec};
use crate::round::Round;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Shared handle to the rounds a [`Collect`] sink has sealed.
///
/// Clone it before handing the sink to a graph; the clone sees every round as
/// soon as its bag closes.
pub struct Collected<T> {
  rounds: Arc<Mutex<BTreeMap<Round, SealedBuffer<T>>>>,
}

impl<T> Clone for Collected<T> {
  fn clone(&self) -> Self {
    Self {
      rounds: Arc::clone(&self.rounds),
    }
  }
}

impl<T> Collected<T> {
  fn new() -> Self {
    Self {
      rounds: Arc::new(Mutex::new(BTreeMap::new())),
    }
  }

  fn insert(&self, round: Round, buffer: SealedBuffer<T>) {
    self.rounds
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(round, buffer);
  }

  /// Rounds collected so far, ascending.
  pub fn rounds(&self) -> Vec<Round> {
    self.rounds
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .keys()
      .copied()
      .collect()
  }

  /// The sealed buffer of `round`, if that round has closed.
  pub fn get(&self, round: Round) -> Option<SealedBuffer<T>> {
    self.rounds
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&round)
      .cloned()
  }

  /// Number of collected rounds.
  pub fn len(&self) -> usize {
    self.rounds.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Returns `true` if no round has closed yet.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<T: DeserializeOwned> Collected<T> {
  /// Decodes the records of `round`; empty if the round was never collected.
  pub fn records(&self, round: Round) -> Result<Vec<T>, BufferError> {
    match self.get(round) {
      Some(buffer) => buffer.to_vec(),
      None => Ok(Vec::new()),
    }
  }
}

/// Sink with one multi-round input.
///
/// Each input bag is written into a [`BufferWriter`] (spilling per
/// [`BufferConfig`]) and sealed into [`Collected`] when it closes.
pub struct Collect<T> {
  core: OperatorCore<()>,
  config: BufferConfig,
  bag: Option<Bag<T, BufferWriter<T>>>,
  collected: Collected<T>,
}

impl<T> Collect<T>
where
  T: Serialize + Send + 'static,
{
  /// Creates the sink; buffers use `config`.
  pub fn new(name: &str, config: BufferConfig) -> Self {
    Self {
      core: OperatorCore::new(name, vec![PortSpec::multi()], RoundPolicy::None),
      config,
      bag: None,
      collected: Collected::new(),
    }
  }

  /// Handle through which collected rounds can be read.
  pub fn collected(&self) -> Collected<T> {
    self.collected.clone()
  }
}

impl<T> Operator for Collect<T>
where
  T: Serialize + Send + 'static,
{
  type In = T;
  type Out = ();

  fn core(&self) -> &OperatorCore<()> {
    &self.core
  }

  fn core_mut(&mut self) -> &mut OperatorCore<()> {
    &mut self.core
  }

  fn open_in_bag(&mut self, input: InputId, round: Round) -> Result<(), BagError> {
    self.core.open_in(input, round)?;
    let mut bag = Bag::buffered(self.core.name(), PortRef::Input(input), self.config.clone())
      .starting_at(round);
    bag.open(round)?;
    self.bag = Some(bag);
    Ok(())
  }

  fn push_in_element(&mut self, input: InputId, record: T) -> Result<(), BagError> {
    match self.bag.as_mut() {
      Some(bag) => bag.append(record),
      None => Err(BagError::protocol(
        self.core.name(),
        Some(PortRef::Input(input)),
        "record without an open collection bag",
      )),
    }
  }

  fn close_in_bag(&mut self, input: InputId) -> Result<(), BagError> {
    self.core.forward_close(input)?;
    let Some(mut bag) = self.bag.take() else {
      return Err(BagError::protocol(
        self.core.name(),
        Some(PortRef::Input(input)),
        "close without an open collection bag",
      ));
    };
    let round = bag.close()?;
    let spilled = bag.is_spilled();
    let sealed = bag.seal()?;
    debug!(
      operator = %self.core.name(),
      round = %round,
      records = sealed.len(),
      spilled,
      "collected round"
    );
    self.collected.insert(round, sealed);
    Ok(())
  }
}
