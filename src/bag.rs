//! # Bags
//!
//! A bag is one round of records flowing on one port: opened, filled, closed,
//! and never written again. This module holds the lifecycle state machine shared
//! by bags and ports ([`Lifecycle`]), the [`Bag`] container itself, and the
//! [`BagEvent`] unit the driver moves between operators.
//!
//! ## State machine
//!
//! ```text
//! Idle --open(r)--> Open --close()--> Closed --reset()--> Idle
//!                    |  \
//!                    |   append(x)
//! ```
//!
//! - `open` fails when the bag is `Open`, or `Closed` and not reset.
//! - `append` fails unless the bag is `Open`.
//! - `close` fails unless the bag is `Open`; a double close is always an error.
//! - rounds on one bag are consecutive: after round `r` the next open must be `r + 1`.

use crate::buffer::{BufferWriter, SealedBuffer};
use crate::config::BufferConfig;
use crate::error::{BagError, BagOp, BufferError};
use crate::port::InputId;
use crate::round::Round;
use serde::Serialize;
use std::collections::VecDeque;
use std::collections::vec_deque::Drain;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Lifecycle state of a bag or port.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum BagState {
  /// No bag is open; the next round may begin.
  #[default]
  Idle,
  /// A bag is open and accepting records.
  Open,
  /// The bag is closed and immutable.
  Closed,
}

impl fmt::Display for BagState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      BagState::Idle => "idle",
      BagState::Open => "open",
      BagState::Closed => "closed",
    };
    f.write_str(s)
  }
}

/// Which side of an operator a bag belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PortRef {
  /// An input port.
  Input(InputId),
  /// The output port.
  Output,
}

impl fmt::Display for PortRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PortRef::Input(id) => write!(f, "in{id}"),
      PortRef::Output => f.write_str("out"),
    }
  }
}

/// Identity of a bag: owning operator, port, and round.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct BagId {
  /// Operator owning the port.
  pub operator: Arc<str>,
  /// Port the bag flows on.
  pub port: PortRef,
  /// Round of the bag.
  pub round: Round,
}

impl fmt::Display for BagId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}@{}", self.operator, self.port, self.round)
  }
}

/// Event on a channel between two operators.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BagEvent<T> {
  /// A new bag begins.
  Open(Round),
  /// A record of the open bag.
  Record(T),
  /// The open bag is complete.
  Close(Round),
}

impl<T> BagEvent<T> {
  /// Returns the round for `Open` and `Close`, `None` for records.
  pub fn round(&self) -> Option<Round> {
    match self {
      BagEvent::Open(r) | BagEvent::Close(r) => Some(*r),
      BagEvent::Record(_) => None,
    }
  }

  /// Returns `true` if this is a record.
  pub fn is_record(&self) -> bool {
    matches!(self, BagEvent::Record(_))
  }
}

/// Open/close state machine for a sequence of bags on one port.
///
/// Used directly by input and output ports, and by [`Bag`] for its records.
#[derive(Clone, Debug)]
pub struct Lifecycle {
  operator: Arc<str>,
  port: PortRef,
  state: BagState,
  round: Option<Round>,
  next: Round,
}

impl Lifecycle {
  /// Creates an idle lifecycle whose first bag is [`Round::FIRST`].
  pub fn new(operator: &Arc<str>, port: PortRef) -> Self {
    Self {
      operator: Arc::clone(operator),
      port,
      state: BagState::Idle,
      round: None,
      next: Round::FIRST,
    }
  }

  /// Makes the first bag start at `round` instead of [`Round::FIRST`].
  pub fn starting_at(mut self, round: Round) -> Self {
    if self.round.is_none() {
      self.next = round;
    }
    self
  }

  /// Current state.
  pub fn state(&self) -> BagState {
    self.state
  }

  /// Round of the current (or last) bag, `None` before the first open.
  pub fn round(&self) -> Option<Round> {
    self.round
  }

  /// Round the next `open` must use.
  pub fn next_round(&self) -> Round {
    self.next
  }

  /// Identity of the current bag, or of the next one before the first open.
  pub fn id(&self) -> BagId {
    BagId {
      operator: Arc::clone(&self.operator),
      port: self.port,
      round: self.round.unwrap_or(self.next),
    }
  }

  /// Operator name.
  pub fn operator(&self) -> &Arc<str> {
    &self.operator
  }

  /// Port this lifecycle belongs to.
  pub fn port(&self) -> PortRef {
    self.port
  }

  fn invalid(&self, op: BagOp) -> BagError {
    BagError::InvalidState {
      bag: self.id(),
      op,
      state: self.state,
    }
  }

  /// `Idle -> Open` for `round`.
  pub fn open(&mut self, round: Round) -> Result<(), BagError> {
    if self.state != BagState::Idle {
      return Err(self.invalid(BagOp::Open));
    }
    if round != self.next {
      return Err(BagError::protocol(
        &self.operator,
        Some(self.port),
        format!("bag opened for {round}, expected {}", self.next),
      ));
    }
    self.state = BagState::Open;
    self.round = Some(round);
    self.next = round.next();
    Ok(())
  }

  /// Fails with [`BagError::InvalidState`] unless a bag is open.
  pub fn require_open(&self, op: BagOp) -> Result<(), BagError> {
    if self.state == BagState::Open {
      Ok(())
    } else {
      Err(self.invalid(op))
    }
  }

  /// `Open -> Closed`, returning the closed round.
  pub fn close(&mut self) -> Result<Round, BagError> {
    self.require_open(BagOp::Close)?;
    self.state = BagState::Closed;
    Ok(self.round.unwrap_or(self.next))
  }

  /// `Closed -> Idle`. A no-op when already idle.
  pub fn reset(&mut self) -> Result<(), BagError> {
    match self.state {
      BagState::Open => Err(self.invalid(BagOp::Reset)),
      BagState::Closed | BagState::Idle => {
        self.state = BagState::Idle;
        Ok(())
      }
    }
  }
}

/// Backing storage for a bag's records.
pub trait RecordStore<T> {
  /// Stores one record.
  fn push(&mut self, record: T) -> Result<(), BufferError>;
  /// Number of stored records.
  fn len(&self) -> usize;
}

impl<T> RecordStore<T> for VecDeque<T> {
  fn push(&mut self, record: T) -> Result<(), BufferError> {
    self.push_back(record);
    Ok(())
  }

  fn len(&self) -> usize {
    VecDeque::len(self)
  }
}

impl<T: Serialize> RecordStore<T> for BufferWriter<T> {
  fn push(&mut self, record: T) -> Result<(), BufferError> {
    self.append(&record)
  }

  fn len(&self) -> usize {
    BufferWriter::len(self)
  }
}

/// An ordered, append-only round of records with an explicit lifecycle.
///
/// The default store keeps records in memory for single-pass streaming with
/// [`Bag::drain`]. A bag over a [`BufferWriter`] is materialized: once closed it
/// can be [sealed](Bag::seal) and read back any number of times.
pub struct Bag<T, S = VecDeque<T>> {
  lifecycle: Lifecycle,
  store: S,
  _marker: PhantomData<fn(T)>,
}

impl<T> Bag<T> {
  /// Creates an idle, streamed bag.
  pub fn new(operator: &Arc<str>, port: PortRef) -> Self {
    Self {
      lifecycle: Lifecycle::new(operator, port),
      store: VecDeque::new(),
      _marker: PhantomData,
    }
  }

  /// Removes and yields the records appended so far, in append order.
  ///
  /// Single pass: drained records are gone. Allowed in any state; reading a
  /// bag that is still open must be synchronized with its writer by the caller.
  pub fn drain(&mut self) -> Drain<'_, T> {
    self.store.drain(..)
  }

  /// `Closed -> Idle`, discarding any records not drained.
  pub fn reset(&mut self) -> Result<(), BagError> {
    self.lifecycle.reset()?;
    self.store.clear();
    Ok(())
  }
}

impl<T: Serialize> Bag<T, BufferWriter<T>> {
  /// Creates an idle bag materialized into a serialized buffer.
  pub fn buffered(operator: &Arc<str>, port: PortRef, config: BufferConfig) -> Self {
    Self {
      lifecycle: Lifecycle::new(operator, port),
      store: BufferWriter::new(config),
      _marker: PhantomData,
    }
  }

  /// Returns `true` if the buffer has spilled to disk.
  pub fn is_spilled(&self) -> bool {
    self.store.is_spilled()
  }

  /// Consumes a closed bag and returns its sealed, restartable buffer.
  pub fn seal(self) -> Result<SealedBuffer<T>, BagError> {
    if self.lifecycle.state() != BagState::Closed {
      return Err(BagError::InvalidState {
        bag: self.lifecycle.id(),
        op: BagOp::Seal,
        state: self.lifecycle.state(),
      });
    }
    Ok(self.store.seal()?)
  }
}

impl<T, S: RecordStore<T>> Bag<T, S> {
  /// Makes the first bag start at `round`. Only meaningful before the first open.
  pub fn starting_at(mut self, round: Round) -> Self {
    self.lifecycle = self.lifecycle.starting_at(round);
    self
  }

  /// Identity of the bag.
  pub fn id(&self) -> BagId {
    self.lifecycle.id()
  }

  /// Current state.
  pub fn state(&self) -> BagState {
    self.lifecycle.state()
  }

  /// Round of the bag, `None` before the first open.
  pub fn round(&self) -> Option<Round> {
    self.lifecycle.round()
  }

  /// Number of records currently held.
  pub fn len(&self) -> usize {
    self.store.len()
  }

  /// Returns `true` if no records are held.
  pub fn is_empty(&self) -> bool {
    self.store.len() == 0
  }

  /// `Idle -> Open` for `round`.
  pub fn open(&mut self, round: Round) -> Result<(), BagError> {
    self.lifecycle.open(round)
  }

  /// Appends a record to the open bag.
  pub fn append(&mut self, record: T) -> Result<(), BagError> {
    self.lifecycle.require_open(BagOp::Append)?;
    self.store.push(record)?;
    Ok(())
  }

  /// `Open -> Closed`, returning the closed round.
  pub fn close(&mut self) -> Result<Round, BagError> {
    self.lifecycle.close()
  }
}

impl<T, S: RecordStore<T>> fmt::Debug for Bag<T, S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Bag")
      .field("id", &self.lifecycle.id())
      .field("state", &self.lifecycle.state())
      .field("len", &self.store.len())
      .finish()
  }
}
