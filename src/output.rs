//! # Output Port
//!
//! The output side of an operator: opens, fills, and closes output bags and
//! fans every event out to the subscribed [`BagSink`]s.
//!
//! How many bags an output may produce is a [`RoundPolicy`], chosen at
//! construction instead of through a subclass:
//!
//! - [`RoundPolicy::PerRound`]: any number of bags, one open at a time.
//! - [`RoundPolicy::Singleton`]: at most one bag for the operator's lifetime.
//!   Reopening fails; a second close fails with [`BagError::DoubleClose`].
//! - [`RoundPolicy::None`]: sinks, which never open an output bag.

use crate::bag::{BagEvent, BagId, BagState, Lifecycle, PortRef};
use crate::error::{BagError, BagOp};
use crate::round::Round;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

/// How many bags an output port may produce.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoundPolicy {
  /// One bag per round, unbounded rounds.
  PerRound,
  /// A single bag for the whole lifetime.
  Singleton,
  /// No output at all.
  None,
}

/// A sink rejected an event because its receiving end is gone.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Disconnected;

/// Receiver of an output port's events.
pub trait BagSink<T>: Send {
  /// Delivers one event.
  fn deliver(&mut self, event: BagEvent<T>) -> Result<(), Disconnected>;
}

impl<T: Send> BagSink<T> for UnboundedSender<BagEvent<T>> {
  fn deliver(&mut self, event: BagEvent<T>) -> Result<(), Disconnected> {
    self.send(event).map_err(|_| Disconnected)
  }
}

/// Shared, cloneable recording of the events an output port emitted.
///
/// Lets a driver (or a test) observe exactly which opens, records, and closes
/// left a port.
pub struct EventLog<T> {
  events: Arc<Mutex<Vec<BagEvent<T>>>>,
}

impl<T> Clone for EventLog<T> {
  fn clone(&self) -> Self {
    Self {
      events: Arc::clone(&self.events),
    }
  }
}

impl<T> Default for EventLog<T> {
  fn default() -> Self {
    Self {
      events: Arc::new(Mutex::new(Vec::new())),
    }
  }
}

impl<T: Clone> EventLog<T> {
  /// Creates an empty log.
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot of all events in emission order.
  pub fn events(&self) -> Vec<BagEvent<T>> {
    self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Records of all bags, in emission order.
  pub fn records(&self) -> Vec<T> {
    self.events
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .filter_map(|e| match e {
        BagEvent::Record(r) => Some(r.clone()),
        _ => None,
      })
      .collect()
  }

  /// Records grouped per round, in round order.
  pub fn rounds(&self) -> Vec<(Round, Vec<T>)> {
    let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
    let mut rounds: Vec<(Round, Vec<T>)> = Vec::new();
    for event in events.iter() {
      match event {
        BagEvent::Open(round) => rounds.push((*round, Vec::new())),
        BagEvent::Record(r) => {
          if let Some((_, records)) = rounds.last_mut() {
            records.push(r.clone());
          }
        }
        BagEvent::Close(_) => {}
      }
    }
    rounds
  }
}

impl<T> EventLog<T> {
  /// Number of `Open` events.
  pub fn opens(&self) -> usize {
    self.count(|e| matches!(e, BagEvent::Open(_)))
  }

  /// Number of `Close` events.
  pub fn closes(&self) -> usize {
    self.count(|e| matches!(e, BagEvent::Close(_)))
  }

  /// Number of events.
  pub fn len(&self) -> usize {
    self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Returns `true` if nothing was logged.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn count(&self, pred: impl Fn(&BagEvent<T>) -> bool) -> usize {
    self.events
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .filter(|e| pred(e))
      .count()
  }
}

impl<T: Send> BagSink<T> for EventLog<T> {
  fn deliver(&mut self, event: BagEvent<T>) -> Result<(), Disconnected> {
    self.events
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(event);
    Ok(())
  }
}

/// The output port of an operator.
pub struct OutputPort<T> {
  lifecycle: Lifecycle,
  policy: RoundPolicy,
  sinks: Vec<Box<dyn BagSink<T>>>,
  bags_opened: u64,
  bags_closed: u64,
  records_emitted: u64,
}

impl<T> std::fmt::Debug for OutputPort<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OutputPort")
      .field("bag", &self.lifecycle.id())
      .field("state", &self.lifecycle.state())
      .field("policy", &self.policy)
      .field("sinks", &self.sinks.len())
      .finish()
  }
}

impl<T: Clone + Send + 'static> OutputPort<T> {
  /// Creates an idle output port for `operator`.
  pub fn new(operator: &Arc<str>, policy: RoundPolicy) -> Self {
    Self {
      lifecycle: Lifecycle::new(operator, PortRef::Output),
      policy,
      sinks: Vec::new(),
      bags_opened: 0,
      bags_closed: 0,
      records_emitted: 0,
    }
  }

  /// Adds a subscriber; it sees every event emitted from now on.
  pub fn subscribe(&mut self, sink: Box<dyn BagSink<T>>) {
    self.sinks.push(sink);
  }

  /// Round policy of the port.
  pub fn policy(&self) -> RoundPolicy {
    self.policy
  }

  /// State of the current output bag.
  pub fn state(&self) -> BagState {
    self.lifecycle.state()
  }

  /// Round of the current (or last) output bag.
  pub fn round(&self) -> Option<Round> {
    self.lifecycle.round()
  }

  /// Identity of the current output bag.
  pub fn id(&self) -> BagId {
    self.lifecycle.id()
  }

  /// Number of bags closed so far.
  pub fn bags_closed(&self) -> u64 {
    self.bags_closed
  }

  /// Number of records emitted so far.
  pub fn records_emitted(&self) -> u64 {
    self.records_emitted
  }

  /// Begins the next output bag.
  pub fn open_bag(&mut self) -> Result<Round, BagError> {
    match self.policy {
      RoundPolicy::None => {
        return Err(BagError::protocol(
          self.lifecycle.operator(),
          Some(PortRef::Output),
          "sink operators have no output bag",
        ));
      }
      RoundPolicy::Singleton if self.bags_opened > 0 => {
        return Err(BagError::InvalidState {
          bag: self.lifecycle.id(),
          op: BagOp::Open,
          state: self.lifecycle.state(),
        });
      }
      RoundPolicy::PerRound if self.lifecycle.state() == BagState::Closed => {
        self.lifecycle.reset()?;
      }
      _ => {}
    }
    let round = self.lifecycle.next_round();
    self.lifecycle.open(round)?;
    self.bags_opened += 1;
    debug!(bag = %self.lifecycle.id(), "open out bag");
    self.emit(BagEvent::Open(round))?;
    Ok(round)
  }

  /// Appends a record to the open output bag.
  pub fn append(&mut self, record: T) -> Result<(), BagError> {
    self.lifecycle.require_open(BagOp::Append)?;
    self.records_emitted += 1;
    self.emit(BagEvent::Record(record))
  }

  /// Closes the open output bag, signalling downstream that the round is complete.
  pub fn close_bag(&mut self) -> Result<Round, BagError> {
    if self.policy == RoundPolicy::Singleton && self.lifecycle.state() == BagState::Closed {
      return Err(BagError::DoubleClose {
        bag: self.lifecycle.id(),
      });
    }
    let round = self.lifecycle.close()?;
    self.bags_closed += 1;
    debug!(bag = %self.lifecycle.id(), records = self.records_emitted, "close out bag");
    self.emit(BagEvent::Close(round))?;
    Ok(round)
  }

  /// Closes the output bag if one is open; used on cancellation.
  pub fn close_if_open(&mut self) -> Result<Option<Round>, BagError> {
    if self.lifecycle.state() == BagState::Open {
      self.close_bag().map(Some)
    } else {
      Ok(None)
    }
  }

  fn emit(&mut self, event: BagEvent<T>) -> Result<(), BagError> {
    trace!(bag = %self.lifecycle.id(), record = event.is_record(), "emit");
    let mut disconnected = false;
    if let Some((last, rest)) = self.sinks.split_last_mut() {
      for sink in rest {
        disconnected |= sink.deliver(event.clone()).is_err();
      }
      disconnected |= last.deliver(event).is_err();
    }
    if disconnected {
      return Err(BagError::Disconnected {
        bag: self.lifecycle.id(),
      });
    }
    Ok(())
  }
}
