//! # Input Ports
//!
//! Per-port bag state for an operator's inputs.
//!
//! Each input port runs the bag state machine once per round:
//!
//! ```text
//! Idle -> Open -> Closed -> (Idle for the next round, multi-round ports only)
//! ```
//!
//! The driver delivers `open`, records, and `close` for one port strictly in
//! that order; this module rejects anything else. Ports are addressed by
//! [`InputId`], their position in the operator's input list, and may carry a
//! name for diagnostics.

use crate::bag::{BagState, Lifecycle, PortRef};
use crate::error::{BagError, BagOp};
use crate::round::Round;
use std::sync::Arc;

/// Position of an input port on its operator.
pub type InputId = usize;

/// How many bags an input port accepts over the operator's lifetime.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PortRounds {
  /// Exactly one bag.
  Single,
  /// One bag per round, any number of rounds.
  #[default]
  Multi,
}

/// Declaration of an input port.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PortSpec {
  /// Optional name used in diagnostics.
  pub name: Option<String>,
  /// Round policy of the port.
  pub rounds: PortRounds,
}

impl PortSpec {
  /// A port that accepts one bag per round.
  pub fn multi() -> Self {
    Self {
      name: None,
      rounds: PortRounds::Multi,
    }
  }

  /// A port that accepts exactly one bag.
  pub fn single() -> Self {
    Self {
      name: None,
      rounds: PortRounds::Single,
    }
  }

  /// Names the port.
  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }
}

/// Bag state of one input port.
#[derive(Clone, Debug)]
pub struct InputPort {
  id: InputId,
  name: Option<String>,
  rounds: PortRounds,
  lifecycle: Lifecycle,
}

impl InputPort {
  fn new(operator: &Arc<str>, id: InputId, spec: PortSpec) -> Self {
    Self {
      id,
      name: spec.name,
      rounds: spec.rounds,
      lifecycle: Lifecycle::new(operator, PortRef::Input(id)),
    }
  }

  /// Position of the port.
  pub fn id(&self) -> InputId {
    self.id
  }

  /// Name of the port, if declared.
  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  /// Round policy of the port.
  pub fn rounds(&self) -> PortRounds {
    self.rounds
  }

  /// Current bag state.
  pub fn state(&self) -> BagState {
    self.lifecycle.state()
  }

  /// Round of the current (or last) bag.
  pub fn round(&self) -> Option<Round> {
    self.lifecycle.round()
  }

  fn open(&mut self, round: Round) -> Result<(), BagError> {
    if self.rounds == PortRounds::Multi && self.lifecycle.state() == BagState::Closed {
      self.lifecycle.reset()?;
    }
    self.lifecycle.open(round)
  }

  fn close(&mut self) -> Result<Round, BagError> {
    if self.lifecycle.round().is_none() {
      return Err(BagError::protocol(
        self.lifecycle.operator(),
        Some(PortRef::Input(self.id)),
        "close for an input that was never opened",
      ));
    }
    self.lifecycle.close()
  }
}

/// The input ports of one operator.
#[derive(Clone, Debug)]
pub struct InputPorts {
  operator: Arc<str>,
  ports: Vec<InputPort>,
}

impl InputPorts {
  /// Declares the ports of `operator`, numbered in iteration order.
  pub fn new(operator: &Arc<str>, specs: impl IntoIterator<Item = PortSpec>) -> Self {
    let ports = specs
      .into_iter()
      .enumerate()
      .map(|(id, spec)| InputPort::new(operator, id, spec))
      .collect();
    Self {
      operator: Arc::clone(operator),
      ports,
    }
  }

  /// Number of ports.
  pub fn len(&self) -> usize {
    self.ports.len()
  }

  /// Returns `true` for operators without inputs.
  pub fn is_empty(&self) -> bool {
    self.ports.is_empty()
  }

  /// Iterates over the ports in [`InputId`] order.
  pub fn iter(&self) -> impl Iterator<Item = &InputPort> {
    self.ports.iter()
  }

  /// Looks up a port.
  pub fn get(&self, input: InputId) -> Result<&InputPort, BagError> {
    self.ports.get(input).ok_or_else(|| self.unknown(input))
  }

  fn get_mut(&mut self, input: InputId) -> Result<&mut InputPort, BagError> {
    let err = self.unknown(input);
    self.ports.get_mut(input).ok_or(err)
  }

  fn unknown(&self, input: InputId) -> BagError {
    BagError::protocol(
      &self.operator,
      Some(PortRef::Input(input)),
      format!("unknown input (operator has {})", self.ports.len()),
    )
  }

  /// Opens the bag for `round` on `input`.
  pub fn open(&mut self, input: InputId, round: Round) -> Result<(), BagError> {
    self.get_mut(input)?.open(round)
  }

  /// Guards record delivery: fails unless `input` has an open bag.
  pub fn require_open(&self, input: InputId) -> Result<(), BagError> {
    self.get(input)?.lifecycle.require_open(BagOp::Append)
  }

  /// Closes the bag on `input`, returning its round.
  pub fn close(&mut self, input: InputId) -> Result<Round, BagError> {
    self.get_mut(input)?.close()
  }

  /// Inputs that currently have an open bag.
  pub fn open_inputs(&self) -> Vec<InputId> {
    self.ports
      .iter()
      .filter(|p| p.state() == BagState::Open)
      .map(|p| p.id)
      .collect()
  }
}
