//! # Operator
//!
//! The unit of computation: zero or more input ports, exactly one output port,
//! and lifecycle callbacks the driver invokes as bags open and close.
//!
//! ## Callback order
//!
//! For each input port and each round the driver calls, strictly in order:
//!
//! 1. [`Operator::open_in_bag`] when a bag begins on the port,
//! 2. [`Operator::push_in_element`] once per record,
//! 3. [`Operator::close_in_bag`] when the bag is complete.
//!
//! The output side is driven by the operator itself through
//! [`Operator::open_out_bag`] and the [`OutputPort`] in its core.
//!
//! ## Termination
//!
//! The default `close_in_bag` records the close in the operator's [`FanIn`] and
//! closes the output bag when the last input closes the round. That single rule,
//! applied by every operator, propagates termination through the graph.
//!
//! ## Kinds
//!
//! An operator's [`OperatorKind`] follows from its input count and output
//! [`RoundPolicy`]; there is no subclass per kind.

use crate::bag::{BagEvent, BagState, PortRef};
use crate::error::BagError;
use crate::fan_in::{FanIn, FanInOutcome};
use crate::output::{OutputPort, RoundPolicy};
use crate::port::{InputId, InputPorts, PortSpec};
use crate::round::Round;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Capability class of an operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperatorKind {
  /// No inputs; produces its own data.
  Source,
  /// No output bag.
  Sink,
  /// Inputs and a single output bag for its whole lifetime.
  Singleton,
  /// One output bag per round.
  MultiRound,
}

impl fmt::Display for OperatorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      OperatorKind::Source => "source",
      OperatorKind::Sink => "sink",
      OperatorKind::Singleton => "singleton",
      OperatorKind::MultiRound => "multi-round",
    };
    f.write_str(s)
  }
}

/// Result of one production step of a source.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
  /// More records may follow.
  Continue,
  /// The source is done and has closed its output.
  Exhausted,
}

/// State every operator carries: identity, input ports, fan-in tally, output port.
#[derive(Debug)]
pub struct OperatorCore<Out> {
  name: Arc<str>,
  inputs: InputPorts,
  fan_in: FanIn,
  out: OutputPort<Out>,
}

impl<Out: Clone + Send + 'static> OperatorCore<Out> {
  /// Creates the core of an operator named `name`.
  pub fn new(name: &str, inputs: Vec<PortSpec>, policy: RoundPolicy) -> Self {
    let name: Arc<str> = Arc::from(name);
    let fan_in = FanIn::new(&name, inputs.len());
    Self {
      inputs: InputPorts::new(&name, inputs),
      fan_in,
      out: OutputPort::new(&name, policy),
      name,
    }
  }

  /// Operator name.
  pub fn name(&self) -> &Arc<str> {
    &self.name
  }

  /// Input ports.
  pub fn inputs(&self) -> &InputPorts {
    &self.inputs
  }

  /// Fan-in tally over the input ports.
  pub fn fan_in(&self) -> &FanIn {
    &self.fan_in
  }

  /// Output port.
  pub fn out(&self) -> &OutputPort<Out> {
    &self.out
  }

  /// Output port, mutably.
  pub fn out_mut(&mut self) -> &mut OutputPort<Out> {
    &mut self.out
  }

  /// Capability class derived from inputs and output policy.
  pub fn kind(&self) -> OperatorKind {
    match (self.inputs.is_empty(), self.out.policy()) {
      (_, RoundPolicy::None) => OperatorKind::Sink,
      (true, _) => OperatorKind::Source,
      (false, RoundPolicy::Singleton) => OperatorKind::Singleton,
      (false, RoundPolicy::PerRound) => OperatorKind::MultiRound,
    }
  }

  /// Marks `input` open for `round`.
  pub fn open_in(&mut self, input: InputId, round: Round) -> Result<(), BagError> {
    self.inputs.open(input, round)?;
    debug!(operator = %self.name, input, round = %round, "open in bag");
    Ok(())
  }

  /// Marks `input` closed and records the close in the fan-in tally.
  pub fn close_in(&mut self, input: InputId) -> Result<FanInOutcome, BagError> {
    let round = self.inputs.close(input)?;
    debug!(operator = %self.name, input, round = %round, "close in bag");
    self.fan_in.record_close(input, round)
  }

  /// Opens `input` and, if no output bag is open yet, the output bag.
  ///
  /// The output round always equals the input round. An input that opens a
  /// round while the output still holds an earlier one is a protocol
  /// violation; operators whose inputs may run ahead buffer instead (see
  /// [`Union`](crate::operators::Union)).
  pub fn forward_open(&mut self, input: InputId, round: Round) -> Result<(), BagError> {
    if self.out.state() == BagState::Open
      && let Some(open) = self.out.round()
      && open != round
    {
      return Err(BagError::protocol(
        &self.name,
        Some(PortRef::Input(input)),
        format!("input {input} opened {round} while output {open} is still open"),
      ));
    }
    self.open_in(input, round)?;
    if self.out.state() != BagState::Open {
      let opened = self.out.open_bag()?;
      if opened != round {
        return Err(BagError::protocol(
          &self.name,
          Some(PortRef::Output),
          format!("output opened {opened} while input {input} opened {round}"),
        ));
      }
    }
    Ok(())
  }

  /// Closes `input` and closes the output bag once every input closed the round.
  ///
  /// A round that never opened an output bag closes nothing. A singleton
  /// output that is already closed still fails with `DoubleClose`.
  pub fn forward_close(&mut self, input: InputId) -> Result<FanInOutcome, BagError> {
    let outcome = self.close_in(input)?;
    let Some(round) = outcome.completed() else {
      return Ok(outcome);
    };
    match (self.out.policy(), self.out.state()) {
      (RoundPolicy::None, _) => {}
      (_, BagState::Open) | (RoundPolicy::Singleton, BagState::Closed) => {
        self.out.close_bag()?;
      }
      _ => trace!(operator = %self.name, round = %round, "round complete without an output bag"),
    }
    Ok(outcome)
  }
}

/// An operator driven through the bag lifecycle protocol.
///
/// Only [`core`](Operator::core), [`core_mut`](Operator::core_mut) and
/// [`push_in_element`](Operator::push_in_element) are required; every other
/// callback has a default that implements the plain protocol on the core.
pub trait Operator: Send + 'static {
  /// Record type on the input ports.
  type In: Send + 'static;
  /// Record type on the output port.
  type Out: Clone + Send + 'static;

  /// Shared operator state.
  fn core(&self) -> &OperatorCore<Self::Out>;

  /// Shared operator state, mutably.
  fn core_mut(&mut self) -> &mut OperatorCore<Self::Out>;

  /// Operator name.
  fn name(&self) -> &Arc<str> {
    self.core().name()
  }

  /// Called once before any event. Sources open their output bag here.
  fn start(&mut self) -> Result<(), BagError> {
    Ok(())
  }

  /// A bag for `round` begins on `input`.
  fn open_in_bag(&mut self, input: InputId, round: Round) -> Result<(), BagError> {
    self.core_mut().open_in(input, round)
  }

  /// A record of the open bag on `input`.
  fn push_in_element(&mut self, input: InputId, record: Self::In) -> Result<(), BagError>;

  /// The bag on `input` is complete.
  fn close_in_bag(&mut self, input: InputId) -> Result<(), BagError> {
    self.core_mut().forward_close(input).map(|_| ())
  }

  /// Begins the next output bag.
  fn open_out_bag(&mut self) -> Result<Round, BagError> {
    self.core_mut().out_mut().open_bag()
  }

  /// Produces the next record of a source.
  fn step(&mut self) -> Result<Step, BagError> {
    Ok(Step::Exhausted)
  }

  /// Cooperative cancellation: close the open output bag and stop.
  fn cancel(&mut self) -> Result<(), BagError> {
    if let Some(round) = self.core_mut().out_mut().close_if_open()? {
      debug!(operator = %self.name(), round = %round, "closed output on cancel");
    }
    Ok(())
  }
}

/// Routes one event from `input` to the matching callback.
///
/// Besides calling the operator, this checks what no override may skip: records
/// only arrive on open ports, a close names the round that is open, and open and
/// close overrides actually moved the port's state.
pub fn dispatch<O>(op: &mut O, input: InputId, event: BagEvent<O::In>) -> Result<(), BagError>
where
  O: Operator + ?Sized,
{
  let port = Some(PortRef::Input(input));
  match event {
    BagEvent::Open(round) => {
      op.open_in_bag(input, round)?;
      let state = op.core().inputs().get(input)?;
      if state.state() != BagState::Open || state.round() != Some(round) {
        return Err(BagError::protocol(
          op.name(),
          port,
          format!("open_in_bag did not open the port for {round}"),
        ));
      }
    }
    BagEvent::Record(record) => {
      op.core().inputs().require_open(input)?;
      trace!(operator = %op.name(), input, "record");
      op.push_in_element(input, record)?;
    }
    BagEvent::Close(round) => {
      let state = op.core().inputs().get(input)?;
      if state.state() == BagState::Open && state.round() != Some(round) {
        let open = state.round().unwrap_or(Round::FIRST);
        return Err(BagError::protocol(
          op.name(),
          port,
          format!("close for {round} while {open} is open"),
        ));
      }
      op.close_in_bag(input)?;
      if op.core().inputs().get(input)?.state() != BagState::Closed {
        return Err(BagError::protocol(
          op.name(),
          port,
          format!("close_in_bag did not close the port for {round}"),
        ));
      }
    }
  }
  Ok(())
}

/// Checks the operator's end state once its inputs are exhausted.
///
/// Fails if an upstream ended mid-bag, a round was closed on only some inputs,
/// or the output bag was left open.
pub fn finish<O>(op: &O) -> Result<(), BagError>
where
  O: Operator + ?Sized,
{
  let core = op.core();
  if let Some(&input) = core.inputs().open_inputs().first() {
    return Err(BagError::protocol(
      core.name(),
      Some(PortRef::Input(input)),
      "input ended with its bag still open",
    ));
  }
  if let Some(round) = core.fan_in().in_flight() {
    return Err(BagError::protocol(
      core.name(),
      None,
      format!("{round} was closed on only some inputs"),
    ));
  }
  if core.out().state() == BagState::Open {
    return Err(BagError::protocol(
      core.name(),
      Some(PortRef::Output),
      "output bag left open after all inputs ended",
    ));
  }
  Ok(())
}
