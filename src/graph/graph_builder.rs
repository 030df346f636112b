//! # Node Handles
//!
//! [`Node`] is the typed handle [`Graph::add`](super::Graph::add) returns for an
//! operator. It carries the operator's input and output record types, so
//! [`Graph::connect`](super::Graph::connect) only compiles when the upstream
//! output type matches the downstream input type.
//!
//! Behind the handle, the operator waits in a pending slot until the graph
//! runs: wiring fills its input slots with channel receivers and its subscriber
//! list with channel senders and taps.

use super::execution::{OperatorSummary, TaskContext, drive};
use crate::bag::BagEvent;
use crate::error::GraphError;
use crate::operator::Operator;
use crate::output::BagSink;
use crate::port::InputId;
use std::marker::PhantomData;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

type Slots<T> = Arc<Mutex<Vec<Option<UnboundedReceiver<BagEvent<T>>>>>>;
type Subscribers<T> = Arc<Mutex<Vec<Box<dyn BagSink<T>>>>>;

/// Typed handle to an operator added to a [`Graph`](super::Graph).
pub struct Node<In, Out> {
  pub(super) graph: u64,
  name: Arc<str>,
  inputs: usize,
  slots: Slots<In>,
  subscribers: Subscribers<Out>,
  _marker: PhantomData<fn(In) -> Out>,
}

impl<In, Out> Clone for Node<In, Out> {
  fn clone(&self) -> Self {
    Self {
      graph: self.graph,
      name: Arc::clone(&self.name),
      inputs: self.inputs,
      slots: Arc::clone(&self.slots),
      subscribers: Arc::clone(&self.subscribers),
      _marker: PhantomData,
    }
  }
}

impl<In, Out> std::fmt::Debug for Node<In, Out> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Node")
      .field("name", &self.name)
      .field("inputs", &self.inputs)
      .finish()
  }
}

impl<In, Out> Node<In, Out> {
  /// Operator name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Number of input ports.
  pub fn inputs(&self) -> usize {
    self.inputs
  }

  pub(super) fn attach_input(
    &self,
    input: InputId,
    rx: UnboundedReceiver<BagEvent<In>>,
  ) -> Result<(), GraphError> {
    let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(slot) = slots.get_mut(input) else {
      return Err(GraphError::UnknownInput {
        operator: self.name.to_string(),
        input,
        inputs: self.inputs,
      });
    };
    if slot.is_some() {
      return Err(GraphError::InputAlreadyConnected {
        operator: self.name.to_string(),
        input,
      });
    }
    *slot = Some(rx);
    Ok(())
  }

  pub(super) fn attach_output(&self, sink: Box<dyn BagSink<Out>>) {
    self.subscribers
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(sink);
  }
}

/// An operator waiting in a graph for execution.
pub(super) trait PendingNode: Send {
  fn name(&self) -> &str;

  /// Fails if some input was never connected.
  fn validate(&self) -> Result<(), GraphError>;

  fn spawn(self: Box<Self>, ctx: TaskContext) -> JoinHandle<OperatorSummary>;
}

pub(super) struct PendingOperator<O: Operator> {
  op: O,
  slots: Slots<O::In>,
  subscribers: Subscribers<O::Out>,
}

impl<O: Operator> PendingOperator<O> {
  pub(super) fn new(op: O, graph: u64) -> (Self, Node<O::In, O::Out>) {
    let inputs = op.core().inputs().len();
    let slots: Slots<O::In> = Arc::new(Mutex::new((0..inputs).map(|_| None).collect()));
    let subscribers: Subscribers<O::Out> = Arc::new(Mutex::new(Vec::new()));
    let node = Node {
      graph,
      name: Arc::clone(op.name()),
      inputs,
      slots: Arc::clone(&slots),
      subscribers: Arc::clone(&subscribers),
      _marker: PhantomData,
    };
    (
      Self {
        op,
        slots,
        subscribers,
      },
      node,
    )
  }
}

impl<O: Operator> PendingNode for PendingOperator<O> {
  fn name(&self) -> &str {
    self.op.name()
  }

  fn validate(&self) -> Result<(), GraphError> {
    let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
    match slots.iter().position(Option::is_none) {
      Some(input) => Err(GraphError::UnconnectedInput {
        operator: self.op.name().to_string(),
        input,
      }),
      None => Ok(()),
    }
  }

  fn spawn(self: Box<Self>, ctx: TaskContext) -> JoinHandle<OperatorSummary> {
    let PendingOperator {
      mut op,
      slots,
      subscribers,
    } = *self;
    let receivers: Vec<_> = mem::take(&mut *slots.lock().unwrap_or_else(PoisonError::into_inner))
      .into_iter()
      .flatten()
      .collect();
    let sinks = mem::take(&mut *subscribers.lock().unwrap_or_else(PoisonError::into_inner));
    for sink in sinks {
      op.core_mut().out_mut().subscribe(sink);
    }
    tokio::spawn(drive(op, receivers, ctx))
  }
}
