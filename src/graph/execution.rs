//! # Graph Execution
//!
//! Runs one tokio task per operator.
//!
//! ## Sources
//!
//! Operators without inputs are stepped in a loop. The cancellation token is
//! checked between steps, never inside one, so a cancelled source closes its
//! output bag after a whole record. Every `source_yield_interval` steps the
//! task yields to the scheduler so an unbounded source cannot starve the rest of
//! the graph.
//!
//! ## Everything else
//!
//! Each input port has its own unbounded channel. The channels are merged with a
//! [`StreamMap`] keyed by [`InputId`]; events of one port arrive in order, events
//! of different ports interleave arbitrarily. Events are dispatched one at a
//! time. The task ends when every upstream task has ended and dropped its
//! sender, after checking that no bag was left half-delivered.
//!
//! ## Failure
//!
//! The first error is filed with the [`Supervisor`], which cancels the abort
//! token every task selects on. The failing operator is only dropped after the
//! report, so downstream tasks that notice the broken channel cannot win the race.

use crate::bag::BagEvent;
use crate::error::BagError;
use crate::operator::{Operator, OperatorKind, Step, dispatch, finish};
use crate::port::InputId;
use crate::supervision::{FailureReport, Supervisor};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::StreamMap;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-operator outcome of an execution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OperatorSummary {
  /// Operator name.
  pub name: String,
  /// Capability class.
  pub kind: OperatorKind,
  /// Output bags closed.
  pub bags_closed: u64,
  /// Output records emitted.
  pub records_emitted: u64,
}

impl OperatorSummary {
  fn of<O: Operator>(op: &O) -> Self {
    let core = op.core();
    Self {
      name: core.name().to_string(),
      kind: core.kind(),
      bags_closed: core.out().bags_closed(),
      records_emitted: core.out().records_emitted(),
    }
  }
}

/// Result of a successful execution.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecutionReport {
  /// One entry per operator, in the order they were added.
  pub operators: Vec<OperatorSummary>,
  /// `true` if the execution ended through external cancellation.
  pub cancelled: bool,
}

impl ExecutionReport {
  /// Looks up the summary of the operator named `name`.
  pub fn operator(&self, name: &str) -> Option<&OperatorSummary> {
    self.operators.iter().find(|s| s.name == name)
  }
}

/// What every operator task shares.
#[derive(Clone)]
pub(crate) struct TaskContext {
  pub(crate) supervisor: Arc<Supervisor>,
  pub(crate) cancel: CancellationToken,
  pub(crate) yield_interval: usize,
}

enum Halt {
  Aborted,
  Failed {
    port: Option<InputId>,
    error: BagError,
  },
}

impl From<BagError> for Halt {
  fn from(error: BagError) -> Self {
    Halt::Failed { port: None, error }
  }
}

/// Runs `op` to completion and returns its summary.
pub(crate) async fn drive<O: Operator>(
  mut op: O,
  inputs: Vec<UnboundedReceiver<BagEvent<O::In>>>,
  ctx: TaskContext,
) -> OperatorSummary {
  let name = op.name().to_string();
  debug!(operator = %name, kind = %op.core().kind(), inputs = inputs.len(), "operator task started");

  let result = if inputs.is_empty() {
    run_source(&mut op, &ctx).await
  } else {
    run_inputs(&mut op, inputs, &ctx).await
  };

  match result {
    Ok(()) => debug!(operator = %name, "operator task finished"),
    Err(Halt::Aborted) => debug!(operator = %name, "operator task aborted"),
    Err(Halt::Failed { port, error }) => ctx.supervisor.report(FailureReport {
      operator: name,
      port,
      error,
    }),
  }
  OperatorSummary::of(&op)
}

async fn run_source<O: Operator>(op: &mut O, ctx: &TaskContext) -> Result<(), Halt> {
  let abort = ctx.supervisor.abort_token();
  op.start()?;
  let mut steps = 0usize;
  loop {
    if abort.is_cancelled() {
      return Err(Halt::Aborted);
    }
    if ctx.cancel.is_cancelled() {
      warn!(operator = %op.name(), steps, "source cancelled");
      op.cancel()?;
      break;
    }
    if op.step()? == Step::Exhausted {
      break;
    }
    steps += 1;
    if steps % ctx.yield_interval == 0 {
      tokio::task::yield_now().await;
    }
  }
  finish(op)?;
  Ok(())
}

async fn run_inputs<O: Operator>(
  op: &mut O,
  inputs: Vec<UnboundedReceiver<BagEvent<O::In>>>,
  ctx: &TaskContext,
) -> Result<(), Halt> {
  let abort = ctx.supervisor.abort_token();
  let mut streams = StreamMap::new();
  for (input, rx) in inputs.into_iter().enumerate() {
    streams.insert(input, UnboundedReceiverStream::new(rx));
  }

  op.start()?;
  loop {
    tokio::select! {
      biased;
      _ = abort.cancelled() => return Err(Halt::Aborted),
      next = streams.next() => match next {
        Some((input, event)) => dispatch(op, input, event).map_err(|error| Halt::Failed {
          port: Some(input),
          error,
        })?,
        None => break,
      },
    }
  }
  finish(op)?;
  Ok(())
}
