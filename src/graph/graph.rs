//! # Graph
//!
//! Wires operators together and runs them.
//!
//! ```rust,no_run
//! use bagweave::graph::Graph;
//! use bagweave::operators::{Collect, FromIter, Map};
//! use bagweave::{BufferConfig, Round, RuntimeConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = Graph::new(RuntimeConfig::default());
//! let source = graph.add(FromIter::new("numbers", 1..=3));
//! let double = graph.add(Map::new("double", |x: i32| x * 2));
//! let collect = Collect::new("collect", BufferConfig::default());
//! let collected = collect.collected();
//! let sink = graph.add(collect);
//!
//! graph.connect(&source, &double, 0)?;
//! graph.connect(&double, &sink, 0)?;
//! graph.run().await?;
//!
//! assert_eq!(collected.records(Round::FIRST)?, vec![2, 4, 6]);
//! # Ok(())
//! # }
//! ```

use super::execution::{ExecutionReport, TaskContext};
use super::graph_builder::{Node, PendingNode, PendingOperator};
use crate::config::RuntimeConfig;
use crate::error::{ExecutionError, GraphError};
use crate::operator::Operator;
use crate::output::EventLog;
use crate::port::InputId;
use crate::supervision::Supervisor;
use futures::future::join_all;
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(0);

/// A static operator graph.
pub struct Graph {
  id: u64,
  config: RuntimeConfig,
  nodes: Vec<Box<dyn PendingNode>>,
}

impl std::fmt::Debug for Graph {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Graph")
      .field("id", &self.id)
      .field("operators", &self.nodes.iter().map(|n| n.name()).collect::<Vec<_>>())
      .finish()
  }
}

impl Default for Graph {
  fn default() -> Self {
    Self::new(RuntimeConfig::default())
  }
}

impl Graph {
  /// Creates an empty graph.
  pub fn new(config: RuntimeConfig) -> Self {
    Self {
      id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
      config,
      nodes: Vec::new(),
    }
  }

  /// Runtime configuration.
  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Number of operators.
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  /// Returns `true` if no operator was added.
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Adds an operator and returns its handle.
  pub fn add<O: Operator>(&mut self, op: O) -> Node<O::In, O::Out> {
    let (pending, node) = PendingOperator::new(op, self.id);
    debug!(operator = %node.name(), inputs = node.inputs(), "operator added");
    self.nodes.push(Box::new(pending));
    node
  }

  fn check<In, Out>(&self, node: &Node<In, Out>) -> Result<(), GraphError> {
    if node.graph == self.id {
      Ok(())
    } else {
      Err(GraphError::ForeignNode(node.name().to_string()))
    }
  }

  /// Feeds the output of `from` into input `input` of `to`.
  ///
  /// The edge is an unbounded channel; a source that outruns its consumers
  /// queues its records here until it is exhausted or cancelled.
  pub fn connect<A, T, B>(
    &mut self,
    from: &Node<A, T>,
    to: &Node<T, B>,
    input: InputId,
  ) -> Result<(), GraphError>
  where
    T: Send + 'static,
  {
    self.check(from)?;
    self.check(to)?;
    let (tx, rx) = mpsc::unbounded_channel();
    to.attach_input(input, rx)?;
    from.attach_output(Box::new(tx));
    debug!(from = %from.name(), to = %to.name(), input, "connected");
    Ok(())
  }

  /// Records every event `node` emits.
  pub fn tap<In, Out>(&mut self, node: &Node<In, Out>) -> Result<EventLog<Out>, GraphError>
  where
    Out: Clone + Send + 'static,
  {
    self.check(node)?;
    let log = EventLog::new();
    node.attach_output(Box::new(log.clone()));
    Ok(log)
  }

  /// Runs the graph until every operator has finished.
  pub async fn run(self) -> Result<ExecutionReport, ExecutionError> {
    self.run_with_cancel(CancellationToken::new()).await
  }

  /// Runs the graph; cancelling `cancel` makes sources close their output and stop.
  ///
  /// Cancellation is not a failure: the close cascades through the graph and
  /// the report comes back with `cancelled` set.
  pub async fn run_with_cancel(
    self,
    cancel: CancellationToken,
  ) -> Result<ExecutionReport, ExecutionError> {
    self.config.validate().map_err(ExecutionError::Config)?;
    for node in &self.nodes {
      node.validate()?;
    }

    let supervisor = Arc::new(Supervisor::new());
    let ctx = TaskContext {
      supervisor: Arc::clone(&supervisor),
      cancel: cancel.clone(),
      yield_interval: self.config.source_yield_interval,
    };
    info!(graph = self.id, operators = self.nodes.len(), "starting execution");

    let tasks = self.nodes.into_iter().map(|node| {
      let name = node.name().to_string();
      let handle = node.spawn(ctx.clone());
      let abort = supervisor.abort_token().clone();
      async move {
        let joined = handle.await;
        if joined.is_err() {
          abort.cancel();
        }
        (name, joined)
      }
    });
    let results = join_all(tasks).await;

    let mut operators = Vec::with_capacity(results.len());
    let mut panicked = None;
    for (name, joined) in results {
      match joined {
        Ok(summary) => operators.push(summary),
        Err(e) if panicked.is_none() => {
          let message = if e.is_panic() {
            panic_message(e.into_panic())
          } else {
            e.to_string()
          };
          panicked = Some(ExecutionError::Panicked {
            operator: name,
            message,
          });
        }
        Err(_) => {}
      }
    }
    if let Some(err) = panicked {
      return Err(err);
    }
    if let Some(failure) = supervisor.take_failure() {
      return Err(ExecutionError::Operator {
        operator: failure.operator,
        port: failure.port,
        source: failure.error,
      });
    }

    let cancelled = cancel.is_cancelled();
    info!(graph = self.id, cancelled, "execution finished");
    Ok(ExecutionReport {
      operators,
      cancelled,
    })
  }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
  match payload.downcast::<String>() {
    Ok(s) => *s,
    Err(payload) => match payload.downcast::<&'static str>() {
      Ok(s) => (*s).to_string(),
      Err(_) => "non-string panic payload".to_string(),
    },
  }
}
