//! # BagWeave
//!
//! Bag lifecycle and operator composition for round-based dataflow graphs.
//!
//! Iterative algorithms run here as static graphs. Each iteration is a *round*,
//! and each round of data on a channel is a *bag*: opened, filled, closed. An
//! operator sees bags open and close on each of its inputs, and closes its own
//! output bag for a round once every input has closed that round. Those closes
//! cascade downstream, which is how a whole graph detects that it is done
//! without a global barrier.
//!
//! ## Layers
//!
//! - [`bag`], [`buffer`]: the bag state machine and its serialized, spillable
//!   storage.
//! - [`port`], [`fan_in`], [`output`]: per-port state, cross-port close
//!   counting, and the output side with its [`RoundPolicy`].
//! - [`operator`]: the [`Operator`] trait with the default protocol.
//! - [`operators`]: ready-made operators.
//! - [`graph`]: wiring and the tokio driver.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bagweave::graph::Graph;
//! use bagweave::operators::{FromIter, Map};
//! use bagweave::RuntimeConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = Graph::new(RuntimeConfig::default());
//! let source = graph.add(FromIter::new("source", vec!["a", "b"]));
//! let upper = graph.add(Map::new("upper", |s: &str| s.to_uppercase()));
//! graph.connect(&source, &upper, 0)?;
//! let log = graph.tap(&upper)?;
//!
//! let report = graph.run().await?;
//! assert_eq!(log.records(), vec!["A".to_string(), "B".to_string()]);
//! assert!(!report.cancelled);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

/// Bags, their lifecycle, and the events that carry them.
pub mod bag;
/// Serialized, spillable record buffers.
pub mod buffer;
/// Runtime and buffer configuration.
pub mod config;
/// Error types.
pub mod error;
/// Per-round close counting across input ports.
pub mod fan_in;
/// Operator graphs and the tokio driver.
pub mod graph;
/// The operator trait and protocol dispatch.
pub mod operator;
/// Built-in operators.
pub mod operators;
/// Output ports and round policies.
pub mod output;
/// Input ports.
pub mod port;
/// Round numbers.
pub mod round;
/// First-failure supervision of operator tasks.
pub mod supervision;

#[cfg(test)]
mod buffer_test;
#[cfg(test)]
mod fan_in_test;
#[cfg(test)]
mod round_test;

pub use bag::{Bag, BagEvent, BagId, BagState, PortRef};
pub use buffer::{BufferReader, BufferWriter, SealedBuffer};
pub use config::{BufferConfig, RuntimeConfig};
pub use error::{BagError, BufferError, ExecutionError, GraphError};
pub use fan_in::{FanIn, FanInOutcome};
pub use graph::{ExecutionReport, Graph, Node, OperatorSummary};
pub use operator::{Operator, OperatorCore, OperatorKind, Step};
pub use output::{BagSink, EventLog, OutputPort, RoundPolicy};
pub use port::{InputId, PortRounds, PortSpec};
pub use round::Round;
pub use tokio_util::sync::CancellationToken;
