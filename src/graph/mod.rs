//! Operator graphs and the driver that runs them.
//!
//! A [`Graph`] owns operators until it runs. Each operator becomes one tokio
//! task; bag events travel between tasks over unbounded channels, one channel
//! per connected input port. Termination needs no barrier: every operator ends
//! once its upstreams have ended, and sources end when exhausted or cancelled.

pub mod execution;
#[allow(clippy::module_inception)]
pub mod graph;
pub mod graph_builder;


pub use execution::{ExecutionReport, OperatorSummary};
pub use graph::Graph;
pub use graph_builder::Node;
