//! # Error Handling
//!
//! Error types for the bag protocol and the graph driver.
//!
//! ## Overview
//!
//! Every bag-lifecycle violation is a programmer or transport error, never a
//! transient condition, so nothing here is retried:
//!
//! - **BagError**: an operation on a bag, port, or output that its state forbids
//!   (append after close, open while open, double close, unknown input).
//! - **BufferError**: encoding, decoding, or spill-file I/O inside a
//!   [`SerializedBuffer`](crate::buffer).
//! - **GraphError**: the operator graph is wired incorrectly.
//! - **ExecutionError**: what the driver reports for a failed execution, naming
//!   the operator and port that broke the protocol.
//!
//! Cancellation is deliberately absent: it is a control path handled with a
//! [`CancellationToken`](tokio_util::sync::CancellationToken), not a fault.

use crate::bag::{BagId, BagState, PortRef};
use crate::port::InputId;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Operation attempted on a bag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BagOp {
  /// Opening a new bag.
  Open,
  /// Appending a record.
  Append,
  /// Closing the current bag.
  Close,
  /// Sealing a buffered bag for reading.
  Seal,
  /// Returning a closed bag to idle for the next round.
  Reset,
}

impl fmt::Display for BagOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      BagOp::Open => "open",
      BagOp::Append => "append to",
      BagOp::Close => "close",
      BagOp::Seal => "seal",
      BagOp::Reset => "reset",
    };
    f.write_str(s)
  }
}

/// Errors raised by the bag lifecycle protocol.
///
/// All variants are fatal for the operator that raised them; the driver aborts
/// the execution and reports the operator and port.
#[derive(Error, Debug)]
pub enum BagError {
  /// Operation attempted on a bag in a state that forbids it.
  #[error("cannot {op} bag {bag}: bag is {state}")]
  InvalidState {
    /// The bag the operation targeted.
    bag: BagId,
    /// The attempted operation.
    op: BagOp,
    /// The state the bag was in.
    state: BagState,
  },

  /// The single output bag of a singleton operator was closed more than once.
  #[error("output bag {bag} of a singleton operator closed more than once")]
  DoubleClose {
    /// The output bag.
    bag: BagId,
  },

  /// A cross-port or cross-round invariant was broken.
  #[error("protocol violation in '{operator}'{}: {reason}", .port.map(|p| format!(" on {p}")).unwrap_or_default())]
  ProtocolViolation {
    /// Operator that observed the violation.
    operator: Arc<str>,
    /// Port involved, if any.
    port: Option<PortRef>,
    /// What went wrong.
    reason: String,
  },

  /// A downstream consumer of an output port went away.
  #[error("downstream of {bag} disconnected")]
  Disconnected {
    /// The output bag that could not be delivered.
    bag: BagId,
  },

  /// Materializing a bag failed.
  #[error(transparent)]
  Buffer(#[from] BufferError),
}

impl BagError {
  /// Builds a [`BagError::ProtocolViolation`].
  pub fn protocol(operator: &Arc<str>, port: Option<PortRef>, reason: impl Into<String>) -> Self {
    BagError::ProtocolViolation {
      operator: Arc::clone(operator),
      port,
      reason: reason.into(),
    }
  }
}

/// Errors raised by a serialized buffer.
#[derive(Error, Debug)]
pub enum BufferError {
  /// A record could not be encoded.
  #[error("encode error: {0}")]
  Encode(#[from] rmp_serde::encode::Error),
  /// A record could not be decoded.
  #[error("decode error: {0}")]
  Decode(#[from] rmp_serde::decode::Error),
  /// Spill file I/O failed.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  /// A frame header points past the end of the buffer.
  #[error("corrupt frame at offset {offset}")]
  Corrupt {
    /// Byte offset of the broken frame.
    offset: u64,
  },
}

/// Errors raised while wiring a graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
  /// The target operator has no such input.
  #[error("operator '{operator}' has no input {input} (it has {inputs})")]
  UnknownInput {
    /// Target operator.
    operator: String,
    /// Requested input.
    input: InputId,
    /// Number of inputs the operator has.
    inputs: usize,
  },
  /// The input already has an upstream operator.
  #[error("input {input} of operator '{operator}' is already connected")]
  InputAlreadyConnected {
    /// Target operator.
    operator: String,
    /// Input that is already wired.
    input: InputId,
  },
  /// An input was never connected; it would never see a bag.
  #[error("input {input} of operator '{operator}' is not connected")]
  UnconnectedInput {
    /// Operator with the dangling input.
    operator: String,
    /// Unconnected input.
    input: InputId,
  },
  /// A node handle from a different graph was used.
  #[error("operator '{0}' does not belong to this graph")]
  ForeignNode(String),
}

/// Errors reported by the graph driver for a failed execution.
#[derive(Error, Debug)]
pub enum ExecutionError {
  /// The graph failed topology validation.
  #[error("invalid topology: {0}")]
  InvalidTopology(#[from] GraphError),

  /// An operator broke the bag protocol.
  #[error("operator '{operator}' failed{}: {source}", .port.map(|p| format!(" on input {p}")).unwrap_or_default())]
  Operator {
    /// The failing operator.
    operator: String,
    /// The input whose event was being handled, if any.
    port: Option<InputId>,
    /// The underlying protocol error.
    #[source]
    source: BagError,
  },

  /// An operator task panicked.
  #[error("operator '{operator}' panicked: {message}")]
  Panicked {
    /// The panicking operator.
    operator: String,
    /// Panic payload, if it was a string.
    message: String,
  },

  /// The configuration was rejected.
  #[error("invalid configuration: {0}")]
  Config(String),
}
