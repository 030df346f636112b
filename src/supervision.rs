//! Failure handling for operator tasks.
//!
//! A protocol violation is never retried: the first failing task files a
//! [`FailureReport`] and trips the shared abort token, which stops every other
//! task of the execution. Later failures (usually tasks observing the abort or a
//! dropped channel) are ignored so the report names the operator that broke
//! first.

use crate::error::BagError;
use crate::port::InputId;
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Report of an operator task failure.
#[derive(Debug)]
pub struct FailureReport {
  /// Operator that failed.
  pub operator: String,
  /// Input whose event was being handled, if any.
  pub port: Option<InputId>,
  /// The protocol error.
  pub error: BagError,
}

/// First-failure-wins supervisor shared by all tasks of one execution.
#[derive(Debug, Default)]
pub struct Supervisor {
  failure: Mutex<Option<FailureReport>>,
  abort: CancellationToken,
}

impl Supervisor {
  /// Creates a supervisor with a fresh abort token.
  pub fn new() -> Self {
    Self::default()
  }

  /// Token cancelled on the first reported failure.
  pub fn abort_token(&self) -> &CancellationToken {
    &self.abort
  }

  /// Returns `true` once a failure has been reported.
  pub fn is_aborted(&self) -> bool {
    self.abort.is_cancelled()
  }

  /// Records a failure and aborts the execution. Only the first report is kept.
  pub fn report(&self, report: FailureReport) {
    let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
      error!(
        operator = %report.operator,
        port = ?report.port,
        error = %report.error,
        "operator failed, aborting execution"
      );
      *slot = Some(report);
      self.abort.cancel();
    } else {
      debug!(operator = %report.operator, error = %report.error, "ignoring later failure");
    }
  }

  /// Takes the recorded failure, if any.
  pub fn take_failure(&self) -> Option<FailureReport> {
    self.failure
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take()
  }
}
