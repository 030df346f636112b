//! Runtime configuration.
//!
//! Controls when materialized bags spill to disk and how often sources hand
//! control back to the scheduler. Both structs deserialize from JSON with every
//! field optional, falling back to [`Default`].

use crate::error::ExecutionError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for serialized bag buffers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
  /// Encoded bytes a buffer may hold in memory before it spills to a temporary file.
  pub spill_threshold_bytes: usize,
  /// Directory for spill files. `None` uses the OS temp directory.
  pub spill_dir: Option<PathBuf>,
}

impl Default for BufferConfig {
  fn default() -> Self {
    Self {
      spill_threshold_bytes: 8 * 1024 * 1024,
      spill_dir: None,
    }
  }
}

impl BufferConfig {
  /// Creates a config with the given spill threshold.
  pub fn new(spill_threshold_bytes: usize) -> Self {
    Self {
      spill_threshold_bytes,
      ..Default::default()
    }
  }

  /// Sets the spill directory.
  pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.spill_dir = Some(dir.into());
    self
  }

  /// Validates the config: the spill directory, when set, must exist.
  pub fn validate(&self) -> Result<(), String> {
    if let Some(dir) = &self.spill_dir
      && !dir.is_dir()
    {
      return Err(format!("spill_dir {} is not a directory", dir.display()));
    }
    Ok(())
  }
}

/// Configuration for a graph execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
  /// Buffer settings shared by operators that materialize bags.
  pub buffer: BufferConfig,
  /// Number of records a source produces between yields to the scheduler.
  pub source_yield_interval: usize,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      buffer: BufferConfig::default(),
      source_yield_interval: 64,
    }
  }
}

impl RuntimeConfig {
  /// Creates a config with default settings.
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the buffer config.
  pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
    self.buffer = buffer;
    self
  }

  /// Sets the source yield interval.
  pub fn with_source_yield_interval(mut self, n: usize) -> Self {
    self.source_yield_interval = n;
    self
  }

  /// Validates the config.
  pub fn validate(&self) -> Result<(), String> {
    if self.source_yield_interval == 0 {
      return Err("source_yield_interval must be > 0".to_string());
    }
    self.buffer.validate()
  }

  /// Parses and validates a config from JSON. Missing fields take their defaults.
  pub fn from_json_str(json: &str) -> Result<Self, ExecutionError> {
    let config: Self =
      serde_json::from_str(json).map_err(|e| ExecutionError::Config(e.to_string()))?;
    config.validate().map_err(ExecutionError::Config)?;
    Ok(config)
  }
}
