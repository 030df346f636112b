//! # Serialized Buffers
//!
//! Compact storage for a bag that must be materialized (buffered, replayed, or
//! spilled) instead of streamed record by record.
//!
//! A buffer has two phases, enforced by the type system:
//!
//! - **Writing**: a [`BufferWriter`] owns the buffer exclusively and is the only
//!   handle that can append. Once its encoded size passes
//!   [`BufferConfig::spill_threshold_bytes`], the frames move to a temporary file
//!   and later appends go straight to disk.
//! - **Sealed**: [`BufferWriter::seal`] consumes the writer and returns a
//!   [`SealedBuffer`], which is read-only and cheap to clone. Any number of
//!   [`BufferReader`]s can iterate it independently, each from the first record.
//!
//! ## Format
//!
//! Each record is encoded with MessagePack and framed as a little-endian `u32`
//! length followed by the payload. The same framing is used in memory and on disk.

use crate::config::BufferConfig;
use crate::error::BufferError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::debug;

const FRAME_HEADER: usize = 4;

/// Append-only writer for a buffer in its writing phase.
pub struct BufferWriter<T> {
  config: BufferConfig,
  memory: BytesMut,
  spill: Option<BufWriter<NamedTempFile>>,
  scratch: Vec<u8>,
  len: usize,
  encoded_len: u64,
  _marker: PhantomData<fn(T)>,
}

impl<T: Serialize> BufferWriter<T> {
  /// Creates an empty writer.
  pub fn new(config: BufferConfig) -> Self {
    Self {
      config,
      memory: BytesMut::new(),
      spill: None,
      scratch: Vec::new(),
      len: 0,
      encoded_len: 0,
      _marker: PhantomData,
    }
  }

  /// Encodes and appends one record.
  pub fn append(&mut self, record: &T) -> Result<(), BufferError> {
    self.scratch.clear();
    rmp_serde::encode::write_named(&mut self.scratch, record)?;
    let frame_len = u32::try_from(self.scratch.len()).map_err(|_| {
      BufferError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        "record larger than 4 GiB",
      ))
    })?;

    match &mut self.spill {
      Some(file) => {
        file.write_all(&frame_len.to_le_bytes())?;
        file.write_all(&self.scratch)?;
      }
      None => {
        self.memory.reserve(FRAME_HEADER + self.scratch.len());
        self.memory.put_u32_le(frame_len);
        self.memory.put_slice(&self.scratch);
      }
    }

    self.len += 1;
    self.encoded_len += (FRAME_HEADER + self.scratch.len()) as u64;

    if self.spill.is_none() && self.memory.len() > self.config.spill_threshold_bytes {
      self.spill_to_disk()?;
    }
    Ok(())
  }

  fn spill_to_disk(&mut self) -> Result<(), BufferError> {
    let builder = {
      let mut b = tempfile::Builder::new();
      b.prefix("bagweave-");
      b
    };
    let file = match &self.config.spill_dir {
      Some(dir) => builder.tempfile_in(dir)?,
      None => builder.tempfile()?,
    };
    debug!(
      path = %file.path().display(),
      bytes = self.memory.len(),
      records = self.len,
      "spilling buffer to disk"
    );
    let mut writer = BufWriter::new(file);
    writer.write_all(&self.memory)?;
    self.memory = BytesMut::new();
    self.spill = Some(writer);
    Ok(())
  }
}

impl<T> BufferWriter<T> {
  /// Number of records appended.
  pub fn len(&self) -> usize {
    self.len
  }

  /// Returns `true` if nothing was appended.
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Total encoded size in bytes, frame headers included.
  pub fn encoded_len(&self) -> u64 {
    self.encoded_len
  }

  /// Returns `true` once the buffer has moved to a temporary file.
  pub fn is_spilled(&self) -> bool {
    self.spill.is_some()
  }

  /// Ends the writing phase. The writer is consumed, so no further appends are possible.
  pub fn seal(self) -> Result<SealedBuffer<T>, BufferError> {
    let storage = match self.spill {
      Some(writer) => {
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        Storage::Spilled(file)
      }
      None => Storage::Memory(self.memory.freeze()),
    };
    Ok(SealedBuffer {
      inner: Arc::new(Sealed {
        storage,
        len: self.len,
        encoded_len: self.encoded_len,
      }),
      _marker: PhantomData,
    })
  }
}

enum Storage {
  Memory(Bytes),
  Spilled(NamedTempFile),
}

struct Sealed {
  storage: Storage,
  len: usize,
  encoded_len: u64,
}

/// A read-only buffer in its sealed phase.
///
/// Clones share the same storage. A spill file is deleted when the last clone
/// and every reader created from it are dropped.
pub struct SealedBuffer<T> {
  inner: Arc<Sealed>,
  _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SealedBuffer<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      _marker: PhantomData,
    }
  }
}

impl<T> std::fmt::Debug for SealedBuffer<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SealedBuffer")
      .field("len", &self.inner.len)
      .field("encoded_len", &self.inner.encoded_len)
      .field("spilled", &self.is_spilled())
      .finish()
  }
}

impl<T> SealedBuffer<T> {
  /// Number of records in the buffer.
  pub fn len(&self) -> usize {
    self.inner.len
  }

  /// Returns `true` if the buffer holds no records.
  pub fn is_empty(&self) -> bool {
    self.inner.len == 0
  }

  /// Total encoded size in bytes, frame headers included.
  pub fn encoded_len(&self) -> u64 {
    self.inner.encoded_len
  }

  /// Returns `true` if the records live in a temporary file.
  pub fn is_spilled(&self) -> bool {
    matches!(self.inner.storage, Storage::Spilled(_))
  }

  /// Opens a new reader positioned at the first record.
  pub fn reader(&self) -> Result<BufferReader<T>, BufferError> {
    let source = match &self.inner.storage {
      Storage::Memory(bytes) => Source::Memory(bytes.clone()),
      Storage::Spilled(file) => Source::File(BufReader::new(file.reopen()?)),
    };
    Ok(BufferReader {
      _keep_alive: Arc::clone(&self.inner),
      source,
      remaining: self.inner.len,
      offset: 0,
      _marker: PhantomData,
    })
  }
}

impl<T: DeserializeOwned> SealedBuffer<T> {
  /// Reads every record into a vector.
  pub fn to_vec(&self) -> Result<Vec<T>, BufferError> {
    self.reader()?.collect()
  }
}

enum Source {
  Memory(Bytes),
  File(BufReader<File>),
}

/// Independent cursor over a [`SealedBuffer`], yielding records in append order.
///
/// After the first error the reader is fused and yields `None`.
pub struct BufferReader<T> {
  _keep_alive: Arc<Sealed>,
  source: Source,
  remaining: usize,
  offset: u64,
  _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> BufferReader<T> {
  fn read_frame(&mut self) -> Result<T, BufferError> {
    let offset = self.offset;
    let record = match &mut self.source {
      Source::Memory(bytes) => {
        if bytes.remaining() < FRAME_HEADER {
          return Err(BufferError::Corrupt { offset });
        }
        let len = bytes.get_u32_le() as usize;
        if bytes.remaining() < len {
          return Err(BufferError::Corrupt { offset });
        }
        let frame = bytes.split_to(len);
        self.offset += (FRAME_HEADER + len) as u64;
        rmp_serde::from_slice(&frame)?
      }
      Source::File(reader) => {
        let mut header = [0u8; FRAME_HEADER];
        reader.read_exact(&mut header).map_err(|e| corrupt_on_eof(e, offset))?;
        let len = u32::from_le_bytes(header) as usize;
        let mut frame = vec![0u8; len];
        reader.read_exact(&mut frame).map_err(|e| corrupt_on_eof(e, offset))?;
        self.offset += (FRAME_HEADER + len) as u64;
        rmp_serde::from_slice(&frame)?
      }
    };
    Ok(record)
  }
}

fn corrupt_on_eof(e: std::io::Error, offset: u64) -> BufferError {
  if e.kind() == std::io::ErrorKind::UnexpectedEof {
    BufferError::Corrupt { offset }
  } else {
    BufferError::Io(e)
  }
}

impl<T: DeserializeOwned> Iterator for BufferReader<T> {
  type Item = Result<T, BufferError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    match self.read_frame() {
      Ok(record) => {
        self.remaining -= 1;
        Some(Ok(record))
      }
      Err(e) => {
        self.remaining = 0;
        Some(Err(e))
      }
    }
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (0, Some(self.remaining))
  }
}
