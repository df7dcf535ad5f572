use std::io;

use thiserror::Error;

/// Failures reported by the block allocator, the priority queue and the
/// ring buffer.
///
/// Recoverable exhaustion (a full queue, a full or empty ring buffer) is
/// not represented here: those are ordinary return values.
#[derive(Debug, Error)]
pub enum Error {
  #[error("zero-length request")]
  ZeroLength,

  #[error("capacity {capacity} is below the minimum of {minimum}")]
  CapacityTooSmall { capacity: usize, minimum: usize },

  #[error("no block can hold {requested} bytes and growth is disabled")]
  Exhausted { requested: usize },

  #[error("size {requested} overflows when rounded to the page size")]
  SizeOverflow { requested: usize },

  #[error("out of memory (requested: {size} bytes)")]
  OutOfMemory { size: usize },

  #[error("failed to map {size} bytes: {source}")]
  Map {
    size: usize,
    #[source]
    source: io::Error,
  },

  #[error("{what} is not supported on this platform or backing")]
  Unsupported { what: &'static str },
}

impl Error {
  /// Builds an [`Error::Map`] from the calling thread's `errno`.
  pub(crate) fn last_os(
    size: usize,
  ) -> Self {
    Error::Map {
      size,
      source: io::Error::last_os_error(),
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;
