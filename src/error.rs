//! Error types for buffer and registry operations
//!
//! Every operation reports synchronously to the immediate caller; there is no
//! internal retry. Rejected operations leave the buffer's cursor state
//! unchanged, except for file transfer failures, which drop the cached file
//! association so the next call re-establishes it.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for buffer operations
#[derive(Debug, Error)]
pub enum BufferError {
    /// Malformed argument: out-of-bounds window, out-of-range cursor setter,
    /// non-positive read count, or an argument of the wrong shape
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Append would exceed the writable window
    #[error("buffer overflow: {requested} bytes requested, {remaining} remaining")]
    Overflow { requested: usize, remaining: usize },

    /// Operation is not legal in the current cursor state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Wrong number of arguments for a registered operation
    #[error("expected {expected} arguments, got {got}")]
    InvalidArgCount { expected: usize, got: usize },

    /// No buffer is stored under this handle
    #[error("handle {0} not found")]
    HandleNotFound(u64),

    /// File open/read/write failed; the underlying cause is preserved
    #[error("io failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;
