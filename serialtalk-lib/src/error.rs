use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for the `serialtalk-lib` library.
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid line: {0}")]
    InvalidLine(String),

    #[error("Channel count mismatch: expected {expected} fields, got {actual}")]
    ChannelCount { expected: usize, actual: usize },

    #[error("Invalid channel {number}: must be between 1 and {max}")]
    InvalidChannel { number: usize, max: usize },

    #[error("Channel {0} selected more than once")]
    DuplicateChannel(usize),

    #[error("Bin window must be longer than zero")]
    InvalidWindow,

    #[error("Truncated record at offset {offset}: {len} trailing bytes")]
    TruncatedRecord { offset: u64, len: usize },

    #[error("Timestamp {0} cannot be represented")]
    TimestampOutOfRange(i64),

    #[error("Serial stream closed")]
    Disconnected,
}

impl LoggerError {
    /// Errors the ingestion loop recovers from by reconnecting.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            LoggerError::Io(_) | LoggerError::Serial(_) | LoggerError::Disconnected
        )
    }
}
