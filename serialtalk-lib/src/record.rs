//! The on-disk record format.
//!
//! A channel file is a bare concatenation of 8-byte records, no header:
//!
//! | offset | size | field                                         |
//! |--------|------|-----------------------------------------------|
//! | 0      | 4    | `u32` Unix timestamp, seconds                 |
//! | 4      | 4    | `f32` window average (PIR) or `u32` count (wheel) |
//!
//! Both fields are little-endian. The file does not say which sensor kind
//! wrote it; the reader has to be told.

use crate::constants::RECORD_SIZE;
use crate::error::LoggerError;
use crate::sensor::SensorKind;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Payload of one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Mean activity over a bin window
    Average(f32),
    /// Raw rotation count of one serial line
    Count(u32),
}

impl Value {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Average(v) => v as f64,
            Value::Count(c) => c as f64,
        }
    }

    pub fn kind(&self) -> SensorKind {
        match self {
            Value::Average(_) => SensorKind::Pir,
            Value::Count(_) => SensorKind::Wheel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: u32,
    pub value: Value,
}

impl Record {
    pub fn average(timestamp: u32, average: f32) -> Self {
        Self {
            timestamp,
            value: Value::Average(average),
        }
    }

    pub fn count(timestamp: u32, count: u32) -> Self {
        Self {
            timestamp,
            value: Value::Count(count),
        }
    }

    /// Append the 8-byte encoding of this record to `wtr`
    pub fn write_to(&self, wtr: &mut impl Write) -> io::Result<()> {
        wtr.write_u32::<LittleEndian>(self.timestamp)?;
        match self.value {
            Value::Average(v) => wtr.write_f32::<LittleEndian>(v),
            Value::Count(c) => wtr.write_u32::<LittleEndian>(c),
        }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        // Writing into a fixed slice of exactly RECORD_SIZE bytes cannot fail
        let _ = self.write_to(&mut &mut buf[..]);
        buf
    }

    /// Decode one record from exactly 8 bytes
    pub fn from_bytes(bytes: &[u8], kind: SensorKind) -> Result<Self, LoggerError> {
        if bytes.len() != RECORD_SIZE {
            return Err(LoggerError::TruncatedRecord {
                offset: 0,
                len: bytes.len(),
            });
        }
        let mut rdr = bytes;
        let timestamp = rdr.read_u32::<LittleEndian>()?;
        let value = match kind {
            SensorKind::Pir => Value::Average(rdr.read_f32::<LittleEndian>()?),
            SensorKind::Wheel => Value::Count(rdr.read_u32::<LittleEndian>()?),
        };
        Ok(Self { timestamp, value })
    }

    /// Read the next record from a stream.
    ///
    /// Returns `Ok(None)` at a clean end of stream and
    /// [`LoggerError::TruncatedRecord`] when the stream ends inside a record.
    /// `offset` is only used for the error report.
    pub fn read_from(rdr: &mut impl Read, kind: SensorKind, offset: u64) -> Result<Option<Self>, LoggerError> {
        let mut buf = [0u8; RECORD_SIZE];
        let mut filled = 0;
        while filled < RECORD_SIZE {
            match rdr.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            RECORD_SIZE => Self::from_bytes(&buf, kind).map(Some),
            len => Err(LoggerError::TruncatedRecord { offset, len }),
        }
    }
}

/// Current wall-clock time as a record timestamp
pub fn epoch_seconds(time: SystemTime) -> Result<u32, LoggerError> {
    let secs = match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    };
    u32::try_from(secs).map_err(|_| LoggerError::TimestampOutOfRange(secs))
}
