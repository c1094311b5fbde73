use crate::channels::{Channel, ChannelSet};
use crate::constants::{PARSED_SUFFIX, RECORD_SIZE};
use crate::error::LoggerError;
use crate::record::{Record, Value};
use crate::sensor::SensorKind;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// How timestamps are written to the decoded file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFormat {
    /// Unix epoch seconds
    #[default]
    Epoch,
    /// `%Y-%m-%d %H:%M:%S` in the local time zone. Beware of daylight
    /// saving changes: an hour repeats once a year.
    Local,
}

/// Result of decoding one channel file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeOutcome {
    pub channel: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    /// `None` if the input file does not exist
    pub records: Option<usize>,
}

/// Read every record of a channel file.
///
/// Trailing bytes that do not form a whole record (a write cut short by a
/// power loss) are logged and ignored.
pub fn read_records(path: &Path, kind: SensorKind) -> Result<Vec<Record>, LoggerError> {
    let file = File::open(path)?;
    read_records_from(&mut BufReader::new(file), kind)
}

/// Read records from a stream until it ends, ignoring a partial tail
pub fn read_records_from(rdr: &mut impl Read, kind: SensorKind) -> Result<Vec<Record>, LoggerError> {
    let mut records = Vec::new();
    let mut offset = 0u64;
    loop {
        match Record::read_from(rdr, kind, offset) {
            Ok(Some(record)) => {
                records.push(record);
                offset += RECORD_SIZE as u64;
            }
            Ok(None) => break,
            Err(e @ LoggerError::TruncatedRecord { .. }) => {
                warn!("Ignoring partial record: {}", e);
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(records)
}

/// Name of the decoded text file for a channel file
pub fn parsed_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(PARSED_SUFFIX);
    PathBuf::from(name)
}

/// Format a timestamp for the decoded file
pub fn format_time<Tz: TimeZone>(timestamp: u32, format: TimeFormat, tz: &Tz) -> Result<String, LoggerError>
where
    Tz::Offset: std::fmt::Display,
{
    match format {
        TimeFormat::Epoch => Ok(timestamp.to_string()),
        TimeFormat::Local => {
            let utc = DateTime::from_timestamp(timestamp as i64, 0)
                .ok_or(LoggerError::TimestampOutOfRange(timestamp as i64))?;
            Ok(utc.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string())
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Average(v) => format!("{:.6}", v),
        Value::Count(c) => c.to_string(),
    }
}

/// Write records as comma-separated text with a header row
pub fn write_csv<W: Write, Tz: TimeZone>(
    records: &[Record],
    wtr: W,
    kind: SensorKind,
    format: TimeFormat,
    tz: &Tz,
) -> Result<(), LoggerError>
where
    Tz::Offset: std::fmt::Display,
{
    let mut csv = csv::Writer::from_writer(wtr);
    csv.write_record(kind.csv_header())?;
    for record in records {
        csv.write_record([format_time(record.timestamp, format, tz)?, format_value(&record.value)])?;
    }
    csv.flush()?;
    Ok(())
}

/// Decode one channel file into `parsed_path(input)`.
///
/// Returns `Ok(None)` if the input does not exist.
pub fn decode_file(input: &Path, kind: SensorKind, format: TimeFormat) -> Result<Option<usize>, LoggerError> {
    let records = match read_records(input, kind) {
        Ok(records) => records,
        Err(LoggerError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let output = parsed_path(input);
    let file = File::create(&output).map_err(|source| LoggerError::Write {
        path: output.clone(),
        source,
    })?;
    write_csv(&records, io::BufWriter::new(file), kind, format, &Local)?;
    Ok(Some(records.len()))
}

/// Decode every channel file of a set, skipping missing files
pub fn decode_channels(
    channels: &ChannelSet,
    kind: SensorKind,
    format: TimeFormat,
) -> Result<Vec<DecodeOutcome>, LoggerError> {
    channels
        .channels()
        .iter()
        .map(|channel| decode_channel(channel, kind, format))
        .collect()
}

fn decode_channel(channel: &Channel, kind: SensorKind, format: TimeFormat) -> Result<DecodeOutcome, LoggerError> {
    let output = parsed_path(&channel.path);
    info!("Working on file: {}", output.display());
    let records = decode_file(&channel.path, kind, format)?;
    if records.is_none() {
        warn!("File not found: {}", channel.path.display());
    }
    Ok(DecodeOutcome {
        channel: channel.number(),
        input: channel.path.clone(),
        output,
        records,
    })
}
