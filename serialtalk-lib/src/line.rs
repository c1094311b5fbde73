//! Parsing of the tab-separated serial line.
//!
//! The microcontroller prints one line per sampling tick, one field per
//! sensor, fields separated by a single tab:
//!
//! ```text
//! 0\t1\t0\t0\t1\t0\t0\t0\t0\t0\r\n
//! ```
//!
//! The line is not versioned or self-describing. The only check available
//! is the number of fields, which must match the configured channel count.

use crate::error::LoggerError;
use crate::sensor::SensorKind;

/// Parse one raw line into its integer fields.
///
/// Surrounding whitespace (including the `\r\n` terminator) is ignored.
/// Any field that is not an integer in the sensor's radix invalidates the
/// whole line.
pub fn parse_line(line: &[u8], kind: SensorKind) -> Result<Vec<u32>, LoggerError> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Err(LoggerError::InvalidLine("empty line".to_string()));
    }

    trimmed
        .split(|&b| b == b'\t')
        .enumerate()
        .map(|(i, field)| parse_field(field, kind.radix()).ok_or_else(|| invalid_field(i, field)))
        .collect()
}

/// Parse a line and check that it carries exactly `expected` fields.
pub fn parse_line_checked(line: &[u8], kind: SensorKind, expected: usize) -> Result<Vec<u32>, LoggerError> {
    let values = parse_line(line, kind)?;
    if values.len() != expected {
        return Err(LoggerError::ChannelCount {
            expected,
            actual: values.len(),
        });
    }
    Ok(values)
}

fn parse_field(field: &[u8], radix: u32) -> Option<u32> {
    let text = std::str::from_utf8(field.trim_ascii()).ok()?;
    let text = text.strip_prefix('+').unwrap_or(text);
    if text.is_empty() || text.starts_with(['+', '-']) {
        return None;
    }
    u32::from_str_radix(text, radix).ok()
}

fn invalid_field(index: usize, field: &[u8]) -> LoggerError {
    LoggerError::InvalidLine(format!(
        "field {} is not a number: {:?}",
        index + 1,
        String::from_utf8_lossy(field)
    ))
}
