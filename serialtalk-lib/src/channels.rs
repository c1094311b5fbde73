use crate::error::LoggerError;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One sensor on the serial line and the file its records go to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// 0-based position of the field on the serial line
    pub index: usize,
    pub path: PathBuf,
}

impl Channel {
    /// 1-based number shown to the user
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// The channels being logged out of a line of `field_count` fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSet {
    field_count: usize,
    channels: Vec<Channel>,
}

impl ChannelSet {
    /// Select every field, naming files `template` + 2-digit channel number.
    ///
    /// `from_template("pir_n_", 3)` logs to `pir_n_01`, `pir_n_02`, `pir_n_03`.
    pub fn from_template(template: &str, field_count: usize) -> Self {
        let channels = (0..field_count)
            .map(|index| Channel {
                index,
                path: template_path(template, index + 1),
            })
            .collect();
        Self { field_count, channels }
    }

    /// Select a subset of fields, each with its own file.
    ///
    /// `selection` holds 1-based channel numbers. The resulting set is
    /// ordered by channel number.
    pub fn from_selection(
        field_count: usize,
        selection: impl IntoIterator<Item = (usize, PathBuf)>,
    ) -> Result<Self, LoggerError> {
        let mut seen = HashSet::new();
        let mut channels = Vec::new();
        for (number, path) in selection {
            if number == 0 || number > field_count {
                return Err(LoggerError::InvalidChannel {
                    number,
                    max: field_count,
                });
            }
            if !seen.insert(number) {
                return Err(LoggerError::DuplicateChannel(number));
            }
            channels.push(Channel {
                index: number - 1,
                path,
            });
        }
        channels.sort_by_key(|c| c.index);
        Ok(Self { field_count, channels })
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Empty every channel file, creating missing ones
    pub fn truncate_all(&self) -> Result<(), LoggerError> {
        for channel in &self.channels {
            File::create(&channel.path).map_err(|source| LoggerError::Write {
                path: channel.path.clone(),
                source,
            })?;
            info!("Truncated {}", channel.path.display());
        }
        Ok(())
    }

    /// Append one record to the file of `channel`.
    ///
    /// The file is opened per write so that it can be moved or copied
    /// between bins while logging runs.
    pub fn append(&self, channel: &Channel, record: &Record) -> Result<(), LoggerError> {
        append_records(&channel.path, std::slice::from_ref(record))
    }
}

/// File name of channel `number` (1-based) for a template
pub fn template_path(template: &str, number: usize) -> PathBuf {
    PathBuf::from(format!("{}{:02}", template, number))
}

/// Append records to a channel file, creating it if needed
pub fn append_records(path: &Path, records: &[Record]) -> Result<(), LoggerError> {
    let write = || -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut wtr = BufWriter::new(file);
        for record in records {
            record.write_to(&mut wtr)?;
        }
        wtr.flush()
    };
    write().map_err(|source| LoggerError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Appended {} record(s) to {}", records.len(), path.display());
    Ok(())
}
