//! The serial ingestion loop.
//!
//! One blocking thread owns the serial connection. It reads lines, feeds
//! them to a [`BinAccumulator`] (PIR) or writes them straight through
//! (wheels), and appends records to the channel files. The loop runs until
//! its shared running flag is cleared.
//!
//! There is no negotiation with the microcontroller: on any I/O failure
//! the port is closed, reopened after a fixed delay and the loop carries on
//! with whatever window it was accumulating.

use crate::channels::ChannelSet;
use crate::constants::{DEFAULT_WINDOW, RECONNECT_DELAY, SETTLE_TIME};
use crate::error::LoggerError;
use crate::line::parse_line_checked;
use crate::record::{Record, epoch_seconds};
use crate::sensor::SensorKind;
use crate::serial::{Connector, LineReader};
use crate::window::{Bin, BinAccumulator, Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub kind: SensorKind,
    /// Bin window length, PIR only
    pub window: Duration,
    /// Lines arriving this long after (re)connecting are dropped
    pub settle: Duration,
    pub reconnect_delay: Duration,
    /// Reconnect attempts without an accepted line in between before giving
    /// up; `None` retries forever
    pub max_reconnects: Option<u32>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::Pir,
            window: DEFAULT_WINDOW,
            settle: SETTLE_TIME,
            reconnect_delay: RECONNECT_DELAY,
            max_reconnects: None,
        }
    }
}

/// Progress notifications sent while logging runs
#[derive(Debug, Clone, PartialEq)]
pub enum LoggerEvent {
    Connected {
        port: String,
        discarded: usize,
    },
    /// An accepted line. `counters` holds `(field index, running total)` of
    /// the selected channels: the current window's sums for PIR, the
    /// session totals for wheels.
    Reading {
        values: Vec<u32>,
        counters: Vec<(usize, u64)>,
    },
    Rejected {
        reason: String,
    },
    BinWritten(Bin),
    CountsWritten {
        timestamp: u32,
        counts: Vec<(usize, u32)>,
    },
    Reconnecting {
        attempt: u32,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Lines accepted
    pub lines: u64,
    /// Lines dropped as malformed or of the wrong width
    pub rejected: u64,
    /// Records appended across all channel files
    pub records: u64,
    pub reconnects: u32,
    /// Reads in the window that was open at shutdown and never written
    pub discarded_reads: u32,
}

pub struct Ingestor<C, K = SystemClock> {
    connector: C,
    clock: K,
    channels: ChannelSet,
    config: IngestConfig,
    running: Arc<AtomicBool>,
    events: Option<UnboundedSender<LoggerEvent>>,
    accumulator: Option<BinAccumulator>,
    totals: Vec<u64>,
    summary: IngestSummary,
}

impl<C: Connector> Ingestor<C, SystemClock> {
    pub fn new(connector: C, channels: ChannelSet, config: IngestConfig) -> Self {
        Self {
            connector,
            clock: SystemClock,
            totals: vec![0; channels.len()],
            channels,
            config,
            running: Arc::new(AtomicBool::new(true)),
            events: None,
            accumulator: None,
            summary: IngestSummary::default(),
        }
    }
}

impl<C: Connector, K: Clock> Ingestor<C, K> {
    pub fn with_clock<K2: Clock>(self, clock: K2) -> Ingestor<C, K2> {
        Ingestor {
            connector: self.connector,
            clock,
            channels: self.channels,
            config: self.config,
            running: self.running,
            events: self.events,
            accumulator: self.accumulator,
            totals: self.totals,
            summary: self.summary,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<LoggerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Share an existing running flag, e.g. one toggled by a stop button
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Flag that keeps the loop going; store `false` to stop it
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn emit(&self, event: LoggerEvent) {
        if let Some(tx) = &self.events {
            // The receiver going away must not stop the logging
            let _ = tx.send(event);
        }
    }

    /// Run until the running flag is cleared.
    ///
    /// Failing to open the port the first time is an error; later failures
    /// are retried.
    pub fn run(mut self) -> Result<IngestSummary, LoggerError> {
        if self.config.kind.is_binned() && self.config.window.is_zero() {
            return Err(LoggerError::InvalidWindow);
        }

        let mut stream = self.connector.connect()?;
        // Failed attempts since the last session that delivered a line. A
        // port that opens and drops at once counts as a failure too.
        let mut failures = 0u32;
        'sessions: loop {
            let mut reader = LineReader::new(stream);
            let lines_before = self.summary.lines;
            let err = match self.session(&mut reader) {
                Ok(()) => break,
                Err(e) if e.is_connection_error() => e,
                Err(e) => return Err(e),
            };
            warn!("Lost connection to {}: {}", self.connector.name(), err);
            if self.summary.lines > lines_before {
                failures = 0;
            }

            stream = loop {
                if !self.is_running() {
                    break 'sessions;
                }
                failures += 1;
                if self.config.max_reconnects.is_some_and(|max| failures > max) {
                    return Err(err);
                }
                self.summary.reconnects += 1;
                self.emit(LoggerEvent::Reconnecting {
                    attempt: failures,
                    reason: err.to_string(),
                });
                std::thread::sleep(self.config.reconnect_delay);
                match self.connector.connect() {
                    Ok(s) => break s,
                    Err(e) => warn!("Reconnect attempt {} failed: {}", failures, e),
                }
            };
        }

        Ok(self.finish())
    }

    fn session<R: Read>(&mut self, reader: &mut LineReader<R>) -> Result<(), LoggerError> {
        let discarded = reader.settle(self.config.settle)?;
        info!("Connected to {}, discarded {} startup line(s)", self.connector.name(), discarded);
        self.emit(LoggerEvent::Connected {
            port: self.connector.name(),
            discarded,
        });

        if self.config.kind.is_binned() && self.accumulator.is_none() {
            self.accumulator = Some(BinAccumulator::new(
                &self.channels,
                self.config.window,
                self.clock.now(),
            )?);
        }

        while self.is_running() {
            if let Some(line) = reader.read_line()? {
                self.handle_line(&line)?;
            }
            if let Some(acc) = self.accumulator.as_mut() {
                if let Some(bin) = acc.poll(self.clock.now())? {
                    self.write_bin(bin)?;
                }
            }
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &[u8]) -> Result<(), LoggerError> {
        let values = match parse_line_checked(line, self.config.kind, self.channels.field_count()) {
            Ok(values) => values,
            Err(e @ (LoggerError::InvalidLine(_) | LoggerError::ChannelCount { .. })) => {
                debug!(line = %hex::encode(line), "Rejected line: {}", e);
                self.summary.rejected += 1;
                self.emit(LoggerEvent::Rejected { reason: e.to_string() });
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.summary.lines += 1;
        debug!("Reading: {:?}", values);

        let counters = match self.accumulator.as_mut() {
            Some(acc) => {
                acc.add(&values);
                acc.counters()
            }
            None => {
                self.write_counts(&values)?;
                self.channels
                    .channels()
                    .iter()
                    .map(|c| c.index)
                    .zip(self.totals.iter().copied())
                    .collect()
            }
        };
        self.emit(LoggerEvent::Reading { values, counters });
        Ok(())
    }

    fn write_bin(&mut self, bin: Bin) -> Result<(), LoggerError> {
        for (channel, &(_, average)) in self.channels.channels().iter().zip(&bin.averages) {
            self.channels.append(channel, &Record::average(bin.timestamp, average))?;
            self.summary.records += 1;
        }
        info!(
            timestamp = bin.timestamp,
            reads = bin.reads,
            "Wrote bin for {} channel(s)",
            bin.averages.len()
        );
        self.emit(LoggerEvent::BinWritten(bin));
        Ok(())
    }

    fn write_counts(&mut self, values: &[u32]) -> Result<(), LoggerError> {
        let timestamp = epoch_seconds(self.clock.now())?;
        let mut counts = Vec::with_capacity(self.channels.len());
        for (channel, total) in self.channels.channels().iter().zip(self.totals.iter_mut()) {
            let count = values[channel.index];
            self.channels.append(channel, &Record::count(timestamp, count))?;
            *total += count as u64;
            counts.push((channel.index, count));
        }
        self.summary.records += counts.len() as u64;
        self.emit(LoggerEvent::CountsWritten { timestamp, counts });
        Ok(())
    }

    fn finish(mut self) -> IngestSummary {
        if let Some(acc) = &self.accumulator {
            if acc.reads() > 0 {
                info!("Discarding unfinished window of {} read(s)", acc.reads());
                self.summary.discarded_reads = acc.reads();
            }
        }
        self.summary
    }
}
