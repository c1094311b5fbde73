use crate::channels::ChannelSet;
use crate::error::LoggerError;
use crate::record::epoch_seconds;
use std::time::{Duration, SystemTime};

/// Source of wall-clock time for the bin windows
pub trait Clock: Send {
    fn now(&self) -> SystemTime;
}

/// The system's real-time clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Averages of one closed bin window
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    /// Epoch seconds at which the window was closed
    pub timestamp: u32,
    /// Number of lines that went into the averages
    pub reads: u32,
    /// `(field index, average)` for every selected channel
    pub averages: Vec<(usize, f32)>,
}

/// Accumulates readings of the selected channels over a fixed wall-clock
/// window.
///
/// Each accepted line counts as one read for every channel; a window is
/// closed by the first [`poll`](Self::poll) at or after its end that has at
/// least one read. The next window starts at the moment the previous one
/// was closed, so windows drift by however long the closing line took to
/// arrive.
#[derive(Debug, Clone)]
pub struct BinAccumulator {
    indices: Vec<usize>,
    sums: Vec<u64>,
    reads: u32,
    window: Duration,
    end: SystemTime,
}

impl BinAccumulator {
    pub fn new(channels: &ChannelSet, window: Duration, now: SystemTime) -> Result<Self, LoggerError> {
        if window.is_zero() {
            return Err(LoggerError::InvalidWindow);
        }
        let indices: Vec<usize> = channels.channels().iter().map(|c| c.index).collect();
        Ok(Self {
            sums: vec![0; indices.len()],
            indices,
            reads: 0,
            window,
            end: now + window,
        })
    }

    /// Add one line of readings. `values` is the full line, indexed by field.
    ///
    /// # Panics
    ///
    /// If `values` is shorter than the highest selected field. Lines are
    /// checked against the channel count before they get here.
    pub fn add(&mut self, values: &[u32]) {
        debug_assert!(
            self.indices.iter().all(|&index| index < values.len()),
            "line of {} fields is too short for the selected channels",
            values.len()
        );
        for (sum, &index) in self.sums.iter_mut().zip(&self.indices) {
            *sum += values[index] as u64;
        }
        self.reads += 1;
    }

    /// Close the window if it has ended and holds at least one read.
    pub fn poll(&mut self, now: SystemTime) -> Result<Option<Bin>, LoggerError> {
        if now < self.end || self.reads == 0 {
            return Ok(None);
        }
        let timestamp = epoch_seconds(now)?;
        let reads = self.reads;
        let averages = self
            .indices
            .iter()
            .zip(&self.sums)
            .map(|(&index, &sum)| (index, (sum as f64 / reads as f64) as f32))
            .collect();

        self.sums.iter_mut().for_each(|s| *s = 0);
        self.reads = 0;
        self.end = now + self.window;

        Ok(Some(Bin {
            timestamp,
            reads,
            averages,
        }))
    }

    /// Running sums of the current window, `(field index, sum)`
    pub fn counters(&self) -> Vec<(usize, u64)> {
        self.indices.iter().copied().zip(self.sums.iter().copied()).collect()
    }

    /// Lines read in the current window
    pub fn reads(&self) -> u32 {
        self.reads
    }

    pub fn window_end(&self) -> SystemTime {
        self.end
    }
}
