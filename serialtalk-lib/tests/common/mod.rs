//! Common test utilities: a stepping clock and a scripted serial link

// Not every test file uses every helper
#![allow(dead_code)]

use serialtalk_lib::error::LoggerError;
use serialtalk_lib::ingest::IngestConfig;
use serialtalk_lib::serial::Connector;
use serialtalk_lib::window::Clock;
use serialtalk_lib::SensorKind;
use std::collections::VecDeque;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// 2023-11-14 22:13:20 UTC
pub const T0: u32 = 1_700_000_000;

/// 2024-01-01 00:00:00 UTC, a Monday
pub const JAN_1_2024: u32 = 1_704_067_200;

pub const HOUR: u32 = 3600;
pub const DAY: u32 = 24 * HOUR;

/// Clock that returns `start`, then advances by `step` on every call
#[derive(Debug, Clone)]
pub struct StepClock {
    next: Arc<AtomicU64>,
    step: u64,
}

impl StepClock {
    pub fn new(start: u32, step: Duration) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(start as u64)),
            step: step.as_secs(),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> SystemTime {
        let secs = self.next.fetch_add(self.step, Ordering::SeqCst);
        UNIX_EPOCH + Duration::from_secs(secs)
    }
}

/// Serves one in-memory stream per connect. When the script runs out it
/// clears the running flag, as a user pressing stop would.
pub struct ScriptedConnector {
    streams: VecDeque<Vec<u8>>,
    running: Arc<AtomicBool>,
    pub connects: usize,
}

impl ScriptedConnector {
    pub fn new(streams: &[&str], running: Arc<AtomicBool>) -> Self {
        Self {
            streams: streams.iter().map(|s| s.as_bytes().to_vec()).collect(),
            running,
            connects: 0,
        }
    }
}

impl Connector for ScriptedConnector {
    type Stream = Cursor<Vec<u8>>;

    fn connect(&mut self) -> Result<Self::Stream, LoggerError> {
        self.connects += 1;
        match self.streams.pop_front() {
            Some(bytes) => Ok(Cursor::new(bytes)),
            None => {
                self.running.store(false, Ordering::SeqCst);
                Err(LoggerError::Disconnected)
            }
        }
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

/// Opens every time but the stream ends at once, like a board stuck in
/// reset. Clears the running flag after `limit` connects so a test cannot
/// hang.
pub struct FlappingConnector {
    running: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
    limit: usize,
}

impl FlappingConnector {
    pub fn new(running: Arc<AtomicBool>, limit: usize) -> Self {
        Self {
            running,
            connects: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    /// Shared count of `connect` calls, readable after the ingestor took
    /// ownership of the connector
    pub fn connects(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connects)
    }
}

impl Connector for FlappingConnector {
    type Stream = Cursor<Vec<u8>>;

    fn connect(&mut self) -> Result<Self::Stream, LoggerError> {
        if self.connects.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            self.running.store(false, Ordering::SeqCst);
        }
        Ok(Cursor::new(Vec::new()))
    }

    fn name(&self) -> String {
        "flapping".to_string()
    }
}

/// Stream that holds each chunk back until `delay` after it was opened,
/// timing out meanwhile like an idle serial port
pub struct PacedStream {
    opened: Instant,
    chunks: VecDeque<(Duration, Vec<u8>)>,
}

impl Read for PacedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some((delay, _)) = self.chunks.front() else {
            return Ok(0);
        };
        if self.opened.elapsed() < *delay {
            std::thread::sleep(Duration::from_millis(1));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
        }
        let Some((delay, mut bytes)) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        if n < bytes.len() {
            self.chunks.push_front((delay, bytes.split_off(n)));
        }
        Ok(n)
    }
}

/// Serves one [`PacedStream`] per connect, then stops like
/// [`ScriptedConnector`]
pub struct PacedConnector {
    sessions: VecDeque<Vec<(Duration, &'static str)>>,
    running: Arc<AtomicBool>,
}

impl PacedConnector {
    pub fn new(sessions: Vec<Vec<(Duration, &'static str)>>, running: Arc<AtomicBool>) -> Self {
        Self {
            sessions: sessions.into(),
            running,
        }
    }
}

impl Connector for PacedConnector {
    type Stream = PacedStream;

    fn connect(&mut self) -> Result<Self::Stream, LoggerError> {
        match self.sessions.pop_front() {
            Some(chunks) => Ok(PacedStream {
                opened: Instant::now(),
                chunks: chunks.into_iter().map(|(d, s)| (d, s.as_bytes().to_vec())).collect(),
            }),
            None => {
                self.running.store(false, Ordering::SeqCst);
                Err(LoggerError::Disconnected)
            }
        }
    }

    fn name(&self) -> String {
        "paced".to_string()
    }
}

/// Configuration with every delay removed
pub fn fast_config(kind: SensorKind, window: Duration) -> IngestConfig {
    IngestConfig {
        kind,
        window,
        settle: Duration::ZERO,
        reconnect_delay: Duration::ZERO,
        max_reconnects: None,
    }
}
