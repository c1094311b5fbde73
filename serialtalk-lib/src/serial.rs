use crate::constants::{DEFAULT_BAUD_RATE, DEFAULT_PORT, READ_TIMEOUT};
use crate::error::LoggerError;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serialport::{SerialPort, SerialPortType};
use std::io::{self, Read};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Size of one read from the underlying stream
const READ_CHUNK: usize = 256;

/// Settings of the serial link to the microcontroller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: READ_TIMEOUT,
        }
    }
}

/// Something that can (re)open the byte stream carrying sensor lines
pub trait Connector: Send {
    type Stream: Read + Send;

    fn connect(&mut self) -> Result<Self::Stream, LoggerError>;

    /// Human-readable name of the endpoint, for logs
    fn name(&self) -> String;
}

/// Opens a real serial port, 8N1 without flow control
#[derive(Debug, Clone)]
pub struct SerialConnector {
    settings: SerialSettings,
}

impl SerialConnector {
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

impl Connector for SerialConnector {
    type Stream = Box<dyn SerialPort>;

    fn connect(&mut self) -> Result<Self::Stream, LoggerError> {
        info!(
            port = %self.settings.port,
            baud = self.settings.baud_rate,
            "Opening serial port"
        );
        let port = serialport::new(&self.settings.port, self.settings.baud_rate)
            .timeout(self.settings.timeout)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()?;
        Ok(port)
    }

    fn name(&self) -> String {
        self.settings.port.clone()
    }
}

/// Description of one serial port found on the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDescription {
    pub name: String,
    pub kind: String,
}

/// List serial ports, USB ports annotated with their product string
pub fn available_ports() -> Result<Vec<PortDescription>, LoggerError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let kind = match &p.port_type {
                SerialPortType::UsbPort(usb) => format!(
                    "USB {:04x}:{:04x} {}",
                    usb.vid,
                    usb.pid,
                    usb.product.as_deref().unwrap_or("")
                )
                .trim_end()
                .to_string(),
                SerialPortType::PciPort => "PCI".to_string(),
                SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                SerialPortType::Unknown => "Unknown".to_string(),
            };
            PortDescription { name: p.port_name, kind }
        })
        .collect())
}

/// Splits a byte stream into `\n`-terminated lines.
pub struct LineReader<R> {
    inner: R,
    buf: BytesMut,
    eof: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
            eof: false,
        }
    }

    /// Read the next line, terminator included.
    ///
    /// Returns `Ok(None)` when the read timed out before a full line
    /// arrived. At end of stream a final unterminated line is returned once,
    /// then [`LoggerError::Disconnected`].
    pub fn read_line(&mut self) -> Result<Option<Bytes>, LoggerError> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                return Ok(Some(self.buf.split_to(pos + 1).freeze()));
            }
            if self.eof {
                if self.buf.is_empty() {
                    return Err(LoggerError::Disconnected);
                }
                return Ok(Some(self.buf.split().freeze()));
            }

            let mut chunk = [0u8; READ_CHUNK];
            match self.inner.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(None);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Discard every line arriving within `duration`.
    ///
    /// The microcontroller prints boot noise and half lines right after the
    /// port opens and resets it. Returns the number of discarded lines.
    pub fn settle(&mut self, duration: Duration) -> Result<usize, LoggerError> {
        let start = Instant::now();
        let mut discarded = 0;
        while start.elapsed() < duration {
            if let Some(line) = self.read_line()? {
                debug!("Discarding startup line: {}", hex::encode(&line));
                discarded += 1;
            }
        }
        Ok(discarded)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
