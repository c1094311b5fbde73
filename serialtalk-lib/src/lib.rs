pub mod actogram;
pub mod channels;
pub mod constants;
pub mod decode;
pub mod error;
pub mod ingest;
pub mod line;
pub mod record;
pub mod sensor;
pub mod serial;
pub mod window;

// Re-export the types most callers need
pub use actogram::Actogram;
pub use channels::{Channel, ChannelSet};
pub use decode::TimeFormat;
pub use error::LoggerError;
pub use ingest::{IngestConfig, IngestSummary, Ingestor, LoggerEvent};
pub use record::{Record, Value};
pub use sensor::SensorKind;
pub use serial::{Connector, LineReader, SerialConnector, SerialSettings};
pub use window::{Bin, BinAccumulator, Clock, SystemClock};
