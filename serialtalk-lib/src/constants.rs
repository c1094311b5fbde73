// Defaults shared by the encoder, the recorder and the decoder

use std::time::Duration;

/// Size of one on-disk record: u32 timestamp + 4-byte value
pub const RECORD_SIZE: usize = 8;

/// Serial port used when none is given
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Baud rate of the command-line encoder
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Baud rate of the interactive recorder
pub const RECORDER_BAUD_RATE: u32 = 115_200;

/// Number of sensors on one serial line for the encoder
pub const DEFAULT_CHANNELS: usize = 10;

/// Number of sensors on one serial line for the recorder
pub const RECORDER_CHANNELS: usize = 12;

/// Length of one bin window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Lines received this long after connecting are discarded
pub const SETTLE_TIME: Duration = Duration::from_millis(1500);

/// Serial read timeout; a timeout is not an error
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Wait between reconnect attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Suffix appended to a channel file name by the decoder
pub const PARSED_SUFFIX: &str = "_parsed.txt";

/// Bar height of an actogram point relative to its row
pub const ACTOGRAM_SCALE: f64 = 0.9;
