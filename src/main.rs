use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use serialtalk_lib::SensorKind;
use serialtalk_lib::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_CHANNELS, DEFAULT_PORT, RECORDER_BAUD_RATE, RECORDER_CHANNELS,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

mod commands;
mod logging;

/// Read sensor lines from a microcontroller's serial port, store them as
/// per-channel binary files and decode those files back to text.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the serial port and encode incoming lines to one file per channel.
    ///
    /// PIR readings are averaged over each bin window; wheel counts are
    /// stored line by line.
    Encode(EncodeArgs),
    /// Log a chosen subset of channels, each to a file of its own.
    Record(RecordArgs),
    /// Decode channel files to comma-separated text, optionally drawing actograms.
    Decode(DecodeArgs),
    /// List the serial ports found on this machine.
    Ports,
}

#[derive(Args, Debug)]
struct LinkArgs {
    /// Serial port of the microcontroller.
    #[arg(short, long, default_value = DEFAULT_PORT)]
    port: String,
    /// Size of the bin window in seconds (PIR only).
    #[arg(short, long, default_value_t = 60)]
    winsize: u64,
    /// Sensor array on the serial line: pir or wheel.
    #[arg(long, default_value = "pir")]
    sensor: SensorKind,
    /// Truncate the output files before logging.
    #[arg(short, long)]
    destructive: bool,
    /// Give up after this many reconnects without a reading in between (default: never).
    #[arg(long)]
    max_reconnects: Option<u32>,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[command(flatten)]
    link: LinkArgs,
    /// Baud rate of the serial link.
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baudrate: u32,
    /// Number of sensors on the serial line.
    #[arg(short = 'n', long = "n-channels", default_value_t = DEFAULT_CHANNELS)]
    channels: usize,
    /// Initial part of the output names; channel numbers are appended
    /// (pir_n_ -> pir_n_04). Defaults to pir_n_ or wheel_n_.
    #[arg(short, long)]
    template: Option<String>,
}

#[derive(Args, Debug)]
struct RecordArgs {
    #[command(flatten)]
    link: LinkArgs,
    /// Baud rate of the serial link.
    #[arg(short, long, default_value_t = RECORDER_BAUD_RATE)]
    baudrate: u32,
    /// Number of sensors on the serial line.
    #[arg(short = 'n', long = "n-channels", default_value_t = RECORDER_CHANNELS)]
    channels: usize,
    /// Channel to log and its output file, as NUMBER=PATH. Repeat for each channel.
    #[arg(short, long = "channel", value_parser = parse_channel, required = true)]
    channel: Vec<(usize, PathBuf)>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Number of channel files to decode.
    #[arg(short = 'n', long = "n-channels", default_value_t = DEFAULT_CHANNELS)]
    channels: usize,
    /// Initial part of the channel file names. Defaults to pir_n_ or wheel_n_.
    #[arg(short, long)]
    template: Option<String>,
    /// Sensor array that wrote the files: pir or wheel.
    #[arg(long, default_value = "pir")]
    sensor: SensorKind,
    /// Write timestamps in local time rather than Unix epoch seconds.
    /// Beware of daylight saving time.
    #[arg(short, long)]
    localtime: bool,
    /// Print an actogram of every channel after decoding.
    #[arg(short, long)]
    draw: bool,
    /// Bin size of the actogram display in minutes (0 keeps every record).
    #[arg(short, long, default_value_t = 0)]
    bin_display: u64,
    /// Width of the actogram's 48-hour rows in characters.
    #[arg(long, default_value_t = 96)]
    columns: usize,
}

/// Parse `NUMBER=PATH`
fn parse_channel(s: &str) -> Result<(usize, PathBuf), String> {
    let (number, path) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid channel '{}': expected NUMBER=PATH", s))?;
    let number = number
        .trim()
        .parse()
        .map_err(|e| format!("invalid channel number '{}': {}", number, e))?;
    if path.is_empty() {
        return Err(format!("missing file name for channel {}", number));
    }
    Ok((number, PathBuf::from(path)))
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Encode(args) => commands::encode(args).await,
        Command::Record(args) => commands::record(args).await,
        Command::Decode(args) => commands::decode(args),
        Command::Ports => commands::ports(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let guard = match logging::setup_logging(cli.log_file, &cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    };
    // Flush the log file before the process ends
    drop(guard);
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn channel_argument_splits_on_first_equals() {
        assert_eq!(parse_channel("3=cage=3.bin"), Ok((3, PathBuf::from("cage=3.bin"))));
        assert!(parse_channel("3").is_err());
        assert!(parse_channel("x=a").is_err());
        assert!(parse_channel("3=").is_err());
    }

    #[test]
    fn record_requires_a_channel() {
        assert!(Cli::try_parse_from(["serialtalk", "record"]).is_err());
        let cli = Cli::try_parse_from(["serialtalk", "record", "-c", "1=a", "-c", "4=b", "--sensor", "wheel"])
            .expect("valid arguments");
        match cli.command {
            Command::Record(args) => {
                assert_eq!(args.channel.len(), 2);
                assert_eq!(args.link.sensor, SensorKind::Wheel);
                assert_eq!(args.baudrate, RECORDER_BAUD_RATE);
            }
            other => panic!("Expected record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn failing_command_returns_its_error() {
        let cli = Cli::try_parse_from(["serialtalk", "record", "-c", "99=a"]).expect("valid arguments");
        let err = run(cli.command).await.expect_err("channel 99 does not exist");
        assert!(format!("{:#}", err).contains("Invalid channel 99"));
    }
}
