use crate::{DecodeArgs, EncodeArgs, LinkArgs, RecordArgs};
use anyhow::{Context, Result, bail};
use chrono::Local;
use serialtalk_lib::actogram::{Actogram, grid_shape};
use serialtalk_lib::constants::READ_TIMEOUT;
use serialtalk_lib::decode::{decode_channels, read_records};
use serialtalk_lib::ingest::{IngestConfig, Ingestor, LoggerEvent};
use serialtalk_lib::serial::available_ports;
use serialtalk_lib::{ChannelSet, SerialConnector, SerialSettings, TimeFormat};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{debug, info, warn};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub async fn encode(args: EncodeArgs) -> Result<()> {
    let template = args
        .template
        .unwrap_or_else(|| args.link.sensor.default_template().to_string());
    let channels = ChannelSet::from_template(&template, args.channels);
    run_logger(args.link, args.baudrate, channels).await
}

pub async fn record(args: RecordArgs) -> Result<()> {
    let channels = ChannelSet::from_selection(args.channels, args.channel).context("Invalid channel selection")?;
    run_logger(args.link, args.baudrate, channels).await
}

async fn run_logger(link: LinkArgs, baud_rate: u32, channels: ChannelSet) -> Result<()> {
    if channels.is_empty() {
        bail!("No channel selected");
    }
    let settings = SerialSettings {
        port: link.port,
        baud_rate,
        timeout: READ_TIMEOUT,
    };
    let config = IngestConfig {
        kind: link.sensor,
        window: Duration::from_secs(link.winsize),
        max_reconnects: link.max_reconnects,
        ..IngestConfig::default()
    };
    debug!("Serial settings: {}", serde_json::to_string(&settings)?);
    debug!("Ingest configuration: {}", serde_json::to_string(&config)?);
    debug!("Channels: {}", serde_json::to_string(&channels)?);

    if link.destructive {
        channels.truncate_all().context("Failed to truncate output files")?;
    }
    for channel in channels.channels() {
        info!("Channel {:02} -> {}", channel.number(), channel.path.display());
    }

    info!("Start time: {}", Local::now().format(TIME_FORMAT));
    let (tx, rx) = unbounded_channel();
    let ingestor = Ingestor::new(SerialConnector::new(settings), channels, config).with_events(tx);
    let running = ingestor.running_flag();
    let monitor = tokio::spawn(monitor_events(rx));
    let mut worker = tokio::task::spawn_blocking(move || ingestor.run());

    let finished = tokio::select! {
        res = &mut worker => Some(res),
        _ = signal::ctrl_c() => None,
    };
    let joined = match finished {
        Some(res) => res,
        None => {
            info!("Ctrl+C received, finishing the current read...");
            running.store(false, Ordering::Relaxed);
            worker.await
        }
    };
    let outcome = joined.context("Logger thread panicked")?;
    // The worker dropped the sender; the monitor drains and ends
    let _ = monitor.await;
    info!("Serial connection ended at {}", Local::now().format(TIME_FORMAT));

    let summary = outcome.context("Serial logging failed")?;
    info!(
        lines = summary.lines,
        rejected = summary.rejected,
        records = summary.records,
        reconnects = summary.reconnects,
        "Logging finished"
    );
    if summary.discarded_reads > 0 {
        info!("{} reading(s) of the last, unfinished window were not written", summary.discarded_reads);
    }
    Ok(())
}

async fn monitor_events(mut rx: UnboundedReceiver<LoggerEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            LoggerEvent::Connected { port, discarded } => {
                info!("Reading stream from {} ({} startup line(s) dropped)", port, discarded);
            }
            LoggerEvent::Reading { values, counters } => {
                let monitor: Vec<String> = counters
                    .iter()
                    .map(|(index, total)| format!("{}: {} ({})", index + 1, values[*index], total))
                    .collect();
                info!("{}", monitor.join("\t"));
            }
            LoggerEvent::Rejected { reason } => debug!("Skipped line: {}", reason),
            LoggerEvent::BinWritten(bin) => {
                let averages: Vec<String> = bin
                    .averages
                    .iter()
                    .map(|(index, avg)| format!("{}: {:.3}", index + 1, avg))
                    .collect();
                info!(timestamp = bin.timestamp, reads = bin.reads, "Bin written: {}", averages.join("\t"));
            }
            LoggerEvent::CountsWritten { timestamp, counts } => {
                debug!(timestamp, "Counts written: {:?}", counts);
            }
            LoggerEvent::Reconnecting { attempt, reason } => {
                warn!("Reconnecting (attempt {}) after: {}", attempt, reason);
            }
        }
    }
}

pub fn decode(args: DecodeArgs) -> Result<()> {
    let kind = args.sensor;
    let template = args.template.unwrap_or_else(|| kind.default_template().to_string());
    let channels = ChannelSet::from_template(&template, args.channels);
    let format = if args.localtime {
        TimeFormat::Local
    } else {
        TimeFormat::Epoch
    };

    let outcomes = decode_channels(&channels, kind, format).context("Decoding failed")?;
    let decoded = outcomes.iter().filter(|o| o.records.is_some()).count();
    let records: usize = outcomes.iter().filter_map(|o| o.records).sum();
    info!("Decoded {} of {} file(s), {} record(s)", decoded, outcomes.len(), records);

    if args.draw {
        let display_bin = match args.bin_display {
            0 => None,
            minutes => {
                info!("Binning data in {}-minute bins", minutes);
                Some(Duration::from_secs(minutes * 60))
            }
        };
        draw(&channels, kind, display_bin, args.columns)?;
    }
    Ok(())
}

fn draw(
    channels: &ChannelSet,
    kind: serialtalk_lib::SensorKind,
    display_bin: Option<Duration>,
    columns: usize,
) -> Result<()> {
    let (rows, cols) = grid_shape(channels.len());
    debug!("Actogram grid: {} x {}", rows, cols);
    for channel in channels.channels() {
        let records = match read_records(&channel.path, kind) {
            Ok(records) => records,
            Err(e) => {
                warn!("Cannot draw {}: {}", channel.path.display(), e);
                continue;
            }
        };
        let title = channel.path.display().to_string();
        match Actogram::build(title, &records, &Local, display_bin) {
            Some(actogram) => println!("{}", actogram.render_text(columns)),
            None => warn!("Nothing to draw for {}", channel.path.display()),
        }
    }
    Ok(())
}

pub fn ports() -> Result<()> {
    let ports = available_ports().context("Failed to list serial ports")?;
    if ports.is_empty() {
        info!("No serial ports found.");
    }
    for port in ports {
        println!("{}\t{}", port.name, port.kind);
    }
    Ok(())
}
