// sensorbeacon: command-line front end for the sensor beacon core
//
// Encodes readings into iBeacon frames, decodes captured frames, and runs an
// in-process advertise/scan loop over the loopback radio.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use rand::Rng;
use sensorbeacon_core::logging::{init_tracing, LogFormat};
use sensorbeacon_core::transport::ble::{
    estimate_distance, find_manufacturer_data, AdvertisePayload, Proximity, APPLE_COMPANY_ID,
    IBEACON_PREFIX,
};
use sensorbeacon_core::transport::{pump_events, LoopbackRadio};
use sensorbeacon_core::{
    AdvertisingEvent, AllGranted, BeaconFrame, BeaconNode, ScanEvent, ScanFilterConfig,
    SensorReading,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// How long to wait for the loopback radio to answer
const RADIO_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "sensorbeacon")]
#[command(about = "Temperature/humidity over iBeacon advertisements", long_about = None)]
#[command(version)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
    /// Write logs to daily files in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a reading into an iBeacon frame
    Encode {
        #[arg(short, long, allow_hyphen_values = true)]
        temperature: f32,
        #[arg(short = 'u', long)]
        humidity: f32,
    },
    /// Decode a hex iBeacon frame or raw advertising data
    Decode {
        hex: String,
        /// Received signal strength, for a distance estimate
        #[arg(short, long, allow_hyphen_values = true)]
        rssi: Option<i8>,
    },
    /// Publish random readings and scan them back over the loopback radio
    Simulate {
        #[arg(short, long, default_value = "5")]
        count: usize,
        /// Defaults to the configured publish interval
        #[arg(short, long)]
        interval_ms: Option<u64>,
        #[arg(short, long, default_value = "-65", allow_hyphen_values = true)]
        rssi: i8,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli.log_level, cli.json_logs, cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Encode {
            temperature,
            humidity,
        } => cmd_encode(temperature, humidity),
        Commands::Decode { hex, rssi } => cmd_decode(&hex, rssi),
        Commands::Simulate {
            count,
            interval_ms,
            rssi,
        } => cmd_simulate(count, interval_ms, rssi).await,
        Commands::Config { action } => cmd_config(action),
    }
}

fn init_logging(level: &str, json: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let Some(dir) = log_dir else {
        let format = if json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        };
        init_tracing(level, format);
        return Ok(None);
    };

    std::fs::create_dir_all(dir).context("Failed to create log directory")?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "sensorbeacon.log"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(Some(guard))
}

fn cmd_encode(temperature: f32, humidity: f32) -> Result<()> {
    let config = config::Config::load()?;
    let codec = config.beacon.sensor_codec()?;

    let reading = SensorReading::new(temperature, humidity);
    let frame = codec.encode(&reading);
    let data = AdvertisePayload::ibeacon(&frame.serialize()).to_bytes()?;

    println!("{}", "iBeacon Frame".bold());
    println!("  Reading:  {}", reading);
    println!("  UUID:     {}", config.beacon.sensor_uuid.bright_cyan());
    println!("  Major:    {} (temperature)", frame.major);
    println!("  Minor:    {} (humidity)", frame.minor);
    println!("  Power:    {} dBm", frame.measured_power);
    println!();
    println!("  Frame:    {}", hex::encode(frame.serialize()).bright_yellow());
    println!("  Adv data: {}", hex::encode(&data).bright_yellow());

    Ok(())
}

/// Locate the iBeacon frame in `bytes`: either a bare frame, or full
/// advertising data whose Apple manufacturer entry carries one.
fn frame_bytes(bytes: &[u8]) -> Result<&[u8]> {
    // Advertising data opens with the flags entry `02 01 ..`, never `02 15`
    if bytes.starts_with(&IBEACON_PREFIX) {
        debug!("Decoding {} bytes as a bare frame", bytes.len());
        return Ok(bytes);
    }

    debug!("Decoding {} bytes as advertising data", bytes.len());
    find_manufacturer_data(bytes, APPLE_COMPANY_ID)
        .context("Neither an iBeacon frame nor advertising data with Apple manufacturer data")
}

fn cmd_decode(input: &str, rssi: Option<i8>) -> Result<()> {
    let config = config::Config::load()?;
    let codec = config.beacon.sensor_codec()?;

    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let bytes = hex::decode(&digits).context("Input is not valid hex")?;

    let frame = BeaconFrame::parse(frame_bytes(&bytes)?)?;
    let reading = codec.decode(&frame)?;

    println!("{} {}", "✓".green(), reading.to_string().bold());
    println!("  Major/Minor: {}/{}", frame.major, frame.minor);
    println!("  Power:       {} dBm", frame.measured_power);

    if let Some(rssi) = rssi {
        let distance = estimate_distance(frame.measured_power, rssi);
        println!(
            "  Distance:    {:.2} m ({})",
            distance,
            Proximity::from_distance(distance)
        );
    }

    Ok(())
}

async fn cmd_simulate(count: usize, interval_ms: Option<u64>, rssi: i8) -> Result<()> {
    let config = config::Config::load()?;
    let interval = Duration::from_millis(interval_ms.unwrap_or(config.beacon.publish_interval_ms));

    let (radio, radio_rx) = LoopbackRadio::new("loopback", rssi);
    let node = BeaconNode::new(&config.beacon, radio.clone(), Arc::new(AllGranted))?;

    let (adv_tx, mut adv_rx) = mpsc::unbounded_channel::<AdvertisingEvent>();
    let (scan_tx, mut scan_rx) = mpsc::unbounded_channel::<ScanEvent>();
    node.advertising.subscribe(Arc::new(adv_tx));
    node.scanning.subscribe(Arc::new(scan_tx));

    let pump = tokio::spawn(pump_events(
        radio_rx,
        node.advertising.clone(),
        node.scanning.clone(),
    ));

    // Our own advertisements carry no local name
    let filter = ScanFilterConfig {
        device_name: None,
        ..config.beacon.scan_filter()
    };
    node.scanning.start(filter)?;

    println!("{}", "Sensor Beacon Simulation".bold());
    println!("  Radio:    loopback at {} dBm", rssi);
    println!("  Interval: {} ms", interval.as_millis());
    println!();

    let mut rng = rand::thread_rng();
    let mut ticker = tokio::time::interval(interval);

    for i in 1..=count {
        ticker.tick().await;

        let reading = SensorReading::new(rng.gen_range(20.0..35.0), rng.gen_range(45.0..75.0));
        let handle = node.advertising.publish(&reading)?;
        println!("{} #{} publish {} ({})", "→".bright_blue(), i, reading, handle);

        match timeout(RADIO_TIMEOUT, adv_rx.recv()).await {
            Ok(Some(AdvertisingEvent::Started { .. })) => {}
            Ok(Some(AdvertisingEvent::Failed { handle, error })) => {
                warn!("Advertising {} failed during simulation: {}", handle, error);
                println!("  {} advertising failed: {}", "✗".red(), error);
                continue;
            }
            Ok(Some(AdvertisingEvent::Stopped { .. })) | Ok(None) | Err(_) => {
                warn!("Advertising {} not confirmed within {:?}", handle, RADIO_TIMEOUT);
                println!("  {} advertising not confirmed", "✗".red());
                continue;
            }
        }

        radio.tick();

        match timeout(RADIO_TIMEOUT, scan_rx.recv()).await {
            Ok(Some(ScanEvent::Observed(observed))) => {
                println!(
                    "{} #{} observe {} from {} at {:.2} m ({})",
                    "←".green(),
                    i,
                    observed.reading,
                    observed.address.bright_cyan(),
                    observed.distance,
                    Proximity::from_distance(observed.distance)
                );
            }
            Ok(Some(ScanEvent::Failed { error, .. })) => {
                anyhow::bail!("Scan failed: {}", error);
            }
            Ok(None) | Err(_) => {
                warn!("No observation for reading #{} within {:?}", i, RADIO_TIMEOUT);
                println!("  {} nothing observed", "✗".red());
            }
        }
    }

    let stats = node.scanning.stats();
    println!();
    println!("{}", "Scan Statistics".bold());
    println!("  Reports:  {}", stats.reports_seen);
    println!("  Sensors:  {}", stats.sensors_observed);
    println!("  Ignored:  {}", stats.reports_ignored);
    println!("  Rejected: {}", stats.frames_rejected);

    node.shutdown();
    pump.abort();
    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    let mut config = config::Config::load()?;

    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else {
                anyhow::bail!("Unknown config key: {}", key);
            }
        }

        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            println!();

            for (key, value) in config.list() {
                let value = if value.is_empty() {
                    "(none)".dimmed().to_string()
                } else {
                    value
                };
                println!("  {:<24} {}", key.bright_cyan(), value);
            }
        }

        ConfigAction::Path => {
            println!("{}", config.path().display());
        }
    }

    Ok(())
}
