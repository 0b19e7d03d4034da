use std::fs::OpenOptions;
use std::io::Write;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use horus::{Bme280, SensorConfig};

/// Read the BME280 and append the readings to a CSV file.
#[derive(Debug, Parser)]
struct Args {
    /// I2C bus number, as in /dev/i2c-N
    #[arg(long, default_value_t = 1)]
    bus: u8,

    /// Sensor address, decimal or 0x-prefixed hex
    #[arg(long, default_value = "0x76", value_parser = parse_address)]
    address: u8,

    /// CSV file the readings are appended to
    #[arg(long, default_value = "environmental_data.csv")]
    csv: PathBuf,

    /// Number of readings to take
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Seconds between readings
    #[arg(long, default_value_t = 60)]
    interval: u64,
}

fn parse_address(arg: &str) -> Result<u8, ParseIntError> {
    match arg.strip_prefix("0x") {
        Some(hex_digits) => u8::from_str_radix(hex_digits, 16),
        None => arg.parse(),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let config = SensorConfig::new(args.bus, args.address);
    let mut sensor = Bme280::open(&config)
        .with_context(|| format!("unable to set up the BME280 on {}", config.bus_path().display()))?;

    for reading_number in 0..args.count {
        if reading_number > 0 {
            sleep(Duration::from_secs(args.interval));
        }
        let reading = sensor.read_all()?;
        println!(
            "Temp: {} C | Hum: {} % | Pres: {} hPa",
            reading.temperature, reading.humidity, reading.pressure
        );
        let mut csv = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&args.csv)
            .with_context(|| format!("unable to open {}", args.csv.display()))?;
        if csv.metadata()?.len() == 0 {
            writeln!(csv, "Timestamp,Temperature,Humidity,Pressure")?;
        }
        writeln!(
            csv,
            "{},{},{},{}",
            Local::now().format("%FT%H:%M:%S%Z"),
            reading.temperature,
            reading.humidity,
            reading.pressure
        )?;
        info!(path = %args.csv.display(), "appended reading");
    }
    Ok(())
}
