use std::num::ParseIntError;
use std::path::PathBuf;

use clap::Parser;
use linux_embedded_hal::I2cdev;
use tracing_subscriber::EnvFilter;

use horus::register::{PRIMARY_ADDRESS, SECONDARY_ADDRESS};
use horus::{Bme280, Error};

/// Look for a BME280 on both of its addresses and dump its state.
#[derive(Debug, Parser)]
struct Args {
    /// Path to the I2C bus device
    #[arg(default_value = "/dev/i2c-1")]
    bus: PathBuf,

    /// Only try this address, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_address)]
    address: Option<u8>,
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
    let addresses = match args.address {
        Some(address) => vec![address],
        None => vec![PRIMARY_ADDRESS, SECONDARY_ADDRESS],
    };

    for address in addresses {
        let bus = I2cdev::new(&args.bus)?;
        let mut sensor = match Bme280::new(bus, address) {
            Ok(sensor) => sensor,
            Err(Error::IdentityMismatch { found, .. }) => {
                println!("{:#04x}: not a BME280 (chip ID {:#04x})", address, found);
                continue;
            }
            Err(err) => {
                println!("{:#04x}: {}", address, err);
                continue;
            }
        };
        println!("{:#04x}: BME280", address);
        println!("{:#?}", sensor.calibration());
        println!("{:?}", sensor.status()?);
        let raw = sensor.read_raw()?;
        println!("{:?}", raw);
        println!("{:?}", sensor.compensate(&raw));
    }
    Ok(())
}
