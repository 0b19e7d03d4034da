// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Register transport: raw byte-level access to a device on an I²C bus.
//!
//! Everything above this module speaks `embedded-hal` 0.2 blocking I²C, so any implementation of
//! those traits can carry the sensor protocol. [`LinuxBus`] is the implementation for the Linux
//! `i2c-dev` interface.
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use embedded_hal::blocking::i2c;
use tracing::{debug, warn};

use crate::error::Error;
use crate::register::{Register, RegisterAddress};

/// `I2C_SLAVE` from `linux/i2c-dev.h`.
const I2C_SLAVE: u16 = 0x0703;

/// Exclusive handle to a Linux I²C bus, bound to one device address.
///
/// The device file is closed when the handle is dropped.
#[derive(Debug)]
pub struct LinuxBus {
    file: File,
    path: PathBuf,
    address: u8,
}

impl LinuxBus {
    /// The device file for the numbered bus.
    pub fn bus_path(bus: u8) -> PathBuf {
        PathBuf::from(format!("/dev/i2c-{}", bus))
    }

    /// Open `/dev/i2c-{bus}` and select `address` on it.
    pub fn open(bus: u8, address: u8) -> Result<Self, Error<io::Error>> {
        Self::open_path(Self::bus_path(bus), address)
    }

    /// Open the bus at an explicit device path and select `address` on it.
    pub fn open_path<P: AsRef<Path>>(path: P, address: u8) -> Result<Self, Error<io::Error>> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::BusOpen {
                path: path.clone(),
                source,
            })?;
        let mut bus = Self {
            file,
            path,
            address,
        };
        bus.select(address)
            .map_err(|source| Error::BusAddress { address, source })?;
        debug!(path = %bus.path.display(), address, "opened I²C bus");
        Ok(bus)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Point the kernel driver at a (possibly different) device address.
    fn select(&mut self, address: u8) -> io::Result<()> {
        // SAFETY: the descriptor is owned by `self.file` and stays open for the duration of the
        // call. I2C_SLAVE takes the address by value.
        let result = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(address),
            )
        };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        self.address = address;
        Ok(())
    }

    fn ensure_address(&mut self, address: u8) -> io::Result<()> {
        if address != self.address {
            self.select(address)?;
        }
        Ok(())
    }
}

impl i2c::Write for LinuxBus {
    type Error = io::Error;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.ensure_address(address)?;
        self.file.write_all(bytes)
    }
}

impl i2c::WriteRead for LinuxBus {
    type Error = io::Error;

    /// Write the register pointer, then read `buffer.len()` bytes back.
    ///
    /// A read that comes back short is an `UnexpectedEof` error.
    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.ensure_address(address)?;
        self.file.write_all(bytes)?;
        self.file.read_exact(buffer)
    }
}

/// Burst read starting at `register` into `buffer`.
pub(crate) fn read_registers<I2C, E>(
    bus: &mut I2C,
    address: u8,
    register: RegisterAddress,
    buffer: &mut [u8],
) -> Result<(), E>
where
    I2C: i2c::WriteRead<Error = E>,
{
    bus.write_read(address, &[register.into()], buffer)
}

pub(crate) fn read_register<R, I2C, E>(bus: &mut I2C, address: u8) -> Result<R, Error<E>>
where
    I2C: i2c::WriteRead<Error = E>,
    E: std::fmt::Debug,
    R: Register,
{
    let mut value = [0u8; 1];
    read_registers(bus, address, R::address(), &mut value).map_err(Error::Bus)?;
    Ok(R::from(value[0]))
}

/// Write a single register without waiting on (or caring about) the result.
///
/// The sensor doesn't acknowledge register contents, so a failed write is only logged.
pub(crate) fn write_register<I2C, E>(bus: &mut I2C, address: u8, register: RegisterAddress, value: u8)
where
    I2C: i2c::Write<Error = E>,
    E: std::fmt::Debug,
{
    if let Err(err) = bus.write(address, &[register.into(), value]) {
        warn!(?err, register = ?register, value, "register write failed");
    }
}
