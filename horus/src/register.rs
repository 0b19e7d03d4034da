// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The BME280 register map, and typed views of the control registers.
//!
//! The sensor has a flat, byte-addressed register file. Multi-byte reads auto-increment the
//! register address, so the trim blocks and the measurement data can each be read in a single
//! burst. Writes are register address/value pairs.
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::util::is_bit_set;

/// The value of the `id` register for a BME280.
pub const CHIP_ID: u8 = 0x60;

/// Writing this to the `reset` register performs a power-on reset.
pub const RESET_COMMAND: u8 = 0xB6;

/// The number of bytes in the `calib00`..`calib25` block (0x88 through 0xA1).
pub const TEMPERATURE_PRESSURE_CALIBRATION_LENGTH: usize = 26;

/// The number of bytes in the `calib26`..`calib32` block (0xE1 through 0xE7).
pub const HUMIDITY_CALIBRATION_LENGTH: usize = 7;

/// The number of bytes in one measurement burst (`press_msb` through `hum_lsb`).
pub const DATA_LENGTH: usize = 8;

/// The primary address of the sensor (SDO pulled low).
pub const PRIMARY_ADDRESS: u8 = 0x76;

/// The secondary address of the sensor (SDO pulled high).
pub const SECONDARY_ADDRESS: u8 = 0x77;

#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum RegisterAddress {
    /// Start of the temperature and pressure trim values (plus `dig_H1` at the end).
    CalibrationTemperaturePressure = 0x88,
    ChipId = 0xD0,
    Reset = 0xE0,
    /// Start of the rest of the humidity trim values.
    CalibrationHumidity = 0xE1,
    HumidityControl = 0xF2,
    Status = 0xF3,
    MeasurementControl = 0xF4,
    Config = 0xF5,
    /// Start of the measurement data, `press_msb`.
    Data = 0xF7,
}

/// Trait for common register functionality.
pub trait Register: Into<u8> + From<u8> {
    /// The address of this register in the sensor's register map.
    fn address() -> RegisterAddress;
}

/// Oversampling setting for one of the measurements.
///
/// Each step doubles the measurement time and reduces the noise.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Oversampling {
    /// The measurement is skipped entirely and the output is left at 0x80000 (0x8000 for
    /// humidity).
    Skipped = 0,
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
}

impl Oversampling {
    fn from_raw(raw: u8) -> Self {
        // The datasheet lists every value above 5 as also being x16.
        Self::try_from_primitive(raw & 0x07).unwrap_or(Self::X16)
    }
}

impl Default for Oversampling {
    fn default() -> Self {
        Self::X1
    }
}

/// The power mode of the sensor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Mode {
    Sleep = 0b00,
    /// Take a single measurement, then go back to sleep.
    Forced = 0b01,
    /// Measure continuously, pausing for the standby time between measurements.
    Normal = 0b11,
}

impl Mode {
    fn from_raw(raw: u8) -> Self {
        // Both 0b01 and 0b10 are forced mode.
        Self::try_from_primitive(raw & 0x03).unwrap_or(Self::Forced)
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::Normal
    }
}

/// Inactive duration between measurements in normal mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum StandbyTime {
    Ms0_5 = 0b000,
    Ms62_5 = 0b001,
    Ms125 = 0b010,
    Ms250 = 0b011,
    Ms500 = 0b100,
    Ms1000 = 0b101,
    Ms10 = 0b110,
    Ms20 = 0b111,
}

impl StandbyTime {
    fn from_raw(raw: u8) -> Self {
        // All eight values are defined, the fallback can't be reached.
        Self::try_from_primitive(raw & 0x07).unwrap_or(Self::Ms1000)
    }
}

impl Default for StandbyTime {
    fn default() -> Self {
        Self::Ms1000
    }
}

/// IIR filter coefficient, applied to temperature and pressure.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Filter {
    Off = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
}

impl Filter {
    fn from_raw(raw: u8) -> Self {
        Self::try_from_primitive(raw & 0x07).unwrap_or(Self::X16)
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::Off
    }
}

/// `ctrl_hum` (0xF2).
///
/// Changes to this register only take effect after the next write to `ctrl_meas`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HumidityControl {
    pub(crate) humidity_oversampling: Oversampling,
}

impl HumidityControl {
    pub fn new(humidity_oversampling: Oversampling) -> Self {
        Self {
            humidity_oversampling,
        }
    }

    pub fn humidity_oversampling(&self) -> Oversampling {
        self.humidity_oversampling
    }

    pub fn set_humidity_oversampling(&mut self, value: Oversampling) {
        self.humidity_oversampling = value;
    }
}

impl Register for HumidityControl {
    fn address() -> RegisterAddress {
        RegisterAddress::HumidityControl
    }
}

impl From<u8> for HumidityControl {
    fn from(raw: u8) -> Self {
        Self::new(Oversampling::from_raw(raw))
    }
}

impl From<HumidityControl> for u8 {
    fn from(register: HumidityControl) -> Self {
        u8::from(register.humidity_oversampling)
    }
}

/// `ctrl_meas` (0xF4).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MeasurementControl {
    pub(crate) temperature_oversampling: Oversampling,
    pub(crate) pressure_oversampling: Oversampling,
    pub(crate) mode: Mode,
}

impl MeasurementControl {
    pub fn new(temperature: Oversampling, pressure: Oversampling, mode: Mode) -> Self {
        Self {
            temperature_oversampling: temperature,
            pressure_oversampling: pressure,
            mode,
        }
    }

    pub fn temperature_oversampling(&self) -> Oversampling {
        self.temperature_oversampling
    }

    pub fn set_temperature_oversampling(&mut self, value: Oversampling) {
        self.temperature_oversampling = value;
    }

    pub fn pressure_oversampling(&self) -> Oversampling {
        self.pressure_oversampling
    }

    pub fn set_pressure_oversampling(&mut self, value: Oversampling) {
        self.pressure_oversampling = value;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, value: Mode) {
        self.mode = value;
    }
}

impl Register for MeasurementControl {
    fn address() -> RegisterAddress {
        RegisterAddress::MeasurementControl
    }
}

impl From<u8> for MeasurementControl {
    fn from(raw: u8) -> Self {
        Self {
            temperature_oversampling: Oversampling::from_raw(raw >> 5),
            pressure_oversampling: Oversampling::from_raw(raw >> 2),
            mode: Mode::from_raw(raw),
        }
    }
}

impl From<MeasurementControl> for u8 {
    fn from(register: MeasurementControl) -> Self {
        let temperature: u8 = register.temperature_oversampling.into();
        let pressure: u8 = register.pressure_oversampling.into();
        let mode: u8 = register.mode.into();
        (temperature << 5) | (pressure << 2) | mode
    }
}

/// `config` (0xF5).
///
/// Writes to this register may be ignored while the sensor is in normal mode.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConfigRegister {
    pub(crate) standby_time: StandbyTime,
    pub(crate) filter: Filter,
    /// Enables the 3-wire SPI interface. Always left disabled by this crate.
    pub(crate) spi3w_enabled: bool,
}

impl ConfigRegister {
    pub fn new(standby_time: StandbyTime, filter: Filter) -> Self {
        Self {
            standby_time,
            filter,
            spi3w_enabled: false,
        }
    }

    pub fn standby_time(&self) -> StandbyTime {
        self.standby_time
    }

    pub fn set_standby_time(&mut self, value: StandbyTime) {
        self.standby_time = value;
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn set_filter(&mut self, value: Filter) {
        self.filter = value;
    }
}

impl Register for ConfigRegister {
    fn address() -> RegisterAddress {
        RegisterAddress::Config
    }
}

impl From<u8> for ConfigRegister {
    fn from(raw: u8) -> Self {
        Self {
            standby_time: StandbyTime::from_raw(raw >> 5),
            filter: Filter::from_raw(raw >> 2),
            spi3w_enabled: is_bit_set(raw, 0),
        }
    }
}

impl From<ConfigRegister> for u8 {
    fn from(register: ConfigRegister) -> Self {
        let standby: u8 = register.standby_time.into();
        let filter: u8 = register.filter.into();
        (standby << 5) | (filter << 2) | register.spi3w_enabled as u8
    }
}

/// `status` (0xF3). Read-only.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StatusRegister {
    /// Set while a conversion is running.
    pub(crate) measuring: bool,

    /// Set while the trim values are being copied out of NVM (after power-on or a reset).
    pub(crate) im_update: bool,
}

impl StatusRegister {
    pub fn measuring(&self) -> bool {
        self.measuring
    }

    pub fn im_update(&self) -> bool {
        self.im_update
    }
}

impl Register for StatusRegister {
    fn address() -> RegisterAddress {
        RegisterAddress::Status
    }
}

impl From<u8> for StatusRegister {
    fn from(raw: u8) -> Self {
        Self {
            measuring: is_bit_set(raw, 3),
            im_update: is_bit_set(raw, 0),
        }
    }
}

impl From<StatusRegister> for u8 {
    fn from(register: StatusRegister) -> Self {
        ((register.measuring as u8) << 3) | register.im_update as u8
    }
}
