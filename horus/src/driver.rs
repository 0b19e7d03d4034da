// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::fmt::Debug;
use std::io;

use embedded_hal::blocking::i2c;
use paste::paste;
use tracing::{debug, info};

use crate::bus::{read_register, read_registers, write_register, LinuxBus};
use crate::calculations::*;
use crate::calibration::{Calibration, FromI2C};
use crate::config::{SensorConfig, SensorSettings};
use crate::error::Error;
use crate::register::*;

/// DRY macro for the set_* methods in `Bme280` that change one of the measurement settings.
macro_rules! set_setting {
    { $field:ident, $typ:ty, $doc:literal } => {
    paste! {
        #[doc = $doc]
        ///
        /// The new value is written to the sensor immediately. Like all register writes, this is
        /// not confirmed by the sensor.
        pub fn [< set_ $field >](&mut self, new_value: $typ) {
            if self.settings.$field != new_value {
                self.settings.$field = new_value;
                self.apply_settings();
            }
        }
    }};
}

/// Driver for the Bosch BME280 combined temperature, humidity, and pressure sensor.
///
/// Creating a driver checks that the device really is a BME280, loads the factory calibration,
/// and writes the measurement settings. After that [`read_all`][Bme280::read_all] returns a
/// compensated reading for every call.
#[derive(Clone, Debug)]
pub struct Bme280<I2C> {
    /// The I²C bus this sensor is accessible on.
    bus: I2C,

    /// The I²C address this sensor is accessible at.
    address: u8,

    /// The factory calibration data for this specific sensor.
    calibration: Calibration,

    /// The settings most recently written to the sensor.
    settings: SensorSettings,

    /// The fine temperature from the most recent temperature compensation.
    ///
    /// Pressure and humidity compensation both need this. It stays `None` until a temperature has
    /// been compensated.
    fine_temperature: Option<FineTemperature>,
}

impl<I2C, E> Bme280<I2C>
where
    I2C: i2c::WriteRead<Error = E> + i2c::Write<Error = E>,
    E: Debug,
{
    /// Create a new driver with the default settings.
    pub fn new(bus: I2C, address: u8) -> Result<Self, Error<E>> {
        Self::with_settings(bus, address, SensorSettings::default())
    }

    /// Create a new driver, verifying the chip and loading the calibration over I²C.
    pub fn with_settings(bus: I2C, address: u8, settings: SensorSettings) -> Result<Self, Error<E>> {
        // We own the bus now, make it mutable.
        let mut bus = bus;
        let mut chip_id = [0u8; 1];
        read_registers(&mut bus, address, RegisterAddress::ChipId, &mut chip_id)
            .map_err(Error::Bus)?;
        if chip_id[0] != CHIP_ID {
            return Err(Error::IdentityMismatch {
                expected: CHIP_ID,
                found: chip_id[0],
            });
        }
        debug!(address, "found BME280");
        let calibration = Calibration::from_i2c(&mut bus, address)?;
        Ok(Self::new_with_calibration(bus, address, calibration, settings))
    }

    /// Create a driver with already known calibration data.
    ///
    /// The chip identity is not checked. The settings are written to the sensor.
    pub fn new_with_calibration(
        bus: I2C,
        address: u8,
        calibration: Calibration,
        settings: SensorSettings,
    ) -> Self {
        let mut sensor = Self {
            bus,
            address,
            calibration,
            settings,
            fine_temperature: None,
        };
        sensor.apply_settings();
        sensor
    }

    /// Write all of the settings to the sensor.
    ///
    /// `ctrl_hum` only latches on a write to `ctrl_meas`, so it always goes first.
    pub fn apply_settings(&mut self) {
        let humidity: u8 = self.settings.humidity_control().into();
        let measurement: u8 = self.settings.measurement_control().into();
        let config: u8 = self.settings.config_register().into();
        write_register(
            &mut self.bus,
            self.address,
            HumidityControl::address(),
            humidity,
        );
        write_register(
            &mut self.bus,
            self.address,
            MeasurementControl::address(),
            measurement,
        );
        write_register(&mut self.bus, self.address, ConfigRegister::address(), config);
        debug!(humidity, measurement, config, "wrote measurement settings");
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn settings(&self) -> SensorSettings {
        self.settings
    }

    /// The fine temperature from the last temperature compensation, if there has been one.
    pub fn fine_temperature(&self) -> Option<FineTemperature> {
        self.fine_temperature
    }

    set_setting! {
        humidity_oversampling,
        Oversampling,
        "Set the humidity oversampling."
    }

    set_setting! {
        temperature_oversampling,
        Oversampling,
        "Set the temperature oversampling."
    }

    set_setting! {
        pressure_oversampling,
        Oversampling,
        "Set the pressure oversampling."
    }

    set_setting! {
        mode,
        Mode,
        "Set the power mode."
    }

    set_setting! {
        standby_time,
        StandbyTime,
        "Set the inactive time between measurements in normal mode."
    }

    set_setting! {
        filter,
        Filter,
        "Set the IIR filter coefficient."
    }

    /// Read the measurement control register back from the sensor.
    pub fn measurement_control(&mut self) -> Result<MeasurementControl, Error<E>> {
        read_register(&mut self.bus, self.address)
    }

    pub fn status(&mut self) -> Result<StatusRegister, Error<E>> {
        read_register(&mut self.bus, self.address)
    }

    /// Perform a power-on reset of the sensor.
    ///
    /// All of the control registers go back to zero (sleep mode), and the cached fine temperature
    /// is discarded. Wait for [`StatusRegister::im_update`] to clear, then call
    /// [`apply_settings`][Bme280::apply_settings] to start measuring again.
    pub fn reset(&mut self) {
        write_register(&mut self.bus, self.address, RegisterAddress::Reset, RESET_COMMAND);
        self.fine_temperature = None;
        info!(address = self.address, "reset BME280");
    }

    /// Read the uncompensated ADC values for all three measurements in one burst.
    pub fn read_raw(&mut self) -> Result<RawSample, Error<E>> {
        let mut burst = [0u8; DATA_LENGTH];
        read_registers(&mut self.bus, self.address, RegisterAddress::Data, &mut burst)
            .map_err(Error::Bus)?;
        Ok(RawSample::from_burst(&burst))
    }

    /// Compensate a raw sample, temperature first, and remember its fine temperature.
    pub fn compensate(&mut self, raw: &RawSample) -> EnvironmentalReading {
        let (reading, fine) = compensate(raw, &self.calibration);
        self.fine_temperature = Some(fine);
        reading
    }

    /// Read and compensate temperature, humidity, and pressure.
    pub fn read_all(&mut self) -> Result<EnvironmentalReading, Error<E>> {
        let raw = self.read_raw()?;
        Ok(self.compensate(&raw))
    }

    /// Read just the temperature (in ℃), updating the fine temperature.
    pub fn read_temperature(&mut self) -> Result<f32, Error<E>> {
        let raw = self.read_raw()?;
        let (temperature, fine) = compensate_temperature(raw.temperature, &self.calibration);
        self.fine_temperature = Some(fine);
        Ok(temperature)
    }

    /// Read just the pressure (in hPa).
    ///
    /// The fine temperature comes from the same burst as the pressure, and replaces the cached one.
    pub fn read_pressure(&mut self) -> Result<f32, Error<E>> {
        let raw = self.read_raw()?;
        let fine = self.update_fine_temperature(&raw);
        Ok(compensate_pressure(raw.pressure, &self.calibration, fine))
    }

    /// Read just the relative humidity (in %).
    ///
    /// The fine temperature comes from the same burst as the humidity, and replaces the cached one.
    pub fn read_humidity(&mut self) -> Result<f32, Error<E>> {
        let raw = self.read_raw()?;
        let fine = self.update_fine_temperature(&raw);
        Ok(compensate_humidity(raw.humidity, &self.calibration, fine))
    }

    fn update_fine_temperature(&mut self, raw: &RawSample) -> FineTemperature {
        let fine = fine_temperature(raw.temperature, &self.calibration);
        self.fine_temperature = Some(fine);
        fine
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.bus
    }
}

impl Bme280<LinuxBus> {
    /// Open the configured Linux I²C bus and initialize the sensor on it.
    pub fn open(config: &SensorConfig) -> Result<Self, Error<io::Error>> {
        let bus = LinuxBus::open(config.bus, config.address)?;
        let sensor = Self::with_settings(bus, config.address, config.settings)?;
        info!(bus = config.bus, address = config.address, "BME280 ready");
        Ok(sensor)
    }
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;
    use horus_test_data::{datasheet_bme280_at_address, I2cOperation, MockError, MockSensorBus};

    use crate::register::{Filter, Mode, Oversampling, StandbyTime};
    use crate::test::datasheet_calibration;
    use crate::{Bme280, Error, SensorSettings};

    fn create_bme280() -> (Bme280<MockSensorBus>, MockSensorBus) {
        // Specifically using a non-default address to make sure assumptions aren't being made
        // about the address.
        let address: u8 = 0x77;
        let mock_bus = datasheet_bme280_at_address(address);
        let sensor = Bme280::new(mock_bus.clone(), address)
            .expect("A BME280 should be created after loading its data");
        (sensor, mock_bus)
    }

    fn operations(mock_bus: &MockSensorBus) -> Vec<I2cOperation> {
        // Oldest first is easier to read in assertions
        mock_bus.recent_operations().iter().rev().copied().collect()
    }

    #[test]
    fn init_sequence() {
        let (sensor, mock_bus) = create_bme280();
        assert_eq!(sensor.address(), 0x77);
        assert_eq!(sensor.calibration(), &datasheet_calibration());
        assert_eq!(sensor.fine_temperature(), None);
        assert_eq!(
            operations(&mock_bus),
            vec![
                I2cOperation::Read {
                    register: 0xD0,
                    length: 1
                },
                I2cOperation::Read {
                    register: 0x88,
                    length: 26
                },
                I2cOperation::Read {
                    register: 0xE1,
                    length: 7
                },
                I2cOperation::Write {
                    register: 0xF2,
                    value: 0x01
                },
                I2cOperation::Write {
                    register: 0xF4,
                    value: 0x27
                },
                I2cOperation::Write {
                    register: 0xF5,
                    value: 0xA0
                },
            ]
        );
    }

    #[test]
    fn identity_mismatch() {
        let address = 0x76;
        let mock_bus = datasheet_bme280_at_address(address);
        // A BMP280 has the same register layout but no humidity sensor.
        mock_bus.set_register(0xD0, 0x58);
        let err = Bme280::new(mock_bus.clone(), address).unwrap_err();
        assert!(matches!(
            err,
            Error::IdentityMismatch {
                expected: 0x60,
                found: 0x58
            }
        ));
        // Nothing else should have been touched.
        assert_eq!(mock_bus.recent_operations().len(), 1);
    }

    #[test]
    fn wrong_address() {
        let mock_bus = datasheet_bme280_at_address(0x76);
        let err = Bme280::new(mock_bus, 0x77).unwrap_err();
        assert!(matches!(err, Error::Bus(MockError::UnknownI2cAddress(0x77))));
    }

    #[test]
    fn short_calibration_read() {
        let address = 0x76;
        let mock_bus = datasheet_bme280_at_address(address);
        mock_bus.fail_reads_from(0x88);
        let err = Bme280::new(mock_bus, address).unwrap_err();
        assert!(matches!(
            err,
            Error::CalibrationRead(MockError::ShortRead { register: 0x88, .. })
        ));
    }

    #[test]
    fn init_ignores_failed_setting_writes() {
        let address = 0x76;
        let mock_bus = datasheet_bme280_at_address(address);
        mock_bus.fail_writes_to(0xF5);
        let mut sensor = Bme280::new(mock_bus.clone(), address).unwrap();
        assert_eq!(mock_bus.register(0xF4), 0x27);
        assert_eq!(mock_bus.register(0xF5), 0x00);
        assert!(sensor.read_all().is_ok());
    }

    #[test]
    fn read_all() {
        let (mut sensor, _) = create_bme280();
        let reading = sensor.read_all().unwrap();
        assert_approx_eq!(f32, reading.temperature, 25.08, epsilon = 0.0001);
        assert_approx_eq!(f32, reading.pressure, 1006.5325, epsilon = 0.001);
        assert_approx_eq!(f32, reading.humidity, 54.99707, epsilon = 0.0001);
        assert_eq!(sensor.fine_temperature().map(|f| f.value()), Some(128422));
    }

    #[test]
    fn read_all_follows_new_data() {
        let (mut sensor, mock_bus) = create_bme280();
        sensor.read_all().unwrap();
        // Same temperature and pressure, adc_H = 27000
        mock_bus.set_measurement(&[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x69, 0x78]);
        let reading = sensor.read_all().unwrap();
        assert_approx_eq!(f32, reading.humidity, 38.271484, epsilon = 0.0001);
    }

    #[test]
    fn single_reads_on_a_fresh_driver() {
        let (mut sensor, _) = create_bme280();
        assert_approx_eq!(f32, sensor.read_pressure().unwrap(), 1006.5325, epsilon = 0.001);
        assert_eq!(sensor.fine_temperature().map(|f| f.value()), Some(128422));
        assert_approx_eq!(f32, sensor.read_humidity().unwrap(), 54.99707, epsilon = 0.0001);
        let temperature = sensor.read_temperature().unwrap();
        assert_approx_eq!(f32, temperature, 25.08, epsilon = 0.0001);
    }

    #[test]
    fn single_reads_use_their_own_temperature() {
        let (mut sensor, mock_bus) = create_bme280();
        sensor.read_temperature().unwrap();
        let old_fine = sensor.fine_temperature();
        // Same pressure and humidity, adc_T raised to about 66 ℃
        mock_bus.set_measurement(&[0x65, 0x5A, 0xC0, 0x9E, 0xED, 0x00, 0x75, 0x30]);
        let pressure = sensor.read_pressure().unwrap();
        let humidity = sensor.read_humidity().unwrap();
        assert_ne!(sensor.fine_temperature(), old_fine);
        let reading = sensor.read_all().unwrap();
        assert_approx_eq!(f32, reading.temperature, 65.95, epsilon = 0.01);
        assert_eq!(pressure, reading.pressure);
        assert_eq!(humidity, reading.humidity);
        assert_approx_eq!(f32, pressure, 1069.9374, epsilon = 0.001);
    }

    #[test]
    fn read_failure_is_reported() {
        let (mut sensor, mock_bus) = create_bme280();
        mock_bus.fail_reads_from(0xF7);
        assert!(matches!(
            sensor.read_all(),
            Err(Error::Bus(MockError::ShortRead { register: 0xF7, .. }))
        ));
        // A failed read doesn't produce a fine temperature.
        assert_eq!(sensor.fine_temperature(), None);
    }

    #[test]
    fn set_humidity_oversampling() {
        let (mut sensor, mock_bus) = create_bme280();
        mock_bus.clear_recent_operations();
        sensor.set_humidity_oversampling(Oversampling::X4);
        assert_eq!(mock_bus.register(0xF2), 0x03);
        let ops = operations(&mock_bus);
        // ctrl_meas has to be written after ctrl_hum for the change to take effect.
        let hum = ops
            .iter()
            .position(|op| matches!(op, I2cOperation::Write { register: 0xF2, .. }));
        let meas = ops
            .iter()
            .position(|op| matches!(op, I2cOperation::Write { register: 0xF4, .. }));
        assert!(hum < meas, "{:?}", ops);
        assert_eq!(sensor.settings().humidity_oversampling, Oversampling::X4);
    }

    #[test]
    fn unchanged_setting_is_not_written() {
        let (mut sensor, mock_bus) = create_bme280();
        mock_bus.clear_recent_operations();
        sensor.set_mode(Mode::Normal);
        assert!(mock_bus.recent_operations().is_empty());
    }

    #[test]
    fn settings_round_trip() {
        let (mut sensor, mock_bus) = create_bme280();
        sensor.set_temperature_oversampling(Oversampling::X2);
        sensor.set_pressure_oversampling(Oversampling::X16);
        sensor.set_mode(Mode::Forced);
        sensor.set_standby_time(StandbyTime::Ms125);
        sensor.set_filter(Filter::X8);
        let control = sensor.measurement_control().unwrap();
        assert_eq!(control.temperature_oversampling(), Oversampling::X2);
        assert_eq!(control.pressure_oversampling(), Oversampling::X16);
        assert_eq!(control.mode(), Mode::Forced);
        assert_eq!(mock_bus.register(0xF5), 0b010_011_00);
    }

    #[test]
    fn custom_settings_at_init() {
        let address = 0x76;
        let mock_bus = datasheet_bme280_at_address(address);
        let settings = SensorSettings {
            filter: Filter::X16,
            ..SensorSettings::default()
        };
        let sensor = Bme280::with_settings(mock_bus.clone(), address, settings).unwrap();
        assert_eq!(sensor.settings(), settings);
        assert_eq!(mock_bus.register(0xF5), 0b101_100_00);
    }

    #[test]
    fn reset() {
        let (mut sensor, mock_bus) = create_bme280();
        sensor.read_all().unwrap();
        mock_bus.clear_recent_operations();
        sensor.reset();
        assert_eq!(
            operations(&mock_bus),
            vec![I2cOperation::Write {
                register: 0xE0,
                value: 0xB6
            }]
        );
        assert_eq!(mock_bus.register(0xF4), 0x00);
        assert_eq!(sensor.fine_temperature(), None);
        sensor.apply_settings();
        assert_eq!(mock_bus.register(0xF4), 0x27);
    }

    #[test]
    fn status() {
        let (mut sensor, mock_bus) = create_bme280();
        mock_bus.set_register(0xF3, 0x08);
        assert!(sensor.status().unwrap().measuring());
        mock_bus.set_register(0xF3, 0x01);
        let status = sensor.status().unwrap();
        assert!(!status.measuring());
        assert!(status.im_update());
    }

    #[test]
    fn release_returns_bus() {
        let (sensor, mock_bus) = create_bme280();
        let bus = sensor.release();
        bus.set_register(0xF3, 0x08);
        assert_eq!(mock_bus.register(0xF3), 0x08);
    }
}
