// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Factory trim values.
//!
//! Every BME280 is individually trimmed at the factory, and the trim values are stored in the
//! sensor's non-volatile memory. They're copied into two register blocks at power-on: 0x88
//! through 0xA1 (temperature, pressure, and the first humidity value) and 0xE1 through 0xE7 (the
//! rest of humidity). The names follow the datasheet (`dig_T1` and so on).
use std::fmt::Debug;

use embedded_hal::blocking::i2c;
use tracing::debug;

use crate::bus::read_registers;
use crate::error::Error;
use crate::register::{
    RegisterAddress, HUMIDITY_CALIBRATION_LENGTH, TEMPERATURE_PRESSURE_CALIBRATION_LENGTH,
};
use crate::util::Buffer;

/// Types that can be created by reading them off of the sensor.
pub trait FromI2C<I2C> {
    type Error;
    type Ok;

    /// Create an instance of a type using data retrieved over I²C.
    fn from_i2c(bus: &mut I2C, i2c_address: u8) -> Result<Self::Ok, Self::Error>;
}

/// The full set of trim values for one sensor.
///
/// This is loaded once when a driver is created and never changes afterwards.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Calibration {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,

    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,

    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl Calibration {
    /// Decode the two raw trim blocks.
    pub fn from_data(
        temperature_pressure: &[u8; TEMPERATURE_PRESSURE_CALIBRATION_LENGTH],
        humidity: &[u8; HUMIDITY_CALIBRATION_LENGTH],
    ) -> Self {
        let mut buf = &temperature_pressure[..];
        let dig_t1 = buf.get_u16_le();
        let dig_t2 = buf.get_i16_le();
        let dig_t3 = buf.get_i16_le();
        let dig_p1 = buf.get_u16_le();
        let dig_p2 = buf.get_i16_le();
        let dig_p3 = buf.get_i16_le();
        let dig_p4 = buf.get_i16_le();
        let dig_p5 = buf.get_i16_le();
        let dig_p6 = buf.get_i16_le();
        let dig_p7 = buf.get_i16_le();
        let dig_p8 = buf.get_i16_le();
        let dig_p9 = buf.get_i16_le();
        // 0xA0 is reserved
        buf.advance(1);
        let dig_h1 = buf.get_u8();

        let mut buf = &humidity[..];
        let dig_h2 = buf.get_i16_le();
        let dig_h3 = buf.get_u8();
        // dig_H4 and dig_H5 are 12-bit values that share the nibbles of 0xE5. dig_H4 is 0xE4[7:0]
        // followed by 0xE5[3:0], dig_H5 is 0xE6[7:0] followed by 0xE5[7:4]. The most significant
        // byte carries the sign.
        let e4 = buf.get_i8();
        let e5 = buf.get_u8();
        let e6 = buf.get_i8();
        let dig_h4 = (i16::from(e4) << 4) | i16::from(e5 & 0x0F);
        let dig_h5 = (i16::from(e6) << 4) | i16::from(e5 >> 4);
        let dig_h6 = buf.get_i8();

        Self {
            dig_t1,
            dig_t2,
            dig_t3,
            dig_p1,
            dig_p2,
            dig_p3,
            dig_p4,
            dig_p5,
            dig_p6,
            dig_p7,
            dig_p8,
            dig_p9,
            dig_h1,
            dig_h2,
            dig_h3,
            dig_h4,
            dig_h5,
            dig_h6,
        }
    }
}

impl<I2C, E> FromI2C<I2C> for Calibration
where
    I2C: i2c::WriteRead<Error = E>,
    E: Debug,
{
    type Error = Error<E>;
    type Ok = Self;

    fn from_i2c(bus: &mut I2C, i2c_address: u8) -> Result<Self, Self::Error> {
        let mut temperature_pressure = [0u8; TEMPERATURE_PRESSURE_CALIBRATION_LENGTH];
        read_registers(
            bus,
            i2c_address,
            RegisterAddress::CalibrationTemperaturePressure,
            &mut temperature_pressure,
        )
        .map_err(Error::CalibrationRead)?;
        let mut humidity = [0u8; HUMIDITY_CALIBRATION_LENGTH];
        read_registers(
            bus,
            i2c_address,
            RegisterAddress::CalibrationHumidity,
            &mut humidity,
        )
        .map_err(Error::CalibrationRead)?;
        let calibration = Self::from_data(&temperature_pressure, &humidity);
        debug!(?calibration, "loaded trim values");
        Ok(calibration)
    }
}

#[cfg(test)]
mod test {
    use horus_test_data::{datasheet_bme280_at_address, I2cOperation, MockError};

    use super::{Calibration, FromI2C};
    use crate::error::Error;
    use crate::test::datasheet_calibration;

    #[test]
    fn datasheet_values() {
        let calibration = datasheet_calibration();
        assert_eq!(calibration.dig_t1, 27504);
        assert_eq!(calibration.dig_t2, 26435);
        assert_eq!(calibration.dig_t3, -1000);
        assert_eq!(calibration.dig_p1, 36477);
        assert_eq!(calibration.dig_p2, -10685);
        assert_eq!(calibration.dig_p3, 3024);
        assert_eq!(calibration.dig_p4, 2855);
        assert_eq!(calibration.dig_p5, 140);
        assert_eq!(calibration.dig_p6, -7);
        assert_eq!(calibration.dig_p7, 15500);
        assert_eq!(calibration.dig_p8, -14600);
        assert_eq!(calibration.dig_p9, 6000);
        assert_eq!(calibration.dig_h1, 75);
        assert_eq!(calibration.dig_h2, 362);
        assert_eq!(calibration.dig_h3, 0);
        assert_eq!(calibration.dig_h4, 313);
        assert_eq!(calibration.dig_h5, 50);
        assert_eq!(calibration.dig_h6, 30);
    }

    #[test]
    fn shared_nibble_split() {
        let tp = [0u8; 26];
        // 0xE4 = 0xAB, 0xE5 = 0xCD, 0xE6 = 0x12
        let humidity = [0x00, 0x00, 0x00, 0xAB, 0xCD, 0x12, 0x00];
        let calibration = Calibration::from_data(&tp, &humidity);
        // 0xAB sign extends, then the low nibble of 0xE5
        assert_eq!(calibration.dig_h4, (0xFABDu16) as i16);
        assert_eq!(calibration.dig_h5, 0x012C);
    }

    #[test]
    fn negative_h6() {
        let tp = [0u8; 26];
        let humidity = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF6];
        assert_eq!(Calibration::from_data(&tp, &humidity).dig_h6, -10);
    }

    #[test]
    fn load_from_i2c() {
        let address = 0x76;
        let mut mock_bus = datasheet_bme280_at_address(address);
        let calibration = Calibration::from_i2c(&mut mock_bus, address).unwrap();
        assert_eq!(calibration, datasheet_calibration());
        // Two bursts, newest first
        let ops = mock_bus.recent_operations();
        assert_eq!(
            ops.iter().copied().collect::<Vec<_>>(),
            vec![
                I2cOperation::Read {
                    register: 0xE1,
                    length: 7
                },
                I2cOperation::Read {
                    register: 0x88,
                    length: 26
                },
            ]
        );
    }

    #[test]
    fn short_humidity_block() {
        let address = 0x76;
        let mut mock_bus = datasheet_bme280_at_address(address);
        mock_bus.fail_reads_from(0xE1);
        let err = Calibration::from_i2c(&mut mock_bus, address).unwrap_err();
        assert!(matches!(
            err,
            Error::CalibrationRead(MockError::ShortRead {
                register: 0xE1,
                length: 7
            })
        ));
    }
}
