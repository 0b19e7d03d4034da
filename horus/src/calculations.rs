// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The compensation formulas from the BME280 datasheet.
//!
//! The raw ADC values are converted to physical units using the fixed-point routines Bosch
//! publishes in section 4.2.3 of the datasheet (and in their reference driver). The integer widths
//! and the order of operations are part of the result, so the arithmetic is written out with
//! [`Wrapping`] integers of the same widths the reference uses, and right shifts of signed values
//! are arithmetic just like they are there. Nothing is converted to floating point until the very
//! last step.
//!
//! Temperature has to be compensated first. Its intermediate result, [`FineTemperature`], is an
//! input to both the pressure and humidity formulas. The only way to get a `FineTemperature` is
//! from [`compensate_temperature`] (or [`fine_temperature`]), so the ordering can't be gotten
//! wrong.
use std::num::Wrapping;

use crate::calibration::Calibration;
use crate::register::DATA_LENGTH;
use crate::util::adc_20_bit;

/// The upper bound of the humidity accumulator, 100 %RH in Q22.10.
const HUMIDITY_LIMIT: i32 = 419_430_400;

/// A fine resolution temperature value, carried from temperature compensation into the pressure
/// and humidity compensation.
///
/// The units are roughly 1/5120 ℃.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FineTemperature(i32);

impl FineTemperature {
    pub fn value(&self) -> i32 {
        self.0
    }
}

/// The three uncompensated ADC values from one measurement.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RawSample {
    /// 20-bit pressure value.
    pub pressure: i32,
    /// 20-bit temperature value.
    pub temperature: i32,
    /// 16-bit humidity value.
    pub humidity: i32,
}

impl RawSample {
    /// Split a burst read of the data registers (0xF7 through 0xFE).
    pub fn from_burst(burst: &[u8; DATA_LENGTH]) -> Self {
        Self {
            pressure: adc_20_bit(burst[0], burst[1], burst[2]),
            temperature: adc_20_bit(burst[3], burst[4], burst[5]),
            humidity: (i32::from(burst[6]) << 8) | i32::from(burst[7]),
        }
    }
}

/// One fully compensated measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvironmentalReading {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Percent relative humidity.
    pub humidity: f32,
    /// Hectopascals.
    pub pressure: f32,
}

pub fn fine_temperature(adc_t: i32, calibration: &Calibration) -> FineTemperature {
    let adc_t = Wrapping(adc_t);
    let t1 = Wrapping(i32::from(calibration.dig_t1));
    let t2 = Wrapping(i32::from(calibration.dig_t2));
    let t3 = Wrapping(i32::from(calibration.dig_t3));
    let var1 = (((adc_t >> 3) - (t1 << 1)) * t2) >> 11;
    let delta = (adc_t >> 4) - t1;
    let var2 = (((delta * delta) >> 12) * t3) >> 14;
    FineTemperature((var1 + var2).0)
}

/// Temperature in hundredths of a degree Celsius.
pub fn temperature_centi_celsius(fine: FineTemperature) -> i32 {
    ((Wrapping(fine.0) * Wrapping(5) + Wrapping(128)) >> 8).0
}

/// Compensate a raw temperature value, returning degrees Celsius and the fine temperature.
pub fn compensate_temperature(adc_t: i32, calibration: &Calibration) -> (f32, FineTemperature) {
    let fine = fine_temperature(adc_t, calibration);
    (temperature_centi_celsius(fine) as f32 / 100.0, fine)
}

/// Pressure in Pascals as an unsigned Q24.8 value.
///
/// Returns 0 instead of dividing by zero if the calibration and fine temperature produce a zero
/// denominator. Results outside of what a `u32` can hold are clamped, so an out of range ADC value
/// reads as 0 rather than wrapping around.
pub fn pressure_q24_8(adc_p: i32, calibration: &Calibration, fine: FineTemperature) -> u32 {
    let p1 = Wrapping(i64::from(calibration.dig_p1));
    let p2 = Wrapping(i64::from(calibration.dig_p2));
    let p3 = Wrapping(i64::from(calibration.dig_p3));
    let p4 = Wrapping(i64::from(calibration.dig_p4));
    let p5 = Wrapping(i64::from(calibration.dig_p5));
    let p6 = Wrapping(i64::from(calibration.dig_p6));
    let p7 = Wrapping(i64::from(calibration.dig_p7));
    let p8 = Wrapping(i64::from(calibration.dig_p8));
    let p9 = Wrapping(i64::from(calibration.dig_p9));

    let var1 = Wrapping(i64::from(fine.0)) - Wrapping(128_000);
    let mut var2 = var1 * var1 * p6;
    var2 += (var1 * p5) << 17;
    var2 += p4 << 35;
    let var1 = ((var1 * var1 * p3) >> 8) + ((var1 * p2) << 12);
    let var1 = (((Wrapping(1i64) << 47) + var1) * p1) >> 33;
    if var1.0 == 0 {
        return 0;
    }
    let mut p = Wrapping(1_048_576i64) - Wrapping(i64::from(adc_p));
    p = (((p << 31) - var2) * Wrapping(3125)) / var1;
    let var1 = (p9 * (p >> 13) * (p >> 13)) >> 25;
    let var2 = (p8 * p) >> 19;
    p = ((p + var1 + var2) >> 8) + (p7 << 4);
    p.0.clamp(0, i64::from(u32::MAX)) as u32
}

/// Compensate a raw pressure value, in hectopascals.
pub fn compensate_pressure(adc_p: i32, calibration: &Calibration, fine: FineTemperature) -> f32 {
    let pressure = pressure_q24_8(adc_p, calibration, fine);
    pressure as f32 / 256.0 / 100.0
}

/// Relative humidity as an unsigned Q22.10 value.
///
/// The accumulator is clamped to \[0, 100] %RH before the final shift.
pub fn humidity_q22_10(adc_h: i32, calibration: &Calibration, fine: FineTemperature) -> u32 {
    let h1 = Wrapping(i32::from(calibration.dig_h1));
    let h2 = Wrapping(i32::from(calibration.dig_h2));
    let h3 = Wrapping(i32::from(calibration.dig_h3));
    let h4 = Wrapping(i32::from(calibration.dig_h4));
    let h5 = Wrapping(i32::from(calibration.dig_h5));
    let h6 = Wrapping(i32::from(calibration.dig_h6));
    let adc_h = Wrapping(adc_h);

    let v = Wrapping(fine.0) - Wrapping(76_800);
    let scaled = (((adc_h << 14) - (h4 << 20) - (h5 * v)) + Wrapping(16_384)) >> 15;
    let gain = (((((((v * h6) >> 10) * (((v * h3) >> 11) + Wrapping(32_768))) >> 10)
        + Wrapping(2_097_152))
        * h2)
        + Wrapping(8_192))
        >> 14;
    let mut v = scaled * gain;
    v -= ((((v >> 15) * (v >> 15)) >> 7) * h1) >> 4;
    let v = v.0.clamp(0, HUMIDITY_LIMIT);
    (v >> 12) as u32
}

/// Compensate a raw humidity value, in percent relative humidity.
pub fn compensate_humidity(adc_h: i32, calibration: &Calibration, fine: FineTemperature) -> f32 {
    humidity_q22_10(adc_h, calibration, fine) as f32 / 1024.0
}

/// Run all three compensations, temperature first.
pub fn compensate(raw: &RawSample, calibration: &Calibration) -> (EnvironmentalReading, FineTemperature) {
    let (temperature, fine) = compensate_temperature(raw.temperature, calibration);
    let pressure = compensate_pressure(raw.pressure, calibration, fine);
    let humidity = compensate_humidity(raw.humidity, calibration, fine);
    (
        EnvironmentalReading {
            temperature,
            humidity,
            pressure,
        },
        fine,
    )
}
