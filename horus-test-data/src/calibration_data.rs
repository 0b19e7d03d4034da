// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// The BME280 exposes a single byte-addressed register file, 0x00 through 0xFF.
pub const REGISTER_FILE_LENGTH: usize = 0x100;

/// The value of the `id` register (0xD0) on a BME280.
pub const CHIP_ID: u8 = 0x60;

const TEMPERATURE_PRESSURE_BASE: usize = 0x88;

const HUMIDITY_BASE: usize = 0xE1;

const DATA_BASE: usize = 0xF7;

/// The `calib00`..`calib25` block (0x88 through 0xA1).
///
/// These are the trim values used for the worked example in the Bosch BME280 datasheet, laid out
/// as little-endian words the way the sensor stores them. Byte 24 (0xA0) is reserved and byte 25
/// (0xA1) is `dig_H1`.
#[rustfmt::skip]
pub const TEMPERATURE_PRESSURE_CALIBRATION: [u8; 26] = [
    // dig_T1 = 27504, dig_T2 = 26435, dig_T3 = -1000
    0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC,
    // dig_P1 = 36477, dig_P2 = -10685, dig_P3 = 3024
    0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B,
    // dig_P4 = 2855, dig_P5 = 140, dig_P6 = -7
    0x27, 0x0B, 0x8C, 0x00, 0xF9, 0xFF,
    // dig_P7 = 15500, dig_P8 = -14600, dig_P9 = 6000
    0x8C, 0x3C, 0xF8, 0xC6, 0x70, 0x17,
    // reserved, dig_H1 = 75
    0x00, 0x4B,
];

/// The `calib26`..`calib32` block (0xE1 through 0xE7).
///
/// dig_H2 = 362, dig_H3 = 0, dig_H4 = 313, dig_H5 = 50, dig_H6 = 30. dig_H4 and dig_H5 share the
/// nibbles of 0xE5.
pub const HUMIDITY_CALIBRATION: [u8; 7] = [0x6A, 0x01, 0x00, 0x13, 0x29, 0x03, 0x1E];

/// A burst read of 0xF7 through 0xFE.
///
/// This encodes adc_P = 415148, adc_T = 519888 (the datasheet example values) and adc_H = 30000.
pub const REFERENCE_RAW_SAMPLE: [u8; 8] = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30];

/// A full register file for a freshly powered-on BME280 loaded with the reference trim values.
pub fn datasheet_register_file() -> [u8; REGISTER_FILE_LENGTH] {
    let mut registers = [0u8; REGISTER_FILE_LENGTH];
    registers[0xD0] = CHIP_ID;
    registers[TEMPERATURE_PRESSURE_BASE..(TEMPERATURE_PRESSURE_BASE + 26)]
        .copy_from_slice(&TEMPERATURE_PRESSURE_CALIBRATION);
    registers[HUMIDITY_BASE..(HUMIDITY_BASE + 7)].copy_from_slice(&HUMIDITY_CALIBRATION);
    registers[DATA_BASE..(DATA_BASE + 8)].copy_from_slice(&REFERENCE_RAW_SAMPLE);
    registers
}
